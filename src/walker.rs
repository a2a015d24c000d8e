//! Recursive discovery of package artifacts under a directory.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::identity::{needs_case_advisory, IdentityExtractor};
use crate::model::PackageIdentity;
use crate::output::Reporter;

/// Walks a directory tree and extracts an identity from every file carrying
/// the configured extension.
pub struct DirectoryWalker {
    extractor: IdentityExtractor,
    reporter: Arc<dyn Reporter>,
}

impl DirectoryWalker {
    pub fn new(extension: &str, ecosystem_hint: &str, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            extractor: IdentityExtractor::new(extension, ecosystem_hint),
            reporter,
        }
    }

    pub fn extractor(&self) -> &IdentityExtractor {
        &self.extractor
    }

    /// Returns identities in traversal order.
    ///
    /// Files whose names cannot be parsed are reported and skipped. Only a
    /// missing or non-directory `root` fails the walk.
    pub fn scan(&self, root: &Path) -> Result<Vec<PackageIdentity>, ScanError> {
        let metadata = std::fs::metadata(root).map_err(|e| ScanError::DirectoryAccess {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::DirectoryAccess {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let mut identities = Vec::new();

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };

            // Links are not followed for recursion, but a link to a file counts.
            let file_type = entry.file_type();
            if !(file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())) {
                continue;
            }

            let Some(filename) = entry.file_name().to_str() else {
                warn!(path = %entry.path().display(), "skipping non UTF-8 filename");
                continue;
            };

            if !self.extractor.matches(filename) {
                continue;
            }

            match self.extractor.extract(filename) {
                Ok(identity) => {
                    if needs_case_advisory(&identity) {
                        warn!(
                            name = identity.name(),
                            ecosystem = %identity.ecosystem(),
                            "package name has mixed case in a case-sensitive ecosystem; \
                             results may be incomplete if the registry spells it differently"
                        );
                    }
                    identities.push(identity);
                }
                Err(e) => {
                    warn!(filename, error = %e.reason, "skipping file");
                    self.reporter.report_skipped(entry.path(), &e);
                }
            }
        }

        debug!(
            root = %root.display(),
            extension = self.extractor.extension(),
            count = identities.len(),
            "directory walk complete"
        );

        Ok(identities)
    }
}
