//! Package identity extraction from artifact filenames.
//!
//! Every packaging ecosystem names its artifacts differently, and most of the
//! conventions are ambiguous (NuGet names contain periods, npm names contain
//! hyphens). [`IdentityExtractor`] picks a [`FilenameParser`] from the
//! declared extension and builds a [`PackageIdentity`] from its output.
//!
//! # Example
//!
//! ```
//! use pkgscan::identity::extract;
//!
//! let identity = extract("Microsoft.AspNetCore.Identity.3.1.10.nupkg", "").unwrap();
//! assert_eq!(identity.name(), "Microsoft.AspNetCore.Identity");
//! assert_eq!(identity.version(), "3.1.10");
//! assert_eq!(identity.ecosystem().as_str(), "NuGet");
//! ```

mod parser;

pub use parser::FilenameParser;

use crate::error::{ExtractionError, ExtractionFailure};
use crate::model::{Ecosystem, PackageIdentity};

/// Extracts identities for files carrying one declared extension.
#[derive(Debug, Clone)]
pub struct IdentityExtractor {
    extension: String,
    parser: FilenameParser,
    ecosystem: Ecosystem,
}

impl IdentityExtractor {
    /// Creates an extractor for `extension` (with or without a leading dot).
    ///
    /// An empty `ecosystem_hint` derives the ecosystem from the extension.
    pub fn new(extension: &str, ecosystem_hint: &str) -> Self {
        let extension = extension.trim().trim_start_matches('.').to_string();
        let ecosystem = if ecosystem_hint.trim().is_empty() {
            Ecosystem::from_extension(&extension)
        } else {
            Ecosystem::parse(ecosystem_hint)
        };

        Self {
            parser: FilenameParser::for_extension(&extension),
            extension,
            ecosystem,
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn ecosystem(&self) -> &Ecosystem {
        &self.ecosystem
    }

    /// Returns true if `filename` ends in `.<extension>`, ignoring case.
    pub fn matches(&self, filename: &str) -> bool {
        let suffix = format!(".{}", self.extension);
        parser::strip_suffix_ignore_case(filename, &suffix).len() != filename.len()
    }

    pub fn extract(&self, filename: &str) -> Result<PackageIdentity, ExtractionError> {
        let base = base_name(filename);
        if base.is_empty() {
            return Err(ExtractionError::new(filename, ExtractionFailure::EmptyFilename));
        }

        let (name, version) = self
            .parser
            .split(base)
            .map_err(|reason| ExtractionError::new(filename, reason))?;

        let identity = PackageIdentity::new(name, version, self.ecosystem.clone())
            .map_err(|reason| ExtractionError::new(filename, reason))?;

        tracing::debug!(
            filename,
            name = identity.name(),
            version = identity.version(),
            ecosystem = %identity.ecosystem(),
            "extracted package identity"
        );

        Ok(identity)
    }
}

/// Extracts an identity from `filename`, taking the extension from the
/// filename itself.
///
/// `tar.gz` is recognized as a single extension. An empty `ecosystem_hint`
/// derives the ecosystem from the extension.
pub fn extract(filename: &str, ecosystem_hint: &str) -> Result<PackageIdentity, ExtractionError> {
    let base = base_name(filename);
    if base.is_empty() {
        return Err(ExtractionError::new(filename, ExtractionFailure::EmptyFilename));
    }

    let extension = extension_of(base)
        .ok_or_else(|| ExtractionError::new(filename, ExtractionFailure::MissingExtension))?;

    IdentityExtractor::new(extension, ecosystem_hint).extract(filename)
}

/// Returns the extension of `filename`, treating `tar.gz` as one extension.
pub fn extension_of(filename: &str) -> Option<&str> {
    let base = base_name(filename);
    if parser::strip_suffix_ignore_case(base, ".tar.gz").len() != base.len() {
        let start = base.len() - "tar.gz".len();
        return Some(&base[start..]);
    }

    let dot = base.rfind('.')?;
    let extension = &base[dot + 1..];
    if dot == 0 || extension.is_empty() {
        None
    } else {
        Some(extension)
    }
}

/// Whether `identity` has a mixed-case name in a case-sensitive ecosystem.
///
/// Purely advisory: lookups use the name exactly as extracted.
pub fn needs_case_advisory(identity: &PackageIdentity) -> bool {
    let name = identity.name();
    identity.ecosystem().is_case_sensitive()
        && name.to_lowercase() != name
        && name.to_uppercase() != name
}

fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename).trim()
}
