use crate::error::LookupError;
use crate::model::{BatchSummary, PackageIdentity, ScanOutcome};
use tracing::info;

use super::Reporter;

/// Reports through structured `tracing` events only.
///
/// Failures and skipped files are already logged where they happen, so this
/// reporter does not repeat them.
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report_batch_start(&self, total: usize) {
        info!(count = total, "package files found");
    }

    fn report_scan_start(&self, identity: &PackageIdentity) {
        info!(
            name = identity.name(),
            version = identity.version(),
            ecosystem = %identity.ecosystem(),
            "scanning package"
        );
    }

    fn report_outcome(&self, outcome: &ScanOutcome) {
        let identity = &outcome.identity;
        if outcome.findings.is_empty() {
            info!(
                name = identity.name(),
                version = identity.version(),
                "no vulnerabilities found"
            );
            return;
        }

        info!(
            name = identity.name(),
            version = identity.version(),
            count = outcome.findings.len(),
            "vulnerabilities found"
        );
        for (index, finding) in outcome.findings.iter().enumerate() {
            let vuln = &finding.vulnerability;
            info!(
                index = index + 1,
                id = %vuln.id,
                summary = vuln.summary.as_deref().unwrap_or_default(),
                published = vuln.published.as_deref().unwrap_or_default(),
                severity = %finding.severity_rating,
                fix_version = %finding.fix_version,
                "vulnerability details"
            );
        }
    }

    fn report_failure(&self, _identity: &PackageIdentity, _error: &LookupError) {}

    fn report_batch_summary(&self, summary: &BatchSummary) {
        info!(
            packages_processed = summary.processed(),
            failed = summary.failed,
            vulnerable = summary.vulnerable,
            persisted = summary.persisted,
            cancelled = summary.cancelled,
            undispatched = summary.undispatched,
            "scan completed"
        );
    }
}
