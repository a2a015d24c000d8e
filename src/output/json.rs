use crate::error::{ExtractionError, LookupError, PersistenceError};
use crate::model::{BatchSummary, PackageIdentity, ScanOutcome};
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use super::Reporter;

/// Writes one JSON object per event, one per line.
pub struct JsonReporter<W: Write + Send = std::io::Stdout> {
    out: Mutex<W>,
}

impl JsonReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_line(&self, value: serde_json::Value) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(out, "{}", value) {
            tracing::warn!(error = %e, "failed to write JSON report line");
        }
    }
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn report_outcome(&self, outcome: &ScanOutcome) {
        self.write_line(json!({
            "event": "outcome",
            "package": outcome.identity,
            "scanned_at": outcome.scanned_at,
            "vulnerabilities": outcome.findings,
        }));
    }

    fn report_failure(&self, identity: &PackageIdentity, error: &LookupError) {
        self.write_line(json!({
            "event": "failure",
            "package": identity,
            "error": error.to_string(),
        }));
    }

    fn report_skipped(&self, path: &Path, error: &ExtractionError) {
        self.write_line(json!({
            "event": "skipped",
            "path": path.display().to_string(),
            "error": error.reason.to_string(),
        }));
    }

    fn report_persistence_failure(&self, identity: &PackageIdentity, error: &PersistenceError) {
        self.write_line(json!({
            "event": "persistence_failure",
            "package": identity,
            "error": error.to_string(),
        }));
    }

    fn report_batch_summary(&self, summary: &BatchSummary) {
        self.write_line(json!({
            "event": "summary",
            "summary": summary,
        }));
    }
}
