use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Finding, PackageIdentity};

/// The result of one successful vulnerability lookup.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub identity: PackageIdentity,
    pub findings: Vec<Finding>,
    /// Response body exactly as the vulnerability database sent it.
    #[serde(skip)]
    pub raw_response: Vec<u8>,
    pub scanned_at: DateTime<Utc>,
}

impl ScanOutcome {
    pub fn new(identity: PackageIdentity, findings: Vec<Finding>, raw_response: Vec<u8>) -> Self {
        Self {
            identity,
            findings,
            raw_response,
            scanned_at: Utc::now(),
        }
    }

    pub fn is_vulnerable(&self) -> bool {
        !self.findings.is_empty()
    }
}

/// Totals for a completed (or cancelled) batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Lookups admitted to the worker pool.
    pub dispatched: usize,
    /// Identities never dispatched because the batch was cancelled.
    pub undispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successful outcomes with at least one finding.
    pub vulnerable: usize,
    pub findings: usize,
    /// Outcomes written to the result store.
    pub persisted: usize,
    pub persistence_failures: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    /// Packages that reached a final state, successful or not.
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }
}
