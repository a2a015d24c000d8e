//! Decides which scan outcomes are written to the result store.
//!
//! Only actionable outcomes are stored: a clean package produces no row.

use crate::model::ScanOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultPolicy {
    persistence_enabled: bool,
}

impl ResultPolicy {
    pub fn new(persistence_enabled: bool) -> Self {
        Self {
            persistence_enabled,
        }
    }

    pub fn persistence_enabled(&self) -> bool {
        self.persistence_enabled
    }

    /// Persist iff persistence is on and the lookup found something.
    ///
    /// Failed lookups never produce a [`ScanOutcome`], so they are never
    /// persisted.
    pub fn should_persist(&self, outcome: &ScanOutcome) -> bool {
        self.persistence_enabled && outcome.is_vulnerable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::derive_finding;
    use crate::model::{Ecosystem, PackageIdentity, Vulnerability};

    fn outcome(vuln_ids: &[&str]) -> ScanOutcome {
        let identity = PackageIdentity::new("lodash", "4.17.15", Ecosystem::Npm).unwrap();
        let findings = vuln_ids
            .iter()
            .map(|id| {
                let vuln = Vulnerability {
                    id: id.to_string(),
                    ..Default::default()
                };
                derive_finding(vuln, "lodash")
            })
            .collect();
        ScanOutcome::new(identity, findings, b"{}".to_vec())
    }

    #[test]
    fn test_clean_outcome_is_never_persisted() {
        assert!(!ResultPolicy::new(true).should_persist(&outcome(&[])));
    }

    #[test]
    fn test_vulnerable_outcome_is_persisted_when_enabled() {
        let vulnerable = outcome(&["GHSA-1", "GHSA-2"]);
        assert!(ResultPolicy::new(true).should_persist(&vulnerable));
        assert!(!ResultPolicy::new(false).should_persist(&vulnerable));
    }

    #[test]
    fn test_default_disables_persistence() {
        assert!(!ResultPolicy::default().persistence_enabled());
    }
}
