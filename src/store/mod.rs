//! Persistence of vulnerability findings.
//!
//! The orchestrator hands each outcome selected by the
//! [`ResultPolicy`](crate::policy::ResultPolicy) to a [`ResultStore`]. Every
//! finding becomes one [`ScanRecord`]; all rows of one outcome share the raw
//! response body.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::PersistenceError;
use crate::model::{Finding, PackageIdentity};
use async_trait::async_trait;
use serde::Serialize;

/// A sink for vulnerable scan outcomes, shared by all scan workers.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Stores one row per finding and returns the number of rows written.
    async fn save(
        &self,
        identity: &PackageIdentity,
        findings: &[Finding],
        raw_response: &[u8],
    ) -> Result<usize, PersistenceError>;
}

/// One stored finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub package_name: String,
    pub ecosystem: String,
    pub version: String,
    pub vuln_id: String,
    pub summary: Option<String>,
    pub published: Option<String>,
    pub severity_rating: String,
    pub fix_version: String,
    /// Response body bytes, stored unmodified.
    #[serde(skip)]
    pub raw_response: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ScanRecord {
    /// Builds the rows for one outcome, in finding order.
    pub fn rows(identity: &PackageIdentity, findings: &[Finding], raw_response: &[u8]) -> Vec<Self> {
        findings
            .iter()
            .map(|finding| ScanRecord {
                id: None,
                package_name: identity.name().to_string(),
                ecosystem: identity.ecosystem().to_string(),
                version: identity.version().to_string(),
                vuln_id: finding.vulnerability.id.clone(),
                summary: finding.vulnerability.summary.clone(),
                published: finding.vulnerability.published.clone(),
                severity_rating: finding.severity_rating.clone(),
                fix_version: finding.fix_version.clone(),
                raw_response: raw_response.to_vec(),
                created_at: None,
            })
            .collect()
    }
}
