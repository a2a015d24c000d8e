//! Vulnerability lookups and the ratings derived from their results.

mod osv;
pub mod rating;

pub use osv::{parse_vulnerabilities, OsvClient, DEFAULT_OSV_API_URL};
pub use rating::{cvss_heuristic_score, derive_finding, fix_version, severity_rating};

use crate::error::LookupError;
use crate::model::{PackageIdentity, Vulnerability};
use async_trait::async_trait;

/// Vulnerabilities reported for one identity, plus the untouched response body.
#[derive(Debug, Clone, Default)]
pub struct LookupResponse {
    pub vulnerabilities: Vec<Vulnerability>,
    pub raw: Vec<u8>,
}

/// A source of known vulnerabilities, queried once per package identity.
///
/// Implementations are shared across all scan workers.
#[async_trait]
pub trait VulnerabilityLookup: Send + Sync {
    fn name(&self) -> &'static str;
    async fn query(&self, identity: &PackageIdentity) -> Result<LookupResponse, LookupError>;
}
