use crate::error::LookupError;
use crate::model::{PackageIdentity, Vulnerability};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{LookupResponse, VulnerabilityLookup};

pub const DEFAULT_OSV_API_URL: &str = "https://api.osv.dev/v1/query";

/// Default HTTP timeout for a single query.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for the OSV.dev single-package query endpoint.
pub struct OsvClient {
    client: reqwest::Client,
    api_url: String,
}

impl OsvClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: DEFAULT_OSV_API_URL.to_string(),
        }
    }

    /// Creates a client for `api_url` whose requests give up after `timeout`.
    pub fn with_settings(api_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pkgscan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl Default for OsvClient {
    fn default() -> Self {
        Self::with_settings(DEFAULT_OSV_API_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .unwrap_or_else(|_| Self::new())
    }
}

#[derive(Serialize)]
struct OsvQuery<'a> {
    version: &'a str,
    package: OsvPackage<'a>,
}

#[derive(Serialize)]
struct OsvPackage<'a> {
    name: &'a str,
    ecosystem: &'a str,
}

impl<'a> OsvQuery<'a> {
    fn for_identity(identity: &'a PackageIdentity) -> Self {
        Self {
            version: identity.version(),
            package: OsvPackage {
                name: identity.name(),
                ecosystem: identity.ecosystem().as_str(),
            },
        }
    }
}

#[async_trait]
impl VulnerabilityLookup for OsvClient {
    fn name(&self) -> &'static str {
        "OSV.dev"
    }

    async fn query(&self, identity: &PackageIdentity) -> Result<LookupResponse, LookupError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(&OsvQuery::for_identity(identity))
            .send()
            .await?;

        let status = response.status();
        let raw = response.bytes().await?.to_vec();

        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&raw).into_owned(),
            });
        }

        Ok(LookupResponse {
            vulnerabilities: parse_vulnerabilities(&raw),
            raw,
        })
    }
}

/// Parses an OSV query response body.
///
/// Accepts `{"vulns": [...]}`, a bare array of vulnerabilities, or `{}` for
/// a clean package. Entries that do not deserialize are skipped, and a body
/// that is not JSON yields no vulnerabilities.
pub fn parse_vulnerabilities(body: &[u8]) -> Vec<Vulnerability> {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "vulnerability response is not valid JSON");
            return Vec::new();
        }
    };

    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(mut object) => match object.remove("vulns") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Vulnerability>(entry) {
            Ok(vulnerability) => Some(vulnerability),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed vulnerability entry");
                None
            }
        })
        .collect()
}
