//! Severity and fix-version derivation for OSV vulnerabilities.

use crate::model::{Finding, Vulnerability};

pub const NO_FIX_VERSION: &str = "No fix version found";
pub const UNKNOWN_SEVERITY: &str = "Unknown";

const CVSS_V3: &str = "CVSS_V3";

/// Builds a [`Finding`] for `vulnerability` as seen from `package_name`.
pub fn derive_finding(vulnerability: Vulnerability, package_name: &str) -> Finding {
    let severity_rating = severity_rating(&vulnerability);
    let fix_version = fix_version(&vulnerability, package_name);

    Finding {
        vulnerability,
        severity_rating,
        fix_version,
    }
}

/// Rates a CVSS vector with a coarse heuristic, not a CVSS calculator.
///
/// Each `:H` metric counts 3, `:M` counts 2 and `:L` counts 1; the total is
/// capped at 10.
pub fn cvss_heuristic_score(vector: &str) -> String {
    if vector.trim().is_empty() {
        return "N/A".to_string();
    }

    let high = vector.matches(":H").count() as f64;
    let medium = vector.matches(":M").count() as f64;
    let low = vector.matches(":L").count() as f64;

    let score = (high * 3.0 + medium * 2.0 + low).min(10.0);
    format!("{:.1}/10", score)
}

/// Severity rating for display and storage.
///
/// Prefers the first CVSS v3 vector, then the database-specific severity
/// label, then [`UNKNOWN_SEVERITY`].
pub fn severity_rating(vulnerability: &Vulnerability) -> String {
    if let Some(cvss) = vulnerability
        .severity
        .iter()
        .find(|entry| entry.score_type == CVSS_V3)
    {
        return cvss_heuristic_score(&cvss.score);
    }

    let label = vulnerability
        .database_specific
        .as_ref()
        .and_then(|specific| specific.severity.as_deref())
        .unwrap_or_default();

    match label.to_uppercase().as_str() {
        "CRITICAL" => "9.0+/10",
        "HIGH" => "7.0-8.9/10",
        "MEDIUM" => "4.0-6.9/10",
        "LOW" => "0.1-3.9/10",
        _ => UNKNOWN_SEVERITY,
    }
    .to_string()
}

/// First non-empty `fixed` event for `package_name`, in range order.
pub fn fix_version(vulnerability: &Vulnerability, package_name: &str) -> String {
    vulnerability
        .affected
        .iter()
        .filter(|affected| {
            affected
                .package
                .as_ref()
                .is_some_and(|package| package.name == package_name)
        })
        .flat_map(|affected| affected.ranges.iter())
        .flat_map(|range| range.events.iter())
        .find_map(|event| event.fixed.clone().filter(|fixed| !fixed.is_empty()))
        .unwrap_or_else(|| NO_FIX_VERSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Affected, AffectedPackage, AffectedRange, DatabaseSpecific, RangeEvent, SeverityScore,
    };

    fn with_cvss(vector: &str) -> Vulnerability {
        Vulnerability {
            id: "GHSA-test".to_string(),
            severity: vec![SeverityScore {
                score_type: "CVSS_V3".to_string(),
                score: vector.to_string(),
            }],
            ..Default::default()
        }
    }

    fn with_label(label: &str) -> Vulnerability {
        Vulnerability {
            id: "GHSA-test".to_string(),
            database_specific: Some(DatabaseSpecific {
                severity: Some(label.to_string()),
            }),
            ..Default::default()
        }
    }

    fn affected(name: &str, fixed: &[Option<&str>]) -> Affected {
        Affected {
            package: Some(AffectedPackage {
                name: name.to_string(),
                ecosystem: "npm".to_string(),
            }),
            ranges: vec![AffectedRange {
                range_type: "SEMVER".to_string(),
                events: fixed
                    .iter()
                    .map(|f| RangeEvent {
                        introduced: None,
                        fixed: f.map(str::to_string),
                        last_affected: None,
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_cvss_two_high_tokens() {
        assert_eq!(cvss_heuristic_score("CVSS:3.1/C:H/I:H"), "6.0/10");
    }

    #[test]
    fn test_cvss_score_is_capped() {
        assert_eq!(
            cvss_heuristic_score("CVSS:3.1/AV:N/AC:H/PR:N/UI:N/S:U/C:H/I:H/A:H"),
            "10.0/10"
        );
    }

    #[test]
    fn test_cvss_mixed_weights() {
        // AC:L + PR:L + C:M -> 1 + 1 + 2
        assert_eq!(cvss_heuristic_score("CVSS:3.1/AC:L/PR:L/C:M"), "4.0/10");
        assert_eq!(cvss_heuristic_score(""), "N/A");
    }

    #[test]
    fn test_severity_prefers_cvss_v3() {
        let mut vuln = with_cvss("CVSS:3.1/C:H/I:H");
        vuln.database_specific = Some(DatabaseSpecific {
            severity: Some("LOW".to_string()),
        });
        assert_eq!(severity_rating(&vuln), "6.0/10");
    }

    #[test]
    fn test_severity_ignores_other_vector_types() {
        let vuln = Vulnerability {
            severity: vec![SeverityScore {
                score_type: "CVSS_V2".to_string(),
                score: "AV:N/AC:L/Au:N/C:P/I:P/A:P".to_string(),
            }],
            ..with_label("high")
        };
        assert_eq!(severity_rating(&vuln), "7.0-8.9/10");
    }

    #[test]
    fn test_severity_label_buckets() {
        assert_eq!(severity_rating(&with_label("CRITICAL")), "9.0+/10");
        assert_eq!(severity_rating(&with_label("HIGH")), "7.0-8.9/10");
        assert_eq!(severity_rating(&with_label("Medium")), "4.0-6.9/10");
        assert_eq!(severity_rating(&with_label("low")), "0.1-3.9/10");
        assert_eq!(severity_rating(&with_label("whatever")), "Unknown");
        assert_eq!(severity_rating(&Vulnerability::default()), "Unknown");
    }

    #[test]
    fn test_fix_version_matches_package_name() {
        let vuln = Vulnerability {
            affected: vec![
                affected("lodash-es", &[Some("4.17.21")]),
                affected("lodash", &[None, Some(""), Some("4.17.19"), Some("4.17.21")]),
            ],
            ..Default::default()
        };
        assert_eq!(fix_version(&vuln, "lodash"), "4.17.19");
        assert_eq!(fix_version(&vuln, "lodash-es"), "4.17.21");
    }

    #[test]
    fn test_fix_version_sentinel() {
        let vuln = Vulnerability {
            affected: vec![affected("lodash", &[None])],
            ..Default::default()
        };
        assert_eq!(fix_version(&vuln, "lodash"), NO_FIX_VERSION);
        // Name comparison is exact.
        assert_eq!(fix_version(&vuln, "Lodash"), NO_FIX_VERSION);
    }

    #[test]
    fn test_derive_finding() {
        let mut vuln = with_cvss("CVSS:3.1/C:H/I:H");
        vuln.affected = vec![affected("lodash", &[Some("4.17.19")])];
        let finding = derive_finding(vuln, "lodash");
        assert_eq!(finding.severity_rating, "6.0/10");
        assert_eq!(finding.fix_version, "4.17.19");
        assert_eq!(finding.vulnerability.id, "GHSA-test");
    }
}
