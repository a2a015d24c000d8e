use serde::Serialize;

use crate::error::ExtractionFailure;

/// A packaging ecosystem, named the way OSV.dev names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum Ecosystem {
    NuGet,
    Npm,
    PyPI,
    Maven,
    RubyGems,
    Debian,
    Rpm,
    CratesIo,
    Unknown,
    /// Any other ecosystem name supplied by the operator, passed through as-is.
    Other(String),
}

impl Ecosystem {
    /// Derives the ecosystem from a file extension (`nupkg`, `tar.gz`, ...).
    ///
    /// A leading dot is ignored and matching is case-insensitive.
    /// Unrecognized extensions map to [`Ecosystem::Unknown`].
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "nupkg" => Ecosystem::NuGet,
            "tgz" | "tar.gz" => Ecosystem::Npm,
            "whl" | "egg" => Ecosystem::PyPI,
            "jar" => Ecosystem::Maven,
            "gem" => Ecosystem::RubyGems,
            "deb" => Ecosystem::Debian,
            "rpm" => Ecosystem::Rpm,
            _ => Ecosystem::Unknown,
        }
    }

    /// Parses an operator-supplied ecosystem name.
    ///
    /// Known names match case-insensitively; anything else is kept verbatim
    /// as [`Ecosystem::Other`].
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.to_lowercase().as_str() {
            "nuget" => Ecosystem::NuGet,
            "npm" => Ecosystem::Npm,
            "pypi" => Ecosystem::PyPI,
            "maven" => Ecosystem::Maven,
            "rubygems" => Ecosystem::RubyGems,
            "debian" => Ecosystem::Debian,
            "rpm" => Ecosystem::Rpm,
            "crates.io" | "cargo" => Ecosystem::CratesIo,
            "unknown" => Ecosystem::Unknown,
            _ => Ecosystem::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Ecosystem::NuGet => "NuGet",
            Ecosystem::Npm => "npm",
            Ecosystem::PyPI => "PyPI",
            Ecosystem::Maven => "Maven",
            Ecosystem::RubyGems => "RubyGems",
            Ecosystem::Debian => "Debian",
            Ecosystem::Rpm => "RPM",
            Ecosystem::CratesIo => "crates.io",
            Ecosystem::Unknown => "Unknown",
            Ecosystem::Other(name) => name,
        }
    }

    /// Whether package names in this ecosystem must match case exactly.
    pub fn is_case_sensitive(&self) -> bool {
        matches!(
            self,
            Ecosystem::Npm
                | Ecosystem::PyPI
                | Ecosystem::Maven
                | Ecosystem::NuGet
                | Ecosystem::CratesIo
        )
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Ecosystem> for String {
    fn from(ecosystem: Ecosystem) -> Self {
        ecosystem.as_str().to_string()
    }
}

/// The `(name, version, ecosystem)` triple a vulnerability lookup is keyed by.
///
/// Name and version are guaranteed non-empty. Case is preserved exactly as
/// found; ecosystems such as npm and NuGet are case-sensitive downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackageIdentity {
    name: String,
    version: String,
    ecosystem: Ecosystem,
}

impl PackageIdentity {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        ecosystem: Ecosystem,
    ) -> Result<Self, ExtractionFailure> {
        let name = name.into();
        let version = version.into();

        if name.trim().is_empty() {
            return Err(ExtractionFailure::EmptyName);
        }
        if version.trim().is_empty() {
            return Err(ExtractionFailure::EmptyVersion);
        }

        Ok(Self {
            name,
            version,
            ecosystem,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn ecosystem(&self) -> &Ecosystem {
        &self.ecosystem
    }
}

impl std::fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.version, self.ecosystem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecosystem_from_extension() {
        assert_eq!(Ecosystem::from_extension("nupkg"), Ecosystem::NuGet);
        assert_eq!(Ecosystem::from_extension(".NUPKG"), Ecosystem::NuGet);
        assert_eq!(Ecosystem::from_extension("tgz"), Ecosystem::Npm);
        assert_eq!(Ecosystem::from_extension("tar.gz"), Ecosystem::Npm);
        assert_eq!(Ecosystem::from_extension("whl"), Ecosystem::PyPI);
        assert_eq!(Ecosystem::from_extension("egg"), Ecosystem::PyPI);
        assert_eq!(Ecosystem::from_extension("jar"), Ecosystem::Maven);
        assert_eq!(Ecosystem::from_extension("gem"), Ecosystem::RubyGems);
        assert_eq!(Ecosystem::from_extension("deb"), Ecosystem::Debian);
        assert_eq!(Ecosystem::from_extension("rpm"), Ecosystem::Rpm);
        assert_eq!(Ecosystem::from_extension("zip"), Ecosystem::Unknown);
    }

    #[test]
    fn test_ecosystem_parse() {
        assert_eq!(Ecosystem::parse("nuget"), Ecosystem::NuGet);
        assert_eq!(Ecosystem::parse("PyPI"), Ecosystem::PyPI);
        assert_eq!(Ecosystem::parse("Cargo"), Ecosystem::CratesIo);
        assert_eq!(
            Ecosystem::parse("Packagist"),
            Ecosystem::Other("Packagist".to_string())
        );
        assert_eq!(Ecosystem::parse("Packagist").as_str(), "Packagist");
    }

    #[test]
    fn test_ecosystem_serializes_as_osv_name() {
        let json = serde_json::to_string(&Ecosystem::Rpm).unwrap();
        assert_eq!(json, "\"RPM\"");
        let json = serde_json::to_string(&Ecosystem::Npm).unwrap();
        assert_eq!(json, "\"npm\"");
    }

    #[test]
    fn test_identity_rejects_empty_fields() {
        assert_eq!(
            PackageIdentity::new("", "1.0.0", Ecosystem::Npm),
            Err(ExtractionFailure::EmptyName)
        );
        assert_eq!(
            PackageIdentity::new("lodash", " ", Ecosystem::Npm),
            Err(ExtractionFailure::EmptyVersion)
        );
    }

    #[test]
    fn test_identity_display() {
        let identity = PackageIdentity::new("lodash", "4.17.15", Ecosystem::Npm).unwrap();
        assert_eq!(identity.to_string(), "lodash@4.17.15 (npm)");
    }
}
