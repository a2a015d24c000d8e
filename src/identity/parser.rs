//! Per-ecosystem filename conventions.
//!
//! Each [`FilenameParser`] variant turns a bare filename into a
//! `(name, version)` pair. None of them touch the case of the input.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ExtractionFailure;

/// `1.0`, `3.1.10`, `4.0.0.1`, `1.0.0-beta.2`
static NUGET_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(?:\.[0-9]+)+(?:-[A-Za-z0-9.-]+)?$").unwrap());

static LEADING_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+").unwrap());

static NPM_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-([0-9]+\.[0-9]+\.[0-9]+(?:-[A-Za-z0-9.-]+)?)$").unwrap());

static MAVEN_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-([0-9]+\.[0-9]+(?:\.[0-9]+)?(?:-[A-Za-z0-9.-]+)?)").unwrap());

static LOOSE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+\.[0-9]+(?:\.[0-9]+)?(?:-[A-Za-z0-9.-]+)?)$").unwrap());

const GENERIC_SEPARATORS: [&str; 3] = ["-", "_", "."];

/// Filename parsing strategy, selected by the declared file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenameParser {
    /// `Name.Segments.1.2.3.nupkg`
    NuGet,
    /// `name-1.2.3.tgz` / `name-1.2.3.tar.gz`
    Npm,
    /// `name-1.2.3-py3-none-any.whl` / `name-1.2.3.egg`
    Python,
    /// `name-1.2.3[-classifier].jar`
    Maven,
    /// `name<sep>1.2.3.<ext>` with `-`, `_` or `.` as separator
    Generic,
}

impl FilenameParser {
    pub fn for_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "nupkg" => FilenameParser::NuGet,
            "tgz" | "tar.gz" => FilenameParser::Npm,
            "whl" | "egg" => FilenameParser::Python,
            "jar" => FilenameParser::Maven,
            _ => FilenameParser::Generic,
        }
    }

    /// Splits `filename` into `(name, version)`.
    ///
    /// Emptiness of either half is checked by the caller when the identity
    /// is built.
    pub fn split(&self, filename: &str) -> Result<(String, String), ExtractionFailure> {
        match self {
            FilenameParser::NuGet => split_nuget(strip_suffix_ignore_case(filename, ".nupkg")),
            FilenameParser::Npm => {
                let base = strip_suffix_ignore_case(filename, ".tgz");
                split_npm(strip_suffix_ignore_case(base, ".tar.gz"))
            }
            FilenameParser::Python => {
                let base = strip_suffix_ignore_case(filename, ".whl");
                split_python(strip_suffix_ignore_case(base, ".egg"))
            }
            FilenameParser::Maven => split_maven(strip_suffix_ignore_case(filename, ".jar")),
            FilenameParser::Generic => split_generic(filename),
        }
    }
}

/// Removes `suffix` if `s` ends with it in any letter case.
pub(crate) fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> &'a str {
    if s.len() < suffix.len() {
        return s;
    }
    let start = s.len() - suffix.len();
    if s.is_char_boundary(start) && s[start..].eq_ignore_ascii_case(suffix) {
        &s[..start]
    } else {
        s
    }
}

fn split_nuget(base: &str) -> Result<(String, String), ExtractionFailure> {
    let parts: Vec<&str> = base.split('.').collect();
    if parts.len() < 2 {
        return Err(ExtractionFailure::NoVersion);
    }

    // Longest trailing run of segments that reads as a version.
    let mut version_start = None;
    for i in (0..parts.len()).rev() {
        if NUGET_VERSION.is_match(&parts[i..].join(".")) {
            version_start = Some(i);
        } else if version_start.is_some() {
            break;
        }
    }

    let version_start = version_start
        .or_else(|| parts.iter().rposition(|part| LEADING_DIGIT.is_match(part)))
        .unwrap_or(parts.len() - 1);

    Ok((
        parts[..version_start].join("."),
        parts[version_start..].join("."),
    ))
}

fn split_npm(base: &str) -> Result<(String, String), ExtractionFailure> {
    let captures = NPM_VERSION
        .captures(base)
        .ok_or(ExtractionFailure::NoVersion)?;
    let (Some(whole), Some(version)) = (captures.get(0), captures.get(1)) else {
        return Err(ExtractionFailure::NoVersion);
    };

    Ok((base[..whole.start()].to_string(), version.as_str().to_string()))
}

fn split_python(base: &str) -> Result<(String, String), ExtractionFailure> {
    let (name, rest) = base.split_once('-').ok_or(ExtractionFailure::NoVersion)?;
    // Wheel tags (`py3-none-any`) follow the version.
    let version = rest.split('-').next().unwrap_or(rest);

    Ok((name.to_string(), version.to_string()))
}

fn split_maven(base: &str) -> Result<(String, String), ExtractionFailure> {
    let captures = MAVEN_VERSION
        .captures(base)
        .ok_or(ExtractionFailure::NoVersion)?;
    let (Some(whole), Some(version)) = (captures.get(0), captures.get(1)) else {
        return Err(ExtractionFailure::NoVersion);
    };

    Ok((base[..whole.start()].to_string(), version.as_str().to_string()))
}

fn split_generic(filename: &str) -> Result<(String, String), ExtractionFailure> {
    let dot = filename.rfind('.').ok_or(ExtractionFailure::MissingExtension)?;
    let base = &filename[..dot];

    for separator in GENERIC_SEPARATORS {
        let parts: Vec<&str> = base.split(separator).collect();
        if parts.len() < 2 {
            continue;
        }
        let last = parts[parts.len() - 1];
        if LOOSE_VERSION.is_match(last) {
            return Ok((parts[..parts.len() - 1].join(separator), last.to_string()));
        }
    }

    Err(ExtractionFailure::NoVersion)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(parser: FilenameParser, filename: &str) -> (String, String) {
        parser.split(filename).unwrap()
    }

    fn pair(name: &str, version: &str) -> (String, String) {
        (name.to_string(), version.to_string())
    }

    #[test]
    fn test_for_extension() {
        assert_eq!(FilenameParser::for_extension("NUPKG"), FilenameParser::NuGet);
        assert_eq!(FilenameParser::for_extension(".tar.gz"), FilenameParser::Npm);
        assert_eq!(FilenameParser::for_extension("egg"), FilenameParser::Python);
        assert_eq!(FilenameParser::for_extension("jar"), FilenameParser::Maven);
        assert_eq!(FilenameParser::for_extension("gem"), FilenameParser::Generic);
    }

    #[test]
    fn test_nuget_dotted_names() {
        let parser = FilenameParser::NuGet;
        assert_eq!(
            split(parser, "Microsoft.AspNetCore.Identity.3.1.10.nupkg"),
            pair("Microsoft.AspNetCore.Identity", "3.1.10")
        );
        assert_eq!(
            split(parser, "System.Text.RegularExpressions.4.3.0.nupkg"),
            pair("System.Text.RegularExpressions", "4.3.0")
        );
        assert_eq!(
            split(parser, "System.Threading.4.3.0.nupkg"),
            pair("System.Threading", "4.3.0")
        );
        assert_eq!(
            split(parser, "Newtonsoft.Json.13.0.1.nupkg"),
            pair("Newtonsoft.Json", "13.0.1")
        );
    }

    #[test]
    fn test_nuget_generated_names() {
        let segments = ["Contoso", "Data", "Sql", "Client", "Extensions"];
        for k in 1..=segments.len() {
            let name = segments[..k].join(".");
            let filename = format!("{}.12.0.4.nupkg", name);
            assert_eq!(split(FilenameParser::NuGet, &filename), pair(&name, "12.0.4"));
        }
    }

    #[test]
    fn test_nuget_prerelease_and_uppercase_extension() {
        assert_eq!(
            split(FilenameParser::NuGet, "Serilog.2.10.0-dev-01187.NUPKG"),
            pair("Serilog", "2.10.0-dev-01187")
        );
        assert_eq!(
            split(FilenameParser::NuGet, "Polly.8.0.0-beta.1.nupkg"),
            pair("Polly", "8.0.0-beta.1")
        );
    }

    #[test]
    fn test_nuget_fallbacks() {
        // No dotted run: rightmost segment starting with a digit.
        assert_eq!(
            split(FilenameParser::NuGet, "Legacy.Package.7rc.nupkg"),
            pair("Legacy.Package", "7rc")
        );
        // Nothing numeric at all: last segment is the version.
        assert_eq!(
            split(FilenameParser::NuGet, "Foo.Bar.nupkg"),
            pair("Foo", "Bar")
        );
        assert_eq!(
            FilenameParser::NuGet.split("single.nupkg"),
            Err(ExtractionFailure::NoVersion)
        );
    }

    #[test]
    fn test_npm() {
        assert_eq!(
            split(FilenameParser::Npm, "lodash-4.17.15.tgz"),
            pair("lodash", "4.17.15")
        );
        assert_eq!(
            split(FilenameParser::Npm, "left-pad-1.3.0.tar.gz"),
            pair("left-pad", "1.3.0")
        );
        assert_eq!(
            split(FilenameParser::Npm, "typescript-5.4.0-beta.TGZ"),
            pair("typescript", "5.4.0-beta")
        );
        assert_eq!(
            FilenameParser::Npm.split("lodash-4.17.tgz"),
            Err(ExtractionFailure::NoVersion)
        );
    }

    #[test]
    fn test_python() {
        assert_eq!(
            split(FilenameParser::Python, "requests-2.25.1-py2.py3-none-any.whl"),
            pair("requests", "2.25.1")
        );
        assert_eq!(
            split(FilenameParser::Python, "Django-3.2.egg"),
            pair("Django", "3.2")
        );
        assert_eq!(
            FilenameParser::Python.split("nohyphen.whl"),
            Err(ExtractionFailure::NoVersion)
        );
    }

    #[test]
    fn test_maven() {
        assert_eq!(
            split(FilenameParser::Maven, "commons-lang3-3.12.0.jar"),
            pair("commons-lang3", "3.12.0")
        );
        assert_eq!(
            split(FilenameParser::Maven, "guava-31.1-jre.jar"),
            pair("guava", "31.1-jre")
        );
        assert_eq!(
            split(FilenameParser::Maven, "log4j-core-2.14.1.JAR"),
            pair("log4j-core", "2.14.1")
        );
        assert_eq!(
            FilenameParser::Maven.split("app.jar"),
            Err(ExtractionFailure::NoVersion)
        );
    }

    #[test]
    fn test_generic_separators() {
        assert_eq!(
            split(FilenameParser::Generic, "rails-7.0.4.gem"),
            pair("rails", "7.0.4")
        );
        assert_eq!(
            split(FilenameParser::Generic, "openssl_1.1.1.deb"),
            pair("openssl", "1.1.1")
        );
        assert_eq!(
            split(FilenameParser::Generic, "my-tool-2.1.zip"),
            pair("my-tool", "2.1")
        );
        assert_eq!(
            FilenameParser::Generic.split("README"),
            Err(ExtractionFailure::MissingExtension)
        );
        assert_eq!(
            FilenameParser::Generic.split("notes-final.txt"),
            Err(ExtractionFailure::NoVersion)
        );
    }

    #[test]
    fn test_strip_suffix_ignore_case() {
        assert_eq!(strip_suffix_ignore_case("A.B.NuPkg", ".nupkg"), "A.B");
        assert_eq!(strip_suffix_ignore_case("pkg", ".nupkg"), "pkg");
        assert_eq!(strip_suffix_ignore_case("x.tgz", ".jar"), "x.tgz");
    }
}
