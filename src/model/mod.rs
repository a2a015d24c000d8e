//! Core data types for package identities, vulnerabilities and scan outcomes.
//!
//! - [`PackageIdentity`] - name, version and ecosystem of one artifact
//! - [`Ecosystem`] - the packaging system an identity belongs to
//! - [`Vulnerability`] - an OSV.dev vulnerability record
//! - [`Finding`] - a vulnerability with derived severity and fix version
//! - [`ScanOutcome`] - the result of looking up one identity
//! - [`BatchSummary`] - totals for a batch of lookups
//!
//! # Example
//!
//! ```
//! use pkgscan::{Ecosystem, PackageIdentity};
//!
//! let identity = PackageIdentity::new("lodash", "4.17.15", Ecosystem::Npm).unwrap();
//! assert_eq!(identity.to_string(), "lodash@4.17.15 (npm)");
//! ```

mod outcome;
mod package;
mod vulnerability;

pub use outcome::*;
pub use package::*;
pub use vulnerability::*;
