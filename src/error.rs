//! Error types for extraction, lookups, persistence and batch scans.
//!
//! Failures local to one unit of work ([`ExtractionError`], [`LookupError`],
//! [`PersistenceError`]) are reported and skipped by the caller. [`ScanError`]
//! is only returned when the batch as a whole cannot produce a meaningful
//! result.

use std::path::PathBuf;
use std::time::Duration;

use crate::model::PackageIdentity;

/// A filename from which no package identity could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot extract package identity from '{filename}': {reason}")]
pub struct ExtractionError {
    pub filename: String,
    pub reason: ExtractionFailure,
}

impl ExtractionError {
    pub fn new(filename: impl Into<String>, reason: ExtractionFailure) -> Self {
        Self {
            filename: filename.into(),
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionFailure {
    #[error("filename is empty")]
    EmptyFilename,
    #[error("filename has no extension")]
    MissingExtension,
    #[error("no version pattern found")]
    NoVersion,
    #[error("package name is empty")]
    EmptyName,
    #[error("package version is empty")]
    EmptyVersion,
}

/// Failure of a single vulnerability lookup.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("request to vulnerability database failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("vulnerability database returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("lookup cancelled")]
    Cancelled,

    #[error("lookup task failed: {0}")]
    Task(String),
}

/// Failure writing one outcome to the result store.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("cannot create database directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store worker failed: {0}")]
    Worker(String),
}

/// Errors that make a whole batch meaningless.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("cannot scan directory {path}: {reason}")]
    DirectoryAccess { path: PathBuf, reason: String },

    #[error("lookup for {identity} failed: {source}")]
    Lookup {
        identity: PackageIdentity,
        #[source]
        source: LookupError,
    },

    #[error("all {failed} lookups failed; is the vulnerability database reachable?")]
    LookupUnavailable { failed: usize },

    #[error("directory walk task failed: {0}")]
    Walk(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
