//! Reporting of scan progress, outcomes and summaries.
//!
//! The walker and orchestrator receive an `Arc<dyn Reporter>` at construction
//! and never write to the terminal themselves.

mod console;
mod json;
mod log;

pub use console::{print_history_table, ConsoleReporter};
pub use json::JsonReporter;
pub use log::LogReporter;

use crate::error::{ExtractionError, LookupError, PersistenceError};
use crate::model::{BatchSummary, PackageIdentity, ScanOutcome};
use crate::store::ScanRecord;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Receives scan events from all workers concurrently.
///
/// Implementations must serialize their own output.
pub trait Reporter: Send + Sync {
    fn report_batch_start(&self, _total: usize) {}

    fn report_scan_start(&self, _identity: &PackageIdentity) {}

    fn report_outcome(&self, outcome: &ScanOutcome);

    fn report_failure(&self, identity: &PackageIdentity, error: &LookupError);

    /// A file matched the extension but its name could not be parsed.
    fn report_skipped(&self, _path: &Path, _error: &ExtractionError) {}

    fn report_persistence_failure(&self, _identity: &PackageIdentity, _error: &PersistenceError) {}

    fn report_batch_summary(&self, summary: &BatchSummary);
}

/// Output format for scan results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Progress bar and human-readable tables
    Table,
    /// One JSON object per line
    Json,
    /// Structured log events only
    Log,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" | "jsonl" => Ok(OutputFormat::Json),
            "log" => Ok(OutputFormat::Log),
            _ => Err(format!(
                "Unknown format: {}. Use 'table', 'json', or 'log'",
                s
            )),
        }
    }
}

pub fn create_reporter(format: OutputFormat) -> Arc<dyn Reporter> {
    match format {
        OutputFormat::Table => Arc::new(ConsoleReporter::new()),
        OutputFormat::Json => Arc::new(JsonReporter::stdout()),
        OutputFormat::Log => Arc::new(LogReporter),
    }
}

pub fn print_history(records: &[ScanRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_history_table(records),
        OutputFormat::Json | OutputFormat::Log => {
            println!("{}", serde_json::to_string_pretty(records)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("TABLE"), Ok(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("jsonl"), Ok(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("log"), Ok(OutputFormat::Log));
        assert!(OutputFormat::from_str("sarif").is_err());
    }
}
