use crate::error::{ExtractionError, LookupError, PersistenceError};
use crate::model::{BatchSummary, Finding, PackageIdentity, ScanOutcome};
use crate::store::ScanRecord;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

use super::Reporter;

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Fixed In")]
    fixed_in: String,
    #[tabled(rename = "Published")]
    published: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Scanned")]
    created_at: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Ecosystem")]
    ecosystem: String,
    #[tabled(rename = "ID")]
    vuln_id: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Fixed In")]
    fixed_in: String,
}

/// Human-readable terminal output with a progress bar for batches.
pub struct ConsoleReporter {
    // Also serializes printing across workers.
    progress: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            progress: Mutex::new(None),
        }
    }

    fn emit(&self, text: &str, advance: bool) {
        let guard = match self.progress.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match guard.as_ref() {
            Some(pb) => {
                pb.println(text);
                if advance {
                    pb.inc(1);
                }
            }
            None => println!("{}", text),
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn report_batch_start(&self, total: usize) {
        println!("Found {} package files to scan.", total);
        if total < 2 {
            return;
        }

        let pb = progress_bar(total);
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut guard) = self.progress.lock() {
            *guard = Some(pb);
        }
    }

    fn report_outcome(&self, outcome: &ScanOutcome) {
        self.emit(&format_outcome(outcome), true);
    }

    fn report_failure(&self, identity: &PackageIdentity, error: &LookupError) {
        self.emit(&format!("Error checking {}: {}", identity, error), true);
    }

    fn report_skipped(&self, path: &Path, error: &ExtractionError) {
        self.emit(
            &format!("Skipping {}: {}", path.display(), error.reason),
            false,
        );
    }

    fn report_persistence_failure(&self, identity: &PackageIdentity, error: &PersistenceError) {
        self.emit(
            &format!("Could not save results for {}: {}", identity, error),
            false,
        );
    }

    fn report_batch_summary(&self, summary: &BatchSummary) {
        if let Ok(mut guard) = self.progress.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }

        println!();
        print_summary(summary);
    }
}

/// Draws on stdout with the reporter's own lines; tracing keeps stderr.
fn progress_bar(total: usize) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} Checking packages...")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());

    ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stdout()).with_style(style)
}

fn format_outcome(outcome: &ScanOutcome) -> String {
    if outcome.findings.is_empty() {
        return format!("{}: no vulnerabilities found", outcome.identity);
    }

    let rows: Vec<VulnRow> = outcome.findings.iter().map(vuln_row).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();

    format!(
        "{}: {} vulnerabilities\n{}",
        outcome.identity,
        outcome.findings.len(),
        table
    )
}

fn vuln_row(finding: &Finding) -> VulnRow {
    let vuln = &finding.vulnerability;
    VulnRow {
        id: vuln.id.clone(),
        severity: finding.severity_rating.clone(),
        fixed_in: finding.fix_version.clone(),
        published: vuln
            .published
            .as_deref()
            .map(format_date)
            .unwrap_or_else(|| "-".to_string()),
        summary: truncate(vuln.summary.as_deref().unwrap_or("-"), 60),
    }
}

fn print_summary(summary: &BatchSummary) {
    println!("Summary:");
    println!("  Packages processed: {}", summary.processed());
    if summary.failed > 0 {
        println!("  Failed lookups: {}", summary.failed);
    }
    println!(
        "  Vulnerable packages: {} ({} vulnerabilities)",
        summary.vulnerable, summary.findings
    );
    if summary.persisted > 0 || summary.persistence_failures > 0 {
        println!(
            "  Saved to database: {} ({} failed)",
            summary.persisted, summary.persistence_failures
        );
    }
    if summary.cancelled {
        println!(
            "  Scan was cancelled before all packages were checked ({} not started).",
            summary.undispatched
        );
    }
}

pub fn print_history_table(records: &[ScanRecord]) -> Result<()> {
    if records.is_empty() {
        println!("No stored scan results.");
        return Ok(());
    }

    let rows: Vec<HistoryRow> = records
        .iter()
        .map(|r| HistoryRow {
            created_at: r.created_at.as_deref().map(format_date).unwrap_or_default(),
            package: truncate(&format!("{}@{}", r.package_name, r.version), 50),
            ecosystem: r.ecosystem.clone(),
            vuln_id: r.vuln_id.clone(),
            severity: r.severity_rating.clone(),
            fixed_in: r.fix_version.clone(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
    Ok(())
}

/// Keeps the date part of an RFC 3339 timestamp.
fn format_date(timestamp: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => parsed.format("%Y-%m-%d").to_string(),
        Err(_) => timestamp.to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
