//! Bounded-concurrency scan orchestration.
//!
//! A batch moves through [`BatchState::Idle`], `Dispatching`, `Collecting`
//! and `Done`. During dispatch a semaphore permit is acquired *before* each
//! lookup task is spawned, so admission blocks while `concurrency` lookups
//! are in flight. The batch summary is reported only after every dispatched
//! task has been joined.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::checker::{derive_finding, VulnerabilityLookup};
use crate::error::{LookupError, ScanError};
use crate::model::{BatchSummary, PackageIdentity, ScanOutcome};
use crate::output::Reporter;
use crate::policy::ResultPolicy;
use crate::store::ResultStore;
use crate::walker::DirectoryWalker;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatchState {
    Idle = 0,
    Dispatching = 1,
    Collecting = 2,
    Done = 3,
}

impl BatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => BatchState::Dispatching,
            2 => BatchState::Collecting,
            3 => BatchState::Done,
            _ => BatchState::Idle,
        }
    }
}

/// What to scan.
#[derive(Debug, Clone)]
pub enum ScanRequest {
    Single(PackageIdentity),
    Directory {
        path: PathBuf,
        extension: String,
        ecosystem_hint: String,
    },
}

/// Result of [`ScanOrchestrator::run`].
#[derive(Debug)]
pub enum ScanReport {
    Single(ScanOutcome),
    Batch(BatchSummary),
}

pub struct ScanOrchestrator {
    lookup: Arc<dyn VulnerabilityLookup>,
    reporter: Arc<dyn Reporter>,
    store: Option<Arc<dyn ResultStore>>,
    policy: ResultPolicy,
    concurrency: usize,
    timeout: Duration,
    cancel: CancellationToken,
    state: AtomicU8,
}

impl ScanOrchestrator {
    pub fn new(lookup: Arc<dyn VulnerabilityLookup>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            lookup,
            reporter,
            store: None,
            policy: ResultPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            cancel: CancellationToken::new(),
            state: AtomicU8::new(BatchState::Idle as u8),
        }
    }

    /// Persists vulnerable outcomes to `store`.
    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self.policy = ResultPolicy::new(true);
        self
    }

    /// Sets the maximum number of lookups in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn policy(&self) -> ResultPolicy {
        self.policy
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> BatchState {
        BatchState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: BatchState) {
        debug!(?state, "scan state changed");
        self.state.store(state as u8, Ordering::Release);
    }

    pub async fn run(&self, request: ScanRequest) -> Result<ScanReport, ScanError> {
        match request {
            ScanRequest::Single(identity) => self.scan_single(identity).await.map(ScanReport::Single),
            ScanRequest::Directory {
                path,
                extension,
                ecosystem_hint,
            } => self
                .scan_directory(path, &extension, &ecosystem_hint)
                .await
                .map(ScanReport::Batch),
        }
    }

    /// Looks up one identity. A lookup failure fails the whole request.
    pub async fn scan_single(&self, identity: PackageIdentity) -> Result<ScanOutcome, ScanError> {
        self.set_state(BatchState::Dispatching);
        let unit = self.unit();
        self.set_state(BatchState::Collecting);
        let report = unit.run(identity.clone()).await;
        self.set_state(BatchState::Done);

        report
            .result
            .map_err(|source| ScanError::Lookup { identity, source })
    }

    /// Walks `root` for files ending in `extension` and scans every identity
    /// found.
    pub async fn scan_directory(
        &self,
        root: PathBuf,
        extension: &str,
        ecosystem_hint: &str,
    ) -> Result<BatchSummary, ScanError> {
        let walker = DirectoryWalker::new(extension, ecosystem_hint, self.reporter.clone());
        let identities = tokio::task::spawn_blocking(move || walker.scan(&root))
            .await
            .map_err(|e| ScanError::Walk(e.to_string()))??;

        self.scan_batch(identities).await
    }

    pub async fn scan_batch(&self, identities: Vec<PackageIdentity>) -> Result<BatchSummary, ScanError> {
        self.set_state(BatchState::Dispatching);
        self.reporter.report_batch_start(identities.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<UnitReport> = JoinSet::new();
        let mut summary = BatchSummary::default();

        let mut pending = identities.into_iter();
        while let Some(identity) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    summary.undispatched = skip_remaining(identity, pending);
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        warn!(error = %e, "lookup semaphore closed");
                        summary.undispatched = skip_remaining(identity, pending);
                        break;
                    }
                },
            };

            summary.dispatched += 1;
            let unit = self.unit();
            join_set.spawn(async move {
                let report = unit.run(identity).await;
                drop(permit);
                report
            });
        }

        self.set_state(BatchState::Collecting);

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(report) => tally(&mut summary, &report),
                Err(e) => {
                    warn!(error = %e, "lookup task failed");
                    summary.failed += 1;
                }
            }
        }

        summary.cancelled = self.cancel.is_cancelled();
        self.set_state(BatchState::Done);
        self.reporter.report_batch_summary(&summary);

        if !summary.cancelled && summary.dispatched > 0 && summary.succeeded == 0 {
            return Err(ScanError::LookupUnavailable {
                failed: summary.failed,
            });
        }

        Ok(summary)
    }

    fn unit(&self) -> ScanUnit {
        ScanUnit {
            lookup: self.lookup.clone(),
            reporter: self.reporter.clone(),
            store: self.store.clone(),
            policy: self.policy,
            timeout: self.timeout,
            cancel: self.cancel.clone(),
        }
    }
}

/// Everything one lookup task needs, cloned out of the orchestrator.
#[derive(Clone)]
struct ScanUnit {
    lookup: Arc<dyn VulnerabilityLookup>,
    reporter: Arc<dyn Reporter>,
    store: Option<Arc<dyn ResultStore>>,
    policy: ResultPolicy,
    timeout: Duration,
    cancel: CancellationToken,
}

struct UnitReport {
    result: Result<ScanOutcome, LookupError>,
    /// `None` when the policy did not select the outcome.
    persisted: Option<bool>,
}

impl ScanUnit {
    async fn run(self, identity: PackageIdentity) -> UnitReport {
        self.reporter.report_scan_start(&identity);

        let outcome = match self.fetch_outcome(&identity).await {
            Ok(outcome) => outcome,
            Err(LookupError::Cancelled) => {
                warn!(
                    name = identity.name(),
                    version = identity.version(),
                    ecosystem = %identity.ecosystem(),
                    "lookup cancelled"
                );
                return UnitReport {
                    result: Err(LookupError::Cancelled),
                    persisted: None,
                };
            }
            Err(e) => {
                warn!(
                    name = identity.name(),
                    version = identity.version(),
                    ecosystem = %identity.ecosystem(),
                    error = %e,
                    "vulnerability lookup failed"
                );
                self.reporter.report_failure(&identity, &e);
                return UnitReport {
                    result: Err(e),
                    persisted: None,
                };
            }
        };

        self.reporter.report_outcome(&outcome);
        let persisted = self.persist(&outcome).await;

        UnitReport {
            result: Ok(outcome),
            persisted,
        }
    }

    async fn fetch_outcome(&self, identity: &PackageIdentity) -> Result<ScanOutcome, LookupError> {
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(LookupError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.lookup.query(identity)) => match result {
                Ok(response) => response?,
                Err(_) => return Err(LookupError::Timeout(self.timeout)),
            },
        };

        let findings = response
            .vulnerabilities
            .into_iter()
            .map(|vulnerability| derive_finding(vulnerability, identity.name()))
            .collect();

        debug!(
            source = self.lookup.name(),
            name = identity.name(),
            version = identity.version(),
            "lookup complete"
        );

        Ok(ScanOutcome::new(identity.clone(), findings, response.raw))
    }

    async fn persist(&self, outcome: &ScanOutcome) -> Option<bool> {
        let store = self.store.as_ref()?;
        if !self.policy.should_persist(outcome) {
            return None;
        }

        match store
            .save(&outcome.identity, &outcome.findings, &outcome.raw_response)
            .await
        {
            Ok(rows) => {
                debug!(name = outcome.identity.name(), rows, "scan results saved");
                Some(true)
            }
            Err(e) => {
                warn!(
                    name = outcome.identity.name(),
                    version = outcome.identity.version(),
                    error = %e,
                    "failed to save scan results"
                );
                self.reporter.report_persistence_failure(&outcome.identity, &e);
                Some(false)
            }
        }
    }
}

/// Logs `first` and everything left in `rest` as not scanned; returns the count.
fn skip_remaining(
    first: PackageIdentity,
    rest: impl Iterator<Item = PackageIdentity>,
) -> usize {
    let mut skipped = 0;
    for identity in std::iter::once(first).chain(rest) {
        warn!(
            name = identity.name(),
            version = identity.version(),
            ecosystem = %identity.ecosystem(),
            "scan cancelled before lookup was dispatched"
        );
        skipped += 1;
    }
    skipped
}

fn tally(summary: &mut BatchSummary, report: &UnitReport) {
    match &report.result {
        Ok(outcome) => {
            summary.succeeded += 1;
            summary.findings += outcome.findings.len();
            if outcome.is_vulnerable() {
                summary.vulnerable += 1;
            }
        }
        Err(_) => summary.failed += 1,
    }

    match report.persisted {
        Some(true) => summary.persisted += 1,
        Some(false) => summary.persistence_failures += 1,
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::LookupResponse;
    use crate::error::ExtractionError;
    use crate::model::{Ecosystem, Vulnerability};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    struct StaticLookup {
        vuln_ids: Vec<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl VulnerabilityLookup for StaticLookup {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn query(&self, _identity: &PackageIdentity) -> Result<LookupResponse, LookupError> {
            if self.fail {
                return Err(LookupError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(LookupResponse {
                vulnerabilities: self
                    .vuln_ids
                    .iter()
                    .map(|id| Vulnerability {
                        id: id.to_string(),
                        ..Default::default()
                    })
                    .collect(),
                raw: br#"{"vulns":[]}"#.to_vec(),
            })
        }
    }

    struct SlowLookup;

    #[async_trait]
    impl VulnerabilityLookup for SlowLookup {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn query(&self, _identity: &PackageIdentity) -> Result<LookupResponse, LookupError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(LookupResponse::default())
        }
    }

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<String>>,
    }

    impl Reporter for EventLog {
        fn report_batch_start(&self, total: usize) {
            self.events.lock().unwrap().push(format!("start {}", total));
        }
        fn report_outcome(&self, outcome: &ScanOutcome) {
            self.events
                .lock()
                .unwrap()
                .push(format!("outcome {}", outcome.identity.name()));
        }
        fn report_failure(&self, identity: &PackageIdentity, _error: &LookupError) {
            self.events
                .lock()
                .unwrap()
                .push(format!("failure {}", identity.name()));
        }
        fn report_skipped(&self, _path: &Path, error: &ExtractionError) {
            self.events
                .lock()
                .unwrap()
                .push(format!("skipped {}", error.filename));
        }
        fn report_batch_summary(&self, summary: &BatchSummary) {
            self.events
                .lock()
                .unwrap()
                .push(format!("summary {}", summary.processed()));
        }
    }

    fn identity(name: &str) -> PackageIdentity {
        PackageIdentity::new(name, "1.0.0", Ecosystem::Npm).unwrap()
    }

    #[test]
    fn test_concurrency_zero_is_clamped() {
        let orchestrator = ScanOrchestrator::new(
            Arc::new(StaticLookup { vuln_ids: vec![], fail: false }),
            Arc::new(EventLog::default()),
        )
        .with_concurrency(0);
        assert_eq!(orchestrator.concurrency(), 1);
        assert_eq!(orchestrator.state(), BatchState::Idle);
        assert!(!orchestrator.policy().persistence_enabled());
    }

    #[tokio::test]
    async fn test_single_scan_derives_findings() {
        let reporter = Arc::new(EventLog::default());
        let orchestrator = ScanOrchestrator::new(
            Arc::new(StaticLookup {
                vuln_ids: vec!["GHSA-1", "GHSA-2"],
                fail: false,
            }),
            reporter.clone(),
        );

        let outcome = orchestrator.scan_single(identity("lodash")).await.unwrap();
        assert_eq!(outcome.findings.len(), 2);
        assert_eq!(outcome.findings[0].fix_version, "No fix version found");
        assert_eq!(outcome.raw_response, br#"{"vulns":[]}"#.to_vec());
        assert_eq!(orchestrator.state(), BatchState::Done);
        assert_eq!(*reporter.events.lock().unwrap(), vec!["outcome lodash".to_string()]);
    }

    #[tokio::test]
    async fn test_single_scan_failure_is_fatal() {
        let orchestrator = ScanOrchestrator::new(
            Arc::new(StaticLookup { vuln_ids: vec![], fail: true }),
            Arc::new(EventLog::default()),
        );

        let err = orchestrator.scan_single(identity("lodash")).await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::Lookup {
                source: LookupError::Status { status: 503, .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_batch_reports_summary_after_all_outcomes() {
        let reporter = Arc::new(EventLog::default());
        let orchestrator = ScanOrchestrator::new(
            Arc::new(StaticLookup {
                vuln_ids: vec!["GHSA-1"],
                fail: false,
            }),
            reporter.clone(),
        )
        .with_concurrency(2);

        let identities = ["a", "b", "c", "d"].iter().map(|n| identity(n)).collect();
        let summary = orchestrator.scan_batch(identities).await.unwrap();

        assert_eq!(summary.dispatched, 4);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.vulnerable, 4);
        assert_eq!(summary.findings, 4);
        assert_eq!(summary.persisted, 0);
        assert!(!summary.cancelled);

        let events = reporter.events.lock().unwrap();
        assert_eq!(events.first().map(String::as_str), Some("start 4"));
        assert_eq!(events.last().map(String::as_str), Some("summary 4"));
        assert_eq!(events.len(), 6);
    }

    #[tokio::test]
    async fn test_all_failed_batch_is_an_error() {
        let orchestrator = ScanOrchestrator::new(
            Arc::new(StaticLookup { vuln_ids: vec![], fail: true }),
            Arc::new(EventLog::default()),
        );

        let err = orchestrator
            .scan_batch(vec![identity("a"), identity("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::LookupUnavailable { failed: 2 }));
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds() {
        let orchestrator = ScanOrchestrator::new(
            Arc::new(StaticLookup { vuln_ids: vec![], fail: true }),
            Arc::new(EventLog::default()),
        );

        let summary = orchestrator.scan_batch(Vec::new()).await.unwrap();
        assert_eq!(summary, BatchSummary::default());
    }

    #[tokio::test]
    async fn test_lookup_timeout() {
        let orchestrator = ScanOrchestrator::new(Arc::new(SlowLookup), Arc::new(EventLog::default()))
            .with_timeout(Duration::from_millis(20));

        let err = orchestrator.scan_single(identity("slow")).await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::Lookup {
                source: LookupError::Timeout(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let token = CancellationToken::new();
        token.cancel();
        let orchestrator = ScanOrchestrator::new(
            Arc::new(StaticLookup { vuln_ids: vec![], fail: false }),
            Arc::new(EventLog::default()),
        )
        .with_cancellation(token);

        let summary = orchestrator
            .scan_batch(vec![identity("a"), identity("b")])
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.dispatched, 0);
        assert_eq!(summary.undispatched, 2);
    }

    #[tokio::test]
    async fn test_directory_request() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("lodash-4.17.15.tgz"), b"").unwrap();
        std::fs::write(dir.path().join("broken.tgz"), b"").unwrap();

        let reporter = Arc::new(EventLog::default());
        let orchestrator = ScanOrchestrator::new(
            Arc::new(StaticLookup { vuln_ids: vec![], fail: false }),
            reporter.clone(),
        );

        let report = orchestrator
            .run(ScanRequest::Directory {
                path: dir.path().to_path_buf(),
                extension: "tgz".to_string(),
                ecosystem_hint: String::new(),
            })
            .await
            .unwrap();

        let ScanReport::Batch(summary) = report else {
            panic!("expected a batch report");
        };
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.vulnerable, 0);

        let events = reporter.events.lock().unwrap();
        assert!(events.contains(&"skipped broken.tgz".to_string()));
        assert!(events.contains(&"outcome lodash".to_string()));
    }

    #[tokio::test]
    async fn test_directory_request_bad_root() {
        let orchestrator = ScanOrchestrator::new(
            Arc::new(StaticLookup { vuln_ids: vec![], fail: false }),
            Arc::new(EventLog::default()),
        );

        let err = orchestrator
            .run(ScanRequest::Directory {
                path: PathBuf::from("/nonexistent/pkgscan/root"),
                extension: "tgz".to_string(),
                ecosystem_hint: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::DirectoryAccess { .. }));
    }
}
