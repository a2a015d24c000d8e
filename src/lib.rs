pub mod checker;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod policy;
pub mod store;
pub mod walker;

pub use checker::{OsvClient, VulnerabilityLookup};
pub use config::Config;
pub use error::{ExtractionError, LookupError, PersistenceError, ScanError};
pub use model::{BatchSummary, Ecosystem, Finding, PackageIdentity, ScanOutcome, Vulnerability};
pub use orchestrator::{BatchState, ScanOrchestrator, ScanReport, ScanRequest};
pub use output::Reporter;
pub use policy::ResultPolicy;
pub use store::{ResultStore, SqliteStore};
pub use walker::DirectoryWalker;
