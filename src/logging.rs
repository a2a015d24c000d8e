//! Logging initialization.
//!
//! Configures `tracing-subscriber` from the `[logging]` section of
//! [`Config`](crate::Config). Events go to stderr so that reporter output on
//! stdout stays machine-readable.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::fmt::{
    self,
    format::{Format, Json, JsonFields},
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

pub const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` overrides `config.level`.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines
/// * `"pretty"` - Human-readable multi-line output
/// * `"compact"` - One line per event
///
/// When `config.file` is set, JSON lines are appended to that file as well.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let file = open_log_file(config.file.as_deref())?;

    match config.format.to_lowercase().as_str() {
        "json" => {
            let stderr = fmt::layer()
                .json()
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr)
                .with(file.map(json_file_layer))
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e))?;
        }
        "pretty" => {
            let stderr = fmt::layer()
                .pretty()
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr)
                .with(file.map(json_file_layer))
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        "compact" => {
            let stderr = fmt::layer()
                .compact()
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr)
                .with(file.map(json_file_layer))
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize compact tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected one of {}",
                config.format,
                LOG_FORMATS.join(", ")
            ));
        }
    }

    Ok(())
}

fn open_log_file(path: Option<&Path>) -> Result<Option<File>> {
    let Some(path) = path else {
        return Ok(None);
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create log directory {}", parent.display()))?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    Ok(Some(file))
}

fn json_file_layer<S>(file: File) -> fmt::Layer<S, JsonFields, Format<Json>, Mutex<File>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_is_rejected() {
        let config = LoggingConfig {
            format: "xml".to_string(),
            ..Default::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format 'xml'"));
    }

    #[test]
    fn test_log_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("pkgscan.log");
        let file = open_log_file(Some(&path)).unwrap();
        assert!(file.is_some());
        assert!(path.exists());
        assert!(open_log_file(None).unwrap().is_none());
    }
}
