use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pkgscan::{
    config::Config,
    identity,
    logging::init_tracing,
    model::{Ecosystem, PackageIdentity},
    output::{create_reporter, print_history, OutputFormat},
    OsvClient, ScanOrchestrator, SqliteStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const VULNERABLE: u8 = 2;
}

#[derive(Parser)]
#[command(name = "pkgscan")]
#[command(
    author,
    version,
    about = "Identify package artifacts by filename and check them against OSV.dev"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (table, json, log)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Save vulnerable results to the local database
    #[arg(long, global = true, env = "USE_DB")]
    save_db: bool,

    /// Database file for saved results
    #[arg(long, global = true, env = "DB_PATH")]
    db_path: Option<PathBuf>,

    /// OSV query endpoint
    #[arg(long, global = true, env = "OSV_API_URL")]
    osv_api: Option<String>,

    /// Per-lookup timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, global = true, env = "LOG_FORMAT")]
    log_format: Option<String>,

    /// Also append JSON logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Exit with code 2 if any vulnerability is found
    #[arg(long, global = true)]
    fail_on_vuln: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a single package
    Package {
        /// Package name
        #[arg(long)]
        name: String,

        /// Package version
        #[arg(long)]
        version: String,

        /// Ecosystem (NuGet, npm, PyPI, Maven, ...)
        #[arg(long)]
        ecosystem: String,

        /// Write the raw OSV response to this file
        #[arg(long, default_value = "api_response.json")]
        raw_output: PathBuf,
    },

    /// Scan a directory for package files
    Dir {
        /// Directory to scan recursively
        path: PathBuf,

        /// File extension to look for (e.g. nupkg, tgz, jar)
        #[arg(long)]
        ext: String,

        /// Ecosystem override; derived from the extension when omitted
        #[arg(long, default_value = "")]
        ecosystem: String,

        /// Maximum number of lookups in flight
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Show the package identity extracted from filenames
    Extract {
        #[arg(required = true)]
        filenames: Vec<String>,

        /// Ecosystem override; derived from the extension when omitted
        #[arg(long, default_value = "")]
        ecosystem: String,
    },

    /// List saved scan results
    History {
        /// Number of records to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();

    if let Commands::Config { init, path } = cli.command {
        handle_config(init, path)?;
        return Ok(exit_codes::SUCCESS);
    }

    let mut config = Config::load()?;
    apply_overrides(&mut config, &cli);
    config.validate()?;
    init_tracing(&config.logging)?;

    let format_str = cli.format.clone().unwrap_or(config.default_format.clone());
    let format = OutputFormat::from_str(&format_str).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Package {
            name,
            version,
            ecosystem,
            raw_output,
        } => {
            let identity = PackageIdentity::new(name, version, Ecosystem::parse(&ecosystem))
                .map_err(|reason| anyhow::anyhow!("invalid package: {}", reason))?;
            run_package(&config, format, identity, raw_output, cli.fail_on_vuln).await
        }
        Commands::Dir {
            path,
            ext,
            ecosystem,
            concurrency,
        } => {
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            run_directory(&config, format, path, &ext, &ecosystem, cli.fail_on_vuln).await
        }
        Commands::Extract {
            filenames,
            ecosystem,
        } => Ok(run_extract(&filenames, &ecosystem, format)),
        Commands::History { limit } => {
            let records = match SqliteStore::open_if_exists(&config.persistence.database_path)? {
                Some(store) => store.latest_scans(limit)?,
                None => Vec::new(),
            };
            print_history(&records, format)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { .. } => Ok(exit_codes::SUCCESS),
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.osv_api {
        config.osv_api_url = url.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout_secs = timeout;
    }
    if cli.save_db {
        config.persistence.enabled = true;
    }
    if let Some(path) = &cli.db_path {
        config.persistence.database_path = path.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    if let Some(file) = &cli.log_file {
        config.logging.file = Some(file.clone());
    }
}

fn build_orchestrator(config: &Config, format: OutputFormat) -> Result<ScanOrchestrator> {
    let timeout = config.request_timeout();
    let client = OsvClient::with_settings(&config.osv_api_url, timeout)?;

    let mut orchestrator = ScanOrchestrator::new(Arc::new(client), create_reporter(format))
        .with_concurrency(config.concurrency)
        .with_timeout(timeout + Duration::from_secs(1));

    if config.persistence.enabled {
        let store = SqliteStore::open(&config.persistence.database_path).with_context(|| {
            format!(
                "cannot open database {}",
                config.persistence.database_path.display()
            )
        })?;
        info!(path = %config.persistence.database_path.display(), "saving results to database");
        orchestrator = orchestrator.with_store(Arc::new(store));
    }

    cancel_on_interrupt(orchestrator.cancellation_token());
    Ok(orchestrator)
}

fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling scan");
            token.cancel();
        }
    });
}

async fn run_package(
    config: &Config,
    format: OutputFormat,
    identity: PackageIdentity,
    raw_output: PathBuf,
    fail_on_vuln: bool,
) -> Result<u8> {
    let orchestrator = build_orchestrator(config, format)?;
    let outcome = orchestrator.scan_single(identity).await?;

    if let Err(e) = std::fs::write(&raw_output, &outcome.raw_response) {
        warn!(path = %raw_output.display(), error = %e, "failed to write raw API response");
    }

    if fail_on_vuln && outcome.is_vulnerable() {
        return Ok(exit_codes::VULNERABLE);
    }
    Ok(exit_codes::SUCCESS)
}

async fn run_directory(
    config: &Config,
    format: OutputFormat,
    path: PathBuf,
    extension: &str,
    ecosystem: &str,
    fail_on_vuln: bool,
) -> Result<u8> {
    let orchestrator = build_orchestrator(config, format)?;
    let summary = orchestrator
        .scan_directory(path, extension, ecosystem)
        .await?;

    if fail_on_vuln && summary.vulnerable > 0 {
        return Ok(exit_codes::VULNERABLE);
    }
    Ok(exit_codes::SUCCESS)
}

fn run_extract(filenames: &[String], ecosystem: &str, format: OutputFormat) -> u8 {
    let mut failed = 0;

    for filename in filenames {
        match identity::extract(filename, ecosystem) {
            Ok(identity) => match format {
                OutputFormat::Table => println!(
                    "{:<50} name: {:<35} version: {:<15} ecosystem: {}",
                    filename,
                    identity.name(),
                    identity.version(),
                    identity.ecosystem()
                ),
                OutputFormat::Json | OutputFormat::Log => {
                    println!(
                        "{}",
                        serde_json::json!({ "filename": filename, "package": identity })
                    );
                }
            },
            Err(e) => {
                failed += 1;
                eprintln!("{}", e);
            }
        }
    }

    if failed > 0 {
        exit_codes::ERROR
    } else {
        exit_codes::SUCCESS
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'pkgscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
