//! cloud-sweep: remove every resource in an AWS account that the filters allow
//!
//! Discovery runs across the configured regions, the filter engine decides
//! what may go, and the removal queue retries in rounds until nothing more
//! can be removed. Without `--execute` the run only reports candidates.

mod exit_codes;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use sweep_aws::{default_registry, get_current_account_id, load_sessions};
use sweep_core::{LogReporter, RunError, SweepConfig, SweepOptions, run_sweep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// SDK targets kept at WARN unless RUST_LOG says otherwise
const QUIET_TARGETS: &[&str] = &["aws_config", "aws_smithy_runtime", "aws_smithy_runtime_api", "hyper"];

#[derive(Parser, Debug)]
#[command(name = "cloud-sweep")]
#[command(about = "Remove cloud resources in rounds until the account is clean")]
#[command(version)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Arguments for the run command
#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Path to the TOML config file
    #[arg(short, long, env = "CLOUD_SWEEP_CONFIG", default_value = "sweep.toml")]
    config: PathBuf,

    /// Actually remove resources (default is dry-run)
    #[arg(long)]
    execute: bool,

    /// Region to sweep; repeat to sweep several (replaces the config list)
    #[arg(long = "region")]
    regions: Vec<String>,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Write the final report as JSON to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the maximum number of rounds
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Override the number of concurrent removals
    #[arg(long)]
    concurrency: Option<usize>,
}

impl RunArgs {
    /// Apply command line overrides on top of the file config
    fn apply(&self, config: &mut SweepConfig) {
        if !self.regions.is_empty() {
            config.regions = self.regions.clone();
        }
        if let Some(max_rounds) = self.max_rounds {
            config.engine.max_rounds = max_rounds;
        }
        if let Some(concurrency) = self.concurrency {
            config.engine.concurrency = concurrency;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover, filter and remove resources
    Run(Box<RunArgs>),

    /// List the resource types this build can sweep
    ResourceTypes,
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            print_error(&e);
            exit_codes::ABORTED
        }
    };
    std::process::exit(code);
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for target in QUIET_TARGETS {
        if let Ok(directive) = format!("{target}=warn").parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the exit code; `Err` means the run aborted.
async fn run() -> Result<i32> {
    // Filter out bare "--" args that cargo-make may pass
    let filtered_args: Vec<String> = std::env::args().filter(|a| a != "--").collect();
    let args = Args::parse_from(filtered_args);

    init_tracing(args.verbose);

    match args.command {
        Command::Run(run_args) => handle_run(*run_args).await,
        Command::ResourceTypes => {
            handle_resource_types()?;
            Ok(exit_codes::OK)
        }
    }
}

/// Handle the run command
async fn handle_run(args: RunArgs) -> Result<i32> {
    let mut config = SweepConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    args.apply(&mut config);
    let compiled = config.compile().context("Invalid configuration")?;

    if let Some(profile) = &args.profile {
        info!(profile = %profile, "Using AWS profile");
    }

    let sessions = load_sessions(&compiled.regions, args.profile.as_deref()).await;
    let account = get_current_account_id(&sessions.global).await?;
    if compiled.is_blocklisted(&account) {
        bail!("Account {account} is on the account blocklist, refusing to sweep it");
    }

    let registry = default_registry()?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling after in-flight removals finish");
            signal_token.cancel();
        }
    });

    let dry_run = !args.execute;
    info!(
        account_id = %account,
        regions = ?compiled.regions,
        dry_run,
        max_rounds = compiled.queue.max_rounds,
        concurrency = compiled.queue.concurrency,
        "Starting sweep"
    );
    if dry_run {
        info!("Dry-run mode: nothing will be removed (pass --execute to remove)");
    }

    let options = SweepOptions {
        dry_run,
        reporter: Arc::new(LogReporter::new()),
        cancel,
    };
    let report = match run_sweep(&registry, &sessions, &compiled, options).await {
        Ok(report) => report,
        Err(e @ RunError::DiscoveryFailed(_)) => {
            return Err(anyhow::Error::new(e).context("Nothing could be listed, aborting"));
        }
        Err(e) => return Err(e.into()),
    };

    report.print_summary();
    if let Some(path) = &args.output {
        report.write_json(path)?;
    }

    Ok(if report.is_success() {
        exit_codes::OK
    } else {
        exit_codes::FAILURES
    })
}

/// Handle the resource-types command
fn handle_resource_types() -> Result<()> {
    let registry = default_registry()?;

    println!("{:<30} {:<10}", "TYPE", "SCOPE");
    println!("{}", "-".repeat(40));
    for entry in registry.entries() {
        println!("{:<30} {:<10}", entry.name, entry.scope.as_ref());
    }
    println!("\nTotal: {} resource types", registry.len());

    Ok(())
}
