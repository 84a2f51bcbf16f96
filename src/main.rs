use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use sweeper::{
    config::{self, SweeperConfig},
    disk::{self, SystemDisks},
    observability,
    retention::{
        ConfigFileSource, RunSummary, SweepContext, SweepError, SweepOptions, SweepTrigger,
        Sweeper, run_sweep, start_retention_worker,
    },
    state::{self, SweepLock},
};
use tokio_util::sync::CancellationToken;

/// CLI arguments for the sweeper
#[derive(Parser, Debug)]
#[command(version, about = "Scheduled file-retention sweeper", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./sweeper.toml, then
    /// ~/.config/sweeper/sweeper.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the daily retention worker until interrupted (default)
    Serve,
    /// Run one sweep now and print its summary as JSON
    Sweep {
        /// Count eligible files without deleting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the last recorded run
    Status {
        /// Number of runs to show, newest first
        #[arg(short, long, default_value = "1")]
        limit: usize,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the volume holding a path and its capacity
    DriveInfo {
        path: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Initialize a new configuration file
    Init {
        /// Path to create the config file (defaults to ~/.config/sweeper/sweeper.toml)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show enabled compile-time features
    Features,
}

/// Exit code for a sweep interrupted by Ctrl+C.
const EXIT_CANCELLED: i32 = 130;

/// Get the default config directory path.
fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sweeper"))
}

/// Get the default config file path.
fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("sweeper.toml"))
}

/// Find an existing config file.
fn find_config_path(explicit_path: Option<&str>) -> Result<Option<PathBuf>, String> {
    if let Some(path) = explicit_path {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()));
        }
        return Ok(Some(path));
    }

    let cwd_config = PathBuf::from("sweeper.toml");
    if cwd_config.exists() {
        return Ok(Some(cwd_config));
    }

    Ok(default_config_path().filter(|p| p.exists()))
}

/// Resolve the config path, creating default config if necessary.
/// Returns the config path and whether it was newly created.
fn resolve_config_path(explicit_path: Option<&str>) -> Result<(PathBuf, bool), String> {
    match find_config_path(explicit_path)? {
        Some(path) => Ok((path, false)),
        None => create_default_config(),
    }
}

/// Create the default configuration file.
fn create_default_config() -> Result<(PathBuf, bool), String> {
    let config_path = default_config_path().ok_or("Could not determine config directory")?;
    write_config_file(&config_path)?;
    Ok((config_path, true))
}

fn write_config_file(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    std::fs::write(path, config::default_config_toml())
        .map_err(|e| format!("Failed to write config file: {}", e))
}

/// Locate and load the config, exiting on failure.
fn load_existing_config(explicit_path: Option<&str>) -> (PathBuf, SweeperConfig) {
    let path = match find_config_path(explicit_path) {
        Ok(Some(path)) => path,
        Ok(None) => {
            eprintln!("No config file found. Run `sweeper init` or pass --config.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let config = load_config(&path);
    (path, config)
}

fn load_config(path: &Path) -> SweeperConfig {
    match SweeperConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn init_tracing_or_exit(config: &SweeperConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

/// Wire the sweeper to the config file, live disk lookups and run history.
async fn build_context(
    config: &SweeperConfig,
    config_path: &Path,
    options: SweepOptions,
) -> SweepContext {
    let history = match state::create_history(&config.state).await {
        Ok(history) => history,
        Err(e) => {
            eprintln!("Failed to open run history: {}", e);
            std::process::exit(1);
        }
    };

    let source = Arc::new(ConfigFileSource::new(config_path));
    let sweeper = Sweeper::new(source, Arc::new(SystemDisks)).with_options(options);

    SweepContext {
        sweeper,
        history,
        lock_path: config
            .state
            .history_path()
            .map(|path| SweepLock::path_for(&path)),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Sweep { dry_run }) => {
            run_sweep_once(args.config.as_deref(), dry_run).await;
        }
        Some(Command::Status { limit, json }) => {
            run_status(args.config.as_deref(), limit, json).await;
        }
        Some(Command::DriveInfo { path, json }) => {
            run_drive_info(&path, json);
        }
        Some(Command::Schema { output }) => {
            #[cfg(feature = "json-schema")]
            run_schema_export(output);
            #[cfg(not(feature = "json-schema"))]
            {
                let _ = output;
                eprintln!("Error: JSON schema export requires the 'json-schema' feature");
                std::process::exit(1);
            }
        }
        Some(Command::Init { output, force }) => {
            run_init(output, force);
        }
        Some(Command::Features) => {
            run_features();
        }
        Some(Command::Serve) | None => {
            run_server(args.config.as_deref()).await;
        }
    }
}

/// Create a default configuration file.
fn run_init(output: Option<String>, force: bool) {
    let Some(output_path) = output.map(PathBuf::from).or_else(default_config_path) else {
        eprintln!("Could not determine default config path. Please specify one with --output.");
        std::process::exit(1);
    };

    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    if let Err(e) = write_config_file(&output_path) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("Add [[retention.targets]] entries, set retention.enabled = true, then run:");
    println!("  sweeper serve --config {}", output_path.display());
}

/// Export JSON schema for the configuration file to file or stdout
#[cfg(feature = "json-schema")]
fn run_schema_export(output: Option<String>) {
    let content = match SweeperConfig::json_schema_string() {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Failed to serialize config schema: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &content) {
                eprintln!("Failed to write to {}: {}", path, e);
                std::process::exit(1);
            }
            eprintln!("Config JSON schema written to {}", path);
        }
        None => {
            println!("{}", content);
        }
    }
}

/// Print enabled compile-time features and build profile.
fn run_features() {
    let version = env!("CARGO_PKG_VERSION");

    let features: &[(&str, &str, bool)] = &[
        ("cli", "Interface", cfg!(feature = "cli")),
        ("prometheus", "Infrastructure", cfg!(feature = "prometheus")),
        (
            "json-schema",
            "Validation & Export",
            cfg!(feature = "json-schema"),
        ),
    ];

    let profile = if cfg!(feature = "full") {
        "full"
    } else if cfg!(feature = "tiny") {
        "tiny"
    } else {
        "custom"
    };

    println!("Sweeper v{version}\n");
    println!("Build profile: {profile}");
    match profile {
        "full" => println!("  (full = tiny + prometheus, json-schema)\n"),
        "tiny" => println!("  (tiny = CLI only, no metrics exporter)\n"),
        _ => println!(),
    }

    println!("Compile-time features:");

    let mut current_group = "";
    for &(name, group, enabled) in features {
        if group != current_group {
            if !current_group.is_empty() {
                println!();
            }
            println!("  {group}:");
            current_group = group;
        }
        let status = if enabled { "enabled" } else { "disabled" };
        println!("    {name:<32} {status}");
    }
}

/// Print the volume holding `path`.
fn run_drive_info(path: &Path, json: bool) {
    let report = match disk::drive_report(&SystemDisks, path) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if json {
        print_json(&report);
        return;
    }

    println!("Root path:       {}", report.root_path.display());
    match (report.available_bytes, report.total_bytes) {
        (Some(available), Some(total)) => {
            println!("Available bytes: {available}");
            println!("Total bytes:     {total}");
        }
        _ => println!("Drive is not ready"),
    }
}

/// Print the most recent runs from the history.
async fn run_status(explicit_config_path: Option<&str>, limit: usize, json: bool) {
    let (_, config) = load_existing_config(explicit_config_path);

    let history = match state::create_history(&config.state).await {
        Ok(history) => history,
        Err(e) => {
            eprintln!("Failed to open run history: {}", e);
            std::process::exit(1);
        }
    };

    let runs = match history.history(limit.max(1)).await {
        Ok(runs) => runs,
        Err(e) => {
            eprintln!("Failed to read run history: {}", e);
            std::process::exit(1);
        }
    };

    if json {
        print_json(&runs);
        return;
    }

    if runs.is_empty() {
        println!("Never run");
        return;
    }

    for (i, run) in runs.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_run(run);
    }
}

fn print_run(run: &RunSummary) {
    let dry_run = if run.dry_run { " (dry run)" } else { "" };
    println!("Run {}{}", run.run_id, dry_run);
    println!("  Finished:            {}", run.timestamp.to_rfc3339());
    println!("  Files deleted:       {}", run.total_deleted);
    println!(
        "  Threshold triggered: {}",
        if run.threshold_triggered { "yes" } else { "no" }
    );
    for target in &run.target_results {
        println!(
            "  {:<40} {:<18} deleted {:<6} errors {}",
            target.path,
            target.outcome.as_str(),
            target.deleted_count,
            target.errors.len()
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize output: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run one on-demand sweep.
async fn run_sweep_once(explicit_config_path: Option<&str>, dry_run: bool) {
    let (config_path, config) = load_existing_config(explicit_config_path);
    init_tracing_or_exit(&config);

    let ctx = build_context(&config, &config_path, SweepOptions { dry_run }).await;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling sweep");
            interrupt.cancel();
        }
    });

    match run_sweep(&ctx, cancel).await {
        Ok(summary) => print_json(&summary),
        Err(SweepError::Cancelled) => std::process::exit(EXIT_CANCELLED),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Run the retention worker until shutdown.
async fn run_server(explicit_config_path: Option<&str>) {
    let (config_path, is_new_config) = match resolve_config_path(explicit_config_path) {
        Ok((path, is_new)) => (path, is_new),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if is_new_config {
        println!(
            "Created default configuration at: {}",
            config_path.display()
        );
        println!();
    }

    let config = load_config(&config_path);
    init_tracing_or_exit(&config);

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics");
    }

    tracing::info!(
        config_file = %config_path.display(),
        "Starting sweeper"
    );

    let ctx = build_context(&config, &config_path, SweepOptions::default()).await;
    let trigger = SweepTrigger::new();
    let shutdown = CancellationToken::new();

    #[cfg(unix)]
    spawn_manual_trigger(trigger.clone(), shutdown.clone());

    let worker = tokio::spawn(start_retention_worker(
        ctx,
        config,
        trigger,
        shutdown.clone(),
    ));

    shutdown_signal().await;

    tracing::info!("Shutdown signal received, stopping retention worker...");
    shutdown.cancel();

    match tokio::time::timeout(Duration::from_secs(30), worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Retention worker panicked"),
        Err(_) => tracing::warn!("Timeout waiting for retention worker to stop"),
    }

    tracing::info!("Shutdown complete");
}

/// Fire an on-demand sweep whenever SIGUSR1 arrives.
#[cfg(unix)]
fn spawn_manual_trigger(trigger: SweepTrigger, shutdown: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGUSR1 handler, on-demand sweeps disabled");
            return;
        }
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = usr1.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!("SIGUSR1 received");
                    trigger.fire();
                }
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
