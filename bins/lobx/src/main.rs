//! lobx binary
//!
//! Entry point for the interactive order book. Provides commands for
//! initializing and validating a configuration file and for running the
//! command loop against one matching engine.

mod repl;

use anyhow::{Context, Result};
use cli::{Cli, Commands};
use common::SystemClock;
use config::{generate_default_config, load_config, save_config, validate_config, LobxConfig};
use observability::{init_logging, LogFormat};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::repl::Session;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Run { config, load } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => LobxConfig::default(),
            };
            setup_logging(cli.log_format.as_deref(), &config)?;
            info!("Executing 'run' command");
            run_command(config, load)
        }
        Commands::Validate { config } => {
            setup_logging(cli.log_format.as_deref(), &LobxConfig::default())?;
            info!("Executing 'validate' command");
            validate_command(config)
        }
        Commands::Init { output } => {
            setup_logging(cli.log_format.as_deref(), &LobxConfig::default())?;
            info!("Executing 'init' command");
            init_command(output)
        }
    }
}

fn setup_logging(cli_format: Option<&str>, config: &LobxConfig) -> Result<()> {
    let name = cli_format.unwrap_or(&config.logging.format);
    let format: LogFormat = name.parse().map_err(anyhow::Error::msg)?;
    init_logging("lobx", format, &config.logging.level)
}

fn run_command(config: LobxConfig, load_override: Option<PathBuf>) -> Result<()> {
    let report = validate_config(&config);

    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start engine due to configuration errors");
    }

    let mut session = Session::new(config, Arc::new(SystemClock))?;

    let startup_snapshot = load_override.or_else(|| {
        let snapshot = &session.config().snapshot;
        snapshot.load_on_start.then(|| PathBuf::from(&snapshot.path))
    });
    if let Some(path) = startup_snapshot {
        match session.load_snapshot(&path) {
            Ok(count) => println!("Loaded {} orders from {}", count, path.display()),
            Err(e) => {
                // A first run has no snapshot yet
                warn!(path = %path.display(), error = %e, "Starting with an empty book");
            }
        }
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    repl::print_banner(&mut stdout.lock())?;
    session.run(stdin.lock(), stdout.lock())?;

    session.shutdown();
    info!("lobx stopped");
    Ok(())
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            return Err(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Instrument: {}", config.engine.instrument);
    match config.engine.default_ttl_ms {
        Some(ttl) => println!("Default TTL: {} ms", ttl),
        None => println!("Default TTL: none"),
    }
    println!("Snapshot: {}", config.snapshot.path);
    println!(
        "Trade ledger: {}",
        if config.trade_ledger.enabled {
            config.trade_ledger.directory.as_str()
        } else {
            "disabled"
        }
    );

    Ok(())
}

fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    if output_path.exists() {
        anyhow::bail!(
            "Refusing to overwrite existing file: {}",
            output_path.display()
        );
    }

    let config = generate_default_config();
    debug!(?config, "Generated default configuration");

    save_config(&config, output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!("[ok] Configuration written to {}", output_path.display());
    println!("Edit it, then run: lobx run --config {}", output_path.display());
    Ok(())
}
