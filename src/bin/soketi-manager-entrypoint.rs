//! Soketi Manager container entrypoint
//!
//! Starts Soketi and the admin API as supervised children, restarts either
//! one after a crash and stops both on SIGTERM or SIGINT.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use soketi_manager::config::{ConfigStore, ManagerSettings, RealProbe};
use soketi_manager::startup::{init_logging, StartupLogger};
use soketi_manager::supervisor::{CommandContext, CommandResolver, EntrypointContext};
use soketi_manager::{ADMIN_BINARY, VERSION};

#[derive(Parser)]
#[command(name = "soketi-manager-entrypoint")]
#[command(about = "Supervises Soketi and the Soketi Manager admin API")]
#[command(version)]
struct Cli {
    /// Settings file (YAML), also passed to the admin API
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Admin API binary; defaults to the one next to this executable
    #[arg(long)]
    admin_binary: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let (settings, overrides) = ManagerSettings::load_with_overrides(cli.settings.as_deref())?;

    let store = ConfigStore::new(&settings.paths.config_layout(), &RealProbe);
    // Seeds an empty volume before Soketi reads it.
    if let Err(e) = store.read().await {
        warn!("⚠️ Soketi config not readable yet: {}", e);
    }

    let resolved = CommandResolver::default().resolve(&CommandContext::new(&settings, store.path()), &RealProbe);
    StartupLogger::display_startup_info(
        "Soketi Manager entrypoint",
        VERSION,
        &settings,
        &overrides,
        &store,
        resolved.as_ref(),
    );

    let admin_binary = match cli.admin_binary {
        Some(path) => path,
        None => std::env::current_exe()
            .context("cannot locate the entrypoint executable")?
            .with_file_name(ADMIN_BINARY),
    };
    let mut admin_args = vec!["--log-level".to_string(), cli.log_level.clone()];
    if let Some(ref path) = cli.settings {
        admin_args.push("--settings".to_string());
        admin_args.push(path.display().to_string());
    }

    let context = EntrypointContext::from_settings(
        &settings,
        store.path(),
        &RealProbe,
        admin_binary,
        admin_args,
    )
    .map_err(|e| {
        error!("❌ {}", e);
        e
    })?;

    info!("🎯 Supervising {} children", context.children().len());
    context.run().await?;
    Ok(())
}
