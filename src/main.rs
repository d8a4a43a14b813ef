use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{web::Data, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use soketi_manager::config::{ConfigStore, ManagerSettings, RealProbe};
use soketi_manager::services::{AppRegistry, EventPublisher};
use soketi_manager::startup::{init_logging, StartupLogger};
use soketi_manager::supervisor::ProcessSupervisor;
use soketi_manager::web::{self, AppsApiHandler, EventsApiHandler, RestartApiHandler};
use soketi_manager::VERSION;

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version)]
struct Cli {
    /// Settings file (YAML); defaults apply when omitted
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Admin API host
    #[arg(long)]
    host: Option<String>,

    /// Admin API port
    #[arg(long)]
    port: Option<u16>,

    /// Directory with the dashboard's static files
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Restart Soketi once before serving requests
    #[arg(long)]
    restart_on_start: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let (mut settings, overrides) = ManagerSettings::load_with_overrides(cli.settings.as_deref())
        .map_err(|e| {
            error!("Failed to load settings: {}", e);
            e
        })?;

    // CLI wins over file and environment
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(public_dir) = cli.public_dir {
        settings.server.public_dir = public_dir;
    }

    let store = Arc::new(ConfigStore::new(&settings.paths.config_layout(), &RealProbe));
    let supervisor = Arc::new(ProcessSupervisor::new(&settings, store.path()));

    StartupLogger::display_startup_info(
        "Soketi Manager",
        VERSION,
        &settings,
        &overrides,
        &store,
        supervisor.resolve_command().as_ref(),
    );

    if cli.restart_on_start {
        let outcome = supervisor.restart().await;
        if !outcome.success {
            error!("Initial Soketi start failed: {}", outcome.message);
        }
    }

    let registry = Arc::new(AppRegistry::new(store.clone(), supervisor.clone()));
    let apps = Data::new(AppsApiHandler::new(registry));
    let restart = Data::new(RestartApiHandler::new(supervisor.clone()));
    let events = Data::new(EventsApiHandler::new(EventPublisher::new(&settings.soketi)));
    let public_dir = settings.server.public_dir.clone();
    if !public_dir.is_dir() {
        warn!("Static directory {:?} not found, dashboard disabled", public_dir);
    }

    StartupLogger::display_server_information(&settings);

    let bind = (settings.server.host.clone(), settings.server.port);
    info!("🌐 Listening on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(apps.clone())
            .app_data(restart.clone())
            .app_data(events.clone())
            .configure(web::configure_api)
            .configure(|cfg| web::configure_static(cfg, &public_dir))
    })
    .bind(bind)?
    .run()
    .await?;

    info!("👋 Soketi Manager stopped");
    Ok(())
}
