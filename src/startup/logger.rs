//! Startup logging: subscriber setup and the startup summary

use tracing::{info, warn};

use crate::config::{ConfigStore, EnvironmentOverrides, ManagerSettings, PathSource};
use crate::supervisor::ResolvedCommand;

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .try_init()?;

    Ok(())
}

/// Startup information printed by both binaries
pub struct StartupLogger;

impl StartupLogger {
    pub fn display_startup_info(
        component: &str,
        version: &str,
        settings: &ManagerSettings,
        overrides: &EnvironmentOverrides,
        store: &ConfigStore,
        command: Option<&ResolvedCommand>,
    ) {
        info!("🚀 {} v{} starting...", component, version);
        info!("");

        Self::display_configuration_resolution(settings, store);

        if overrides.has_overrides() {
            info!("🔧 Environment Overrides:");
            for entry in overrides.get_override_summary() {
                info!("   ✅ {}", entry);
            }
            info!("");
        }

        info!("🎯 Soketi:");
        match command {
            Some(resolved) => {
                info!("   Environment: {}", resolved.environment);
                info!("   Command: {}", resolved.descriptor.display());
            }
            None => warn!("   ⚠️  No deployment environment matched"),
        }
        info!("   Events API: http://{}:{}", settings.soketi.host, settings.soketi.port);
        info!("");
    }

    fn display_configuration_resolution(settings: &ManagerSettings, store: &ConfigStore) {
        info!("📁 Configuration Resolution:");
        if !settings.is_production() {
            info!("📁 Using config file: {:?}", store.path());
        }

        let source = match store.source() {
            PathSource::Override => "explicit override",
            PathSource::Container => "container image",
            PathSource::ContainerVolume => "container volume",
            PathSource::Development => "project directory",
        };
        info!("   Config source: {}", source);
        info!("   PID file: {:?}", settings.paths.pid_file());
        info!("   Environment: {}", settings.environment);
        info!("");
    }

    /// Listening addresses of the admin API
    pub fn display_server_information(settings: &ManagerSettings) {
        info!("🌐 Server Information:");
        info!("   🚀 App Manager API: http://{}:{}", settings.server.host, settings.server.port);
        info!("   📊 Dashboard: http://{}:{}/", settings.server.host, settings.server.port);
        info!("   Static files: {:?}", settings.server.public_dir);
        info!("");
    }
}
