//! Manager settings: where things live, how to reach Soketi, and timings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::environment::EnvironmentOverrides;
use crate::config::store::ConfigLayout;
use crate::error::{ManagerError, Result};

/// Top-level settings for both binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Deployment environment name; `production` silences development logging
    pub environment: String,
    /// Admin HTTP API
    pub server: ServerSettings,
    /// External Soketi server
    pub soketi: SoketiSettings,
    /// Filesystem layout
    pub paths: PathSettings,
    /// Supervision timings
    pub timing: TimingSettings,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerSettings::default(),
            soketi: SoketiSettings::default(),
            paths: PathSettings::default(),
            timing: TimingSettings::default(),
        }
    }
}

/// Admin HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Directory holding the dashboard's static assets
    pub public_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_dir: PathBuf::from("public"),
        }
    }
}

/// How to reach and invoke Soketi
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoketiSettings {
    /// Host the HTTP events API listens on
    pub host: String,
    /// Port the HTTP events API listens on
    pub port: u16,
    /// Command name used when Soketi is installed globally
    pub command: String,
    /// Runtime used to run the container entry script
    pub node_binary: String,
}

impl Default for SoketiSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6001,
            command: "soketi".to_string(),
            node_binary: "node".to_string(),
        }
    }
}

/// Filesystem layout for container and development deployments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Explicit config file path; wins over every probed location
    pub config_file: Option<PathBuf>,
    /// Project root for development deployments
    pub project_root: PathBuf,
    /// Root of the container image
    pub container_root: PathBuf,
    /// Soketi entry script shipped in the container image
    pub container_script: PathBuf,
    /// Config file baked into the container image
    pub container_config: PathBuf,
    /// Config file on the container's persistent volume
    pub container_volume_config: PathBuf,
    /// File name of the bundled default config (in container root and project root)
    pub default_config_name: String,
    /// Locally vendored Soketi executable, relative to the project root
    pub local_executable: PathBuf,
    /// Explicit PID file path; defaults to `<project_root>/.soketi.pid`
    pub pid_file: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            config_file: None,
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            container_root: PathBuf::from("/app"),
            container_script: PathBuf::from("/app/bin/server.js"),
            container_config: PathBuf::from("/app/soketi.json"),
            container_volume_config: PathBuf::from("/app/data/soketi.json"),
            default_config_name: "soketi.default.json".to_string(),
            local_executable: PathBuf::from("node_modules/.bin/soketi"),
            pid_file: None,
        }
    }
}

impl PathSettings {
    pub fn pid_file(&self) -> PathBuf {
        self.pid_file
            .clone()
            .unwrap_or_else(|| self.project_root.join(".soketi.pid"))
    }

    pub fn container_node_modules(&self) -> PathBuf {
        self.container_root.join("node_modules")
    }

    pub fn local_executable_path(&self) -> PathBuf {
        self.project_root.join(&self.local_executable)
    }

    /// Candidate config locations derived from these settings
    pub fn config_layout(&self) -> ConfigLayout {
        ConfigLayout {
            override_path: self.config_file.clone(),
            container_config: self.container_config.clone(),
            container_volume_config: self.container_volume_config.clone(),
            container_default: self.container_root.join(&self.default_config_name),
            development_config: self.project_root.join("soketi.json"),
            development_default: self.project_root.join(&self.default_config_name),
        }
    }
}

/// Supervision timings, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Wait after SIGTERM before escalating
    pub grace_period_ms: u64,
    /// Fallback startup check after spawning
    pub spawn_fallback_ms: u64,
    /// Upper bound on waiting for a spawn result
    pub spawn_deadline_ms: u64,
    /// Delay before an entrypoint child is restarted after a crash
    pub child_restart_delay_ms: u64,
    /// Entrypoint wait between signalling children and exiting
    pub shutdown_grace_ms: u64,
    /// Entrypoint delay between starting Soketi and the admin API
    pub admin_start_delay_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: 1000,
            spawn_fallback_ms: 200,
            spawn_deadline_ms: 10_000,
            child_restart_delay_ms: 2000,
            shutdown_grace_ms: 2000,
            admin_start_delay_ms: 3000,
        }
    }
}

impl TimingSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn spawn_fallback(&self) -> Duration {
        Duration::from_millis(self.spawn_fallback_ms)
    }

    pub fn spawn_deadline(&self) -> Duration {
        Duration::from_millis(self.spawn_deadline_ms)
    }

    pub fn child_restart_delay(&self) -> Duration {
        Duration::from_millis(self.child_restart_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn admin_start_delay(&self) -> Duration {
        Duration::from_millis(self.admin_start_delay_ms)
    }
}

impl ManagerSettings {
    /// Load .env files in order of precedence
    pub fn load_env_files() {
        let env = std::env::var(crate::config::EnvVars::ENVIRONMENT)
            .unwrap_or_else(|_| "development".to_string());

        // Each file overrides the previous: .env → .env.{environment} → .env.local
        let env_specific_file = format!(".env.{}", env);
        let env_files = [".env", env_specific_file.as_str(), ".env.local"];

        for env_file in env_files {
            match dotenvy::from_filename(env_file) {
                Ok(_) => {
                    tracing::info!("Loaded environment variables from {}", env_file);
                }
                Err(e) if e.not_found() => {
                    tracing::debug!("No {} file found, skipping", env_file);
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}", env_file, e);
                }
            }
        }
    }

    /// Load settings from an optional YAML file and apply environment overrides.
    ///
    /// Precedence: defaults < settings file < environment. CLI overrides are
    /// applied by the caller afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_overrides(path).map(|(settings, _)| settings)
    }

    /// Same as [`ManagerSettings::load`], also returning the environment
    /// overrides that were applied (for the startup summary)
    pub fn load_with_overrides(path: Option<&Path>) -> Result<(Self, EnvironmentOverrides)> {
        Self::load_env_files();

        let mut settings = match path {
            Some(path) if path.exists() => Self::from_yaml_file(path)?,
            Some(path) => {
                tracing::warn!("Settings file {:?} not found, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        let overrides = EnvironmentOverrides::load()?;
        overrides.apply_to_settings(&mut settings);
        settings.validate()?;

        Ok((settings, overrides))
    }

    /// Parse settings from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ManagerError::settings(format!("Failed to read settings file {:?}: {}", path, e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.soketi.command.trim().is_empty() {
            return Err(ManagerError::settings("soketi.command must not be empty"));
        }
        if self.timing.spawn_deadline_ms < self.timing.spawn_fallback_ms {
            return Err(ManagerError::settings(format!(
                "timing.spawn_deadline_ms ({}) must be >= timing.spawn_fallback_ms ({})",
                self.timing.spawn_deadline_ms, self.timing.spawn_fallback_ms
            )));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_container_layout() {
        let settings = ManagerSettings::default();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.soketi.port, 6001);
        assert_eq!(settings.paths.container_script, PathBuf::from("/app/bin/server.js"));
        assert_eq!(settings.timing.spawn_fallback(), Duration::from_millis(200));
        assert!(!settings.is_production());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let settings = ManagerSettings::from_yaml_str(
            r#"
environment: production
paths:
  project_root: /srv/manager
timing:
  grace_period_ms: 250
"#,
        )
        .unwrap();

        assert!(settings.is_production());
        assert_eq!(settings.timing.grace_period(), Duration::from_millis(250));
        assert_eq!(settings.timing.spawn_fallback_ms, 200);
        assert_eq!(settings.paths.pid_file(), PathBuf::from("/srv/manager/.soketi.pid"));
        assert_eq!(
            settings.paths.config_layout().development_default,
            PathBuf::from("/srv/manager/soketi.default.json")
        );
    }

    #[test]
    fn inconsistent_timings_are_rejected() {
        let result = ManagerSettings::from_yaml_str(
            r#"
timing:
  spawn_fallback_ms: 500
  spawn_deadline_ms: 100
"#,
        );
        assert!(matches!(result, Err(ManagerError::Settings { .. })));
    }
}
