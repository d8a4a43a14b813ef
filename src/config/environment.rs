//! Environment variable integration for Soketi Manager settings

use std::env;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::ManagerSettings;
use crate::error::{ManagerError, Result};

/// Environment variable names used by Soketi Manager
pub struct EnvVars;

impl EnvVars {
    pub const CONFIG_FILE: &'static str = "SOKETI_CONFIG_FILE";
    pub const ENVIRONMENT: &'static str = "SOKETI_MANAGER_ENV";
    pub const PROJECT_ROOT: &'static str = "SOKETI_MANAGER_ROOT";
    pub const PID_FILE: &'static str = "SOKETI_MANAGER_PID_FILE";
    pub const SOKETI_HOST: &'static str = "SOKETI_HOST";
    pub const SOKETI_PORT: &'static str = "SOKETI_PORT";
    pub const PORT: &'static str = "PORT";
}

/// Environment settings overrides
#[derive(Debug, Clone, Default)]
pub struct EnvironmentOverrides {
    /// Config file path override
    pub config_file: Option<PathBuf>,
    /// Deployment environment name (`production`, `development`, ...)
    pub environment: Option<String>,
    /// Project root override
    pub project_root: Option<PathBuf>,
    /// PID file override
    pub pid_file: Option<PathBuf>,
    /// Soketi host used for test events
    pub soketi_host: Option<String>,
    /// Soketi port used for test events
    pub soketi_port: Option<u16>,
    /// Admin API port
    pub port: Option<u16>,
}

impl EnvironmentOverrides {
    /// Load environment variable overrides
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load overrides through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut overrides = EnvironmentOverrides::default();

        if let Some(path) = lookup(EnvVars::CONFIG_FILE).filter(|s| !s.is_empty()) {
            debug!("Environment override: {}={}", EnvVars::CONFIG_FILE, path);
            overrides.config_file = Some(PathBuf::from(path));
        }

        if let Some(environment) = lookup(EnvVars::ENVIRONMENT).filter(|s| !s.is_empty()) {
            debug!("Environment override: {}={}", EnvVars::ENVIRONMENT, environment);
            overrides.environment = Some(environment);
        }

        if let Some(root) = lookup(EnvVars::PROJECT_ROOT).filter(|s| !s.is_empty()) {
            debug!("Environment override: {}={}", EnvVars::PROJECT_ROOT, root);
            overrides.project_root = Some(PathBuf::from(root));
        }

        if let Some(pid_file) = lookup(EnvVars::PID_FILE).filter(|s| !s.is_empty()) {
            debug!("Environment override: {}={}", EnvVars::PID_FILE, pid_file);
            overrides.pid_file = Some(PathBuf::from(pid_file));
        }

        if let Some(host) = lookup(EnvVars::SOKETI_HOST).filter(|s| !s.is_empty()) {
            debug!("Environment override: {}={}", EnvVars::SOKETI_HOST, host);
            overrides.soketi_host = Some(host);
        }

        overrides.soketi_port = parse_port(&lookup, EnvVars::SOKETI_PORT)?;
        overrides.port = parse_port(&lookup, EnvVars::PORT)?;

        Ok(overrides)
    }

    /// Apply environment overrides to loaded settings
    pub fn apply_to_settings(&self, settings: &mut ManagerSettings) {
        if let Some(ref path) = self.config_file {
            settings.paths.config_file = Some(path.clone());
        }

        if let Some(ref environment) = self.environment {
            settings.environment = environment.clone();
        }

        if let Some(ref root) = self.project_root {
            if settings.paths.project_root != *root {
                info!(
                    "Environment override: project_root changed from {:?} to {:?}",
                    settings.paths.project_root, root
                );
            }
            settings.paths.project_root = root.clone();
        }

        if let Some(ref pid_file) = self.pid_file {
            settings.paths.pid_file = Some(pid_file.clone());
        }

        if let Some(ref host) = self.soketi_host {
            settings.soketi.host = host.clone();
        }

        if let Some(port) = self.soketi_port {
            settings.soketi.port = port;
        }

        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }

    /// Check if any environment overrides are active
    pub fn has_overrides(&self) -> bool {
        !self.get_override_summary().is_empty()
    }

    /// Get summary of active overrides for logging
    pub fn get_override_summary(&self) -> Vec<String> {
        let mut summary = Vec::new();

        if let Some(ref path) = self.config_file {
            summary.push(format!("{}={:?}", EnvVars::CONFIG_FILE, path));
        }
        if let Some(ref environment) = self.environment {
            summary.push(format!("{}={}", EnvVars::ENVIRONMENT, environment));
        }
        if let Some(ref root) = self.project_root {
            summary.push(format!("{}={:?}", EnvVars::PROJECT_ROOT, root));
        }
        if let Some(ref pid_file) = self.pid_file {
            summary.push(format!("{}={:?}", EnvVars::PID_FILE, pid_file));
        }
        if let Some(ref host) = self.soketi_host {
            summary.push(format!("{}={}", EnvVars::SOKETI_HOST, host));
        }
        if let Some(port) = self.soketi_port {
            summary.push(format!("{}={}", EnvVars::SOKETI_PORT, port));
        }
        if let Some(port) = self.port {
            summary.push(format!("{}={}", EnvVars::PORT, port));
        }

        summary
    }
}

fn parse_port<F>(lookup: &F, name: &str) -> Result<Option<u16>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).filter(|s| !s.is_empty()) {
        Some(value) => match value.trim().parse::<u16>() {
            Ok(port) => {
                debug!("Environment override: {}={}", name, port);
                Ok(Some(port))
            }
            Err(e) => {
                warn!("Invalid {}: {} ({})", name, value, e);
                Err(ManagerError::settings(format!(
                    "Invalid {}: {} (expected a port number)",
                    name, value
                )))
            }
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn overrides_apply_to_settings() {
        let overrides = EnvironmentOverrides::from_lookup(lookup_from(&[
            (EnvVars::CONFIG_FILE, "/etc/soketi/soketi.json"),
            (EnvVars::ENVIRONMENT, "production"),
            (EnvVars::SOKETI_PORT, "6002"),
            (EnvVars::PORT, "8080"),
        ]))
        .unwrap();

        let mut settings = ManagerSettings::default();
        overrides.apply_to_settings(&mut settings);

        assert_eq!(
            settings.paths.config_file,
            Some(PathBuf::from("/etc/soketi/soketi.json"))
        );
        assert!(settings.is_production());
        assert_eq!(settings.soketi.port, 6002);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(overrides.get_override_summary().len(), 4);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let result = EnvironmentOverrides::from_lookup(lookup_from(&[(EnvVars::PORT, "http")]));
        assert!(matches!(result, Err(ManagerError::Settings { .. })));
    }

    #[test]
    fn empty_values_are_ignored() {
        let overrides =
            EnvironmentOverrides::from_lookup(lookup_from(&[(EnvVars::CONFIG_FILE, "")])).unwrap();
        assert!(!overrides.has_overrides());
    }
}
