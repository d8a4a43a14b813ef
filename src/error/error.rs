//! Error types and handling for Soketi Manager

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Soketi Manager operations
pub type Result<T> = std::result::Result<T, ManagerError>;

/// Why a child process could not be started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnFailureKind {
    /// The executable could not be found (not installed / not on PATH)
    NotFound,
    /// Any other spawn failure (permissions, resource limits, ...)
    Other,
}

impl SpawnFailureKind {
    /// Classify an IO error returned by a spawn attempt
    pub fn from_io(error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => SpawnFailureKind::NotFound,
            _ => SpawnFailureKind::Other,
        }
    }
}

/// Main error type for Soketi Manager
#[derive(Error, Debug)]
pub enum ManagerError {
    /// Configuration file is absent and could not be seeded from a bundled default
    #[error("Config file not found at: {}. Please ensure soketi.json exists.", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Configuration file exists but is not valid JSON
    #[error("Config file at {} is not valid JSON: {source}", path.display())]
    ConfigCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Child process failed to start
    #[error("Process spawn error: {message}")]
    ProcessSpawn {
        kind: SpawnFailureKind,
        message: String,
    },

    /// Request validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Requested record does not exist
    #[error("{message}")]
    NotFound { message: String },

    /// Record collides with an existing one
    #[error("{message}")]
    Conflict { message: String },

    /// Manager settings errors
    #[error("Settings error: {message}")]
    Settings { message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ManagerError {
    /// Create a config-not-found error
    pub fn config_not_found<P: Into<PathBuf>>(path: P) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create a config-corrupt error
    pub fn config_corrupt<P: Into<PathBuf>>(path: P, source: serde_json::Error) -> Self {
        Self::ConfigCorrupt {
            path: path.into(),
            source,
        }
    }

    /// Create a process spawn error from the underlying IO failure
    pub fn spawn(error: &std::io::Error) -> Self {
        Self::ProcessSpawn {
            kind: SpawnFailureKind::from_io(error),
            message: error.to_string(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a settings error
    pub fn settings<S: Into<String>>(message: S) -> Self {
        Self::Settings {
            message: message.into(),
        }
    }

    /// Message for API responses: client errors without their prefix
    pub fn public_message(&self) -> String {
        match self {
            ManagerError::Validation { message }
            | ManagerError::NotFound { message }
            | ManagerError::Conflict { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ManagerError::ConfigNotFound { .. } => "config_not_found",
            ManagerError::ConfigCorrupt { .. } => "config_corrupt",
            ManagerError::ProcessSpawn { .. } => "process_spawn",
            ManagerError::Validation { .. } => "validation",
            ManagerError::NotFound { .. } => "not_found",
            ManagerError::Conflict { .. } => "conflict",
            ManagerError::Settings { .. } => "settings",
            ManagerError::Io(_) => "io",
            ManagerError::Yaml(_) => "yaml",
            ManagerError::Http(_) => "http",
            ManagerError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_kind_distinguishes_missing_executable() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");

        assert_eq!(SpawnFailureKind::from_io(&missing), SpawnFailureKind::NotFound);
        assert_eq!(SpawnFailureKind::from_io(&denied), SpawnFailureKind::Other);
    }

    #[test]
    fn config_not_found_message_carries_path() {
        let err = ManagerError::config_not_found("/app/soketi.json");
        assert!(err.to_string().contains("/app/soketi.json"));
        assert_eq!(err.category(), "config_not_found");
    }

    #[test]
    fn public_message_drops_prefix_for_client_errors() {
        let err = ManagerError::validation("Missing required fields: id, key, secret");
        assert_eq!(err.public_message(), "Missing required fields: id, key, secret");

        let err = ManagerError::settings("bad");
        assert_eq!(err.public_message(), "Settings error: bad");
    }
}
