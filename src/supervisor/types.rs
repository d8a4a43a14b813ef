//! Supervisor Types
//!
//! Values shared by the restart path and the container entrypoint.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What to do with a child's standard streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioMode {
    /// Discard all output (detached restarts)
    Discard,
    /// Share the parent's streams (entrypoint, so logs reach the operator)
    Inherit,
}

/// How to invoke the Soketi server in the current deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Executable path or bare name looked up on PATH
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Variables added on top of the inherited environment
    pub env: HashMap<String, String>,
    /// Run in its own process group so it outlives the caller's group
    pub detached: bool,
    pub stdio: StdioMode,
}

impl CommandDescriptor {
    /// Same invocation, attached to the caller with inherited stdio
    pub fn attached(mut self) -> Self {
        self.detached = false;
        self.stdio = StdioMode::Inherit;
        self
    }

    /// Human readable command line for logs
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Structured result of a restart.
///
/// Serializes as `{success, message, pid}` on success and
/// `{success: false, message, error}` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl RestartOutcome {
    pub fn started(pid: u32) -> Self {
        Self {
            success: true,
            message: "Soketi restarted successfully".to_string(),
            pid: Some(pid),
            error: None,
        }
    }

    pub fn failed<M: Into<String>, E: Into<String>>(message: M, error: E) -> Self {
        Self {
            success: false,
            message: message.into(),
            pid: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_shapes_on_the_wire() {
        let ok = serde_json::to_value(RestartOutcome::started(4242)).unwrap();
        assert_eq!(
            ok,
            json!({"success": true, "message": "Soketi restarted successfully", "pid": 4242})
        );

        let failed = serde_json::to_value(RestartOutcome::failed(
            "Failed to start Soketi: boom",
            "boom",
        ))
        .unwrap();
        assert_eq!(
            failed,
            json!({"success": false, "message": "Failed to start Soketi: boom", "error": "boom"})
        );
    }

    #[test]
    fn attached_inherits_stdio() {
        let descriptor = CommandDescriptor {
            program: PathBuf::from("soketi"),
            args: vec!["start".into()],
            working_dir: PathBuf::from("/srv"),
            env: HashMap::new(),
            detached: true,
            stdio: StdioMode::Discard,
        }
        .attached();

        assert!(!descriptor.detached);
        assert_eq!(descriptor.stdio, StdioMode::Inherit);
        assert_eq!(descriptor.display(), "soketi start");
    }
}
