//! Soketi Manager - admin control plane for a Soketi server
//!
//! Manages the app credentials stored in Soketi's JSON config file and
//! restarts the Soketi process so changes take effect. A container
//! entrypoint supervises Soketi and the admin API side by side.

pub mod config;
pub mod error;
pub mod services;
pub mod startup;
pub mod supervisor;
pub mod web;

pub use config::{ConfigStore, ManagerSettings};
pub use error::{ManagerError, Result};
pub use supervisor::{ProcessSupervisor, RestartOutcome};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the admin API binary, used by the entrypoint to find its sibling
pub const ADMIN_BINARY: &str = "soketi-manager";
