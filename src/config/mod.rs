//! Configuration module for Soketi Manager
//!
//! This module covers two different things:
//! - the manager's own settings (YAML file + environment overrides)
//! - the shared Soketi JSON config file the admin API edits

mod config;
pub mod environment;
pub mod probe;
pub mod store;

pub use config::{ManagerSettings, PathSettings, ServerSettings, SoketiSettings, TimingSettings};
pub use environment::{EnvVars, EnvironmentOverrides};
pub use probe::{FixedProbe, PathProbe, RealProbe};
pub use store::{ConfigLayout, ConfigStore, PathSource};
