//! Startup helpers shared by both binaries

pub mod logger;

pub use logger::{init_logging, StartupLogger};
