//! Error handling module for Soketi Manager
//!
//! This module provides the error types shared by the config store, the
//! process supervisor and the HTTP layer.

mod error;

// Re-export the main error types and utilities
pub use error::{ManagerError, Result, SpawnFailureKind};
