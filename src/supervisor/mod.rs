//! Soketi process supervision
//!
//! - [`ProcessSupervisor`]: restart path used by the admin API
//! - [`EntrypointContext`]: container entrypoint running Soketi and the admin API

pub mod detect;
pub mod entrypoint;
pub mod launcher;
pub mod pid_file;
pub mod process;
pub mod types;

pub use detect::{CommandContext, CommandResolver, EnvironmentDetector, ResolvedCommand};
pub use entrypoint::{should_restart, EntrypointContext, ManagedChild};
pub use launcher::{
    build_command, is_running, signal_process, terminate, LaunchEvent, LaunchHandle, LaunchState, ProcessLauncher,
    TokioLauncher,
};
pub use pid_file::PidFile;
pub use process::{ProcessSupervisor, ServerRestarter};
pub use types::*;
