//! Process launching and signalling.
//!
//! [`ProcessLauncher`] is the seam between the restart logic and the OS.
//! A launch reports through a single-use channel (spawned or failed) and a
//! shared [`LaunchState`] that the fallback check can inspect without
//! waiting for the channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::supervisor::types::{CommandDescriptor, StdioMode};

/// Explicit lifecycle signal for one launch
#[derive(Debug)]
pub enum LaunchEvent {
    Spawned { pid: u32 },
    Failed(std::io::Error),
}

/// Observable state of a launched child
#[derive(Debug, Default)]
pub struct LaunchState {
    pid: OnceLock<u32>,
    killed: AtomicBool,
}

impl LaunchState {
    pub fn record_pid(&self, pid: u32) {
        let _ = self.pid.set(pid);
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid.get().copied()
    }

    pub fn mark_killed(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// PID of a child that has one and was not killed
    pub fn live_pid(&self) -> Option<u32> {
        if self.is_killed() {
            None
        } else {
            self.pid()
        }
    }
}

/// Handle returned by [`ProcessLauncher::launch`]
#[derive(Debug)]
pub struct LaunchHandle {
    pub events: oneshot::Receiver<LaunchEvent>,
    pub state: Arc<LaunchState>,
}

impl LaunchHandle {
    /// New handle plus the sending half the launcher reports through
    pub fn channel() -> (oneshot::Sender<LaunchEvent>, Arc<LaunchState>, Self) {
        let (tx, rx) = oneshot::channel();
        let state = Arc::new(LaunchState::default());
        let handle = Self {
            events: rx,
            state: Arc::clone(&state),
        };
        (tx, state, handle)
    }
}

/// Starts child processes described by a [`CommandDescriptor`]
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, command: &CommandDescriptor) -> LaunchHandle;
}

/// Launcher backed by `tokio::process`.
///
/// The child handle is dropped once its PID is known; the runtime reaps it
/// when it exits and nothing here waits on it.
#[derive(Debug, Default, Clone)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    fn launch(&self, descriptor: &CommandDescriptor) -> LaunchHandle {
        let (tx, state, handle) = LaunchHandle::channel();
        let mut command = build_command(descriptor);
        let command_line = descriptor.display();

        tokio::spawn(async move {
            let event = match command.spawn() {
                Ok(child) => match child.id() {
                    Some(pid) => {
                        state.record_pid(pid);
                        debug!("Spawned `{}` as pid {}", command_line, pid);
                        LaunchEvent::Spawned { pid }
                    }
                    None => {
                        state.mark_killed();
                        LaunchEvent::Failed(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            "process exited before reporting a pid",
                        ))
                    }
                },
                Err(e) => LaunchEvent::Failed(e),
            };

            if tx.send(event).is_err() {
                debug!("Launch result for `{}` had no receiver", command_line);
            }
        });

        handle
    }
}

/// Translate a descriptor into a ready-to-spawn command
pub fn build_command(descriptor: &CommandDescriptor) -> Command {
    let mut command = Command::new(&descriptor.program);
    command
        .args(&descriptor.args)
        .current_dir(&descriptor.working_dir)
        .envs(&descriptor.env);

    match descriptor.stdio {
        StdioMode::Discard => {
            command
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null());
        }
        StdioMode::Inherit => {
            command
                .stdin(std::process::Stdio::inherit())
                .stdout(std::process::Stdio::inherit())
                .stderr(std::process::Stdio::inherit());
        }
    }

    if descriptor.detached {
        command.process_group(0);
    }

    command
}

/// Send `signal` to `pid`; `None` only checks that the process exists
pub fn signal_process(pid: u32, signal: Option<Signal>) -> nix::Result<()> {
    let raw = i32::try_from(pid).map_err(|_| nix::errno::Errno::ESRCH)?;
    if raw <= 0 {
        return Err(nix::errno::Errno::ESRCH);
    }
    kill(Pid::from_raw(raw), signal)
}

/// Whether `pid` names a process that has not exited.
///
/// An exited child that nobody has reaped yet still accepts signal 0, so
/// zombies are filtered out through `/proc` where it exists.
pub fn is_running(pid: u32) -> bool {
    if signal_process(pid, None).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .map_or(true, |state| state != "Z" && state != "X"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(_) => true,
    }
}

/// Best-effort termination: SIGTERM, wait `grace`, SIGKILL if still alive.
///
/// If SIGTERM cannot be delivered SIGKILL is tried straight away. Failures
/// are logged at debug level and never returned.
pub async fn terminate(pid: u32, grace: Duration) {
    match signal_process(pid, Some(Signal::SIGTERM)) {
        Ok(()) => {
            info!("🛑 Sent SIGTERM to Soketi process {}", pid);
            tokio::time::sleep(grace).await;

            if is_running(pid) {
                match signal_process(pid, Some(Signal::SIGKILL)) {
                    Ok(()) => info!("Force killed Soketi process {}", pid),
                    Err(e) => debug!("SIGKILL to process {} failed: {}", pid, e),
                }
            }
        }
        Err(e) => {
            debug!("SIGTERM to process {} failed: {}", pid, e);
            if let Err(e) = signal_process(pid, Some(Signal::SIGKILL)) {
                debug!("SIGKILL to process {} failed: {}", pid, e);
            }
        }
    }
}
