//! Container entrypoint supervision.
//!
//! Runs Soketi and the admin API side by side, restarting either one after
//! a crash, and stops both when the container is asked to shut down. Each
//! child has its own task; the tasks share nothing but a shutdown channel.

use std::collections::HashMap;
use std::future::Future;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{EnvVars, ManagerSettings, PathProbe, TimingSettings};
use crate::error::{ManagerError, Result};
use crate::supervisor::detect::{CommandContext, CommandResolver};
use crate::supervisor::launcher::{build_command, signal_process};
use crate::supervisor::pid_file::PidFile;
use crate::supervisor::types::{CommandDescriptor, StdioMode};

/// Whether a child that exited should be started again.
///
/// Only a non-zero exit code counts as a crash. Exits caused by SIGTERM or
/// SIGINT, signal deaths without a code, and exits during shutdown are
/// deliberate stops.
pub fn should_restart(code: Option<i32>, signal: Option<i32>, shutting_down: bool) -> bool {
    if shutting_down {
        return false;
    }
    if matches!(signal, Some(s) if s == Signal::SIGTERM as i32 || s == Signal::SIGINT as i32) {
        return false;
    }
    matches!(code, Some(code) if code != 0)
}

/// One supervised child
#[derive(Debug, Clone)]
pub struct ManagedChild {
    pub name: &'static str,
    pub command: CommandDescriptor,
    /// Wait before the first start
    pub start_delay: Duration,
    /// Receives the child's PID on every start
    pub pid_file: Option<PidFile>,
}

/// State shared by the entrypoint: the children and the shutdown switch
pub struct EntrypointContext {
    children: Vec<ManagedChild>,
    restart_delay: Duration,
    shutdown_grace: Duration,
    pid_file: PidFile,
    shutdown: watch::Sender<bool>,
}

impl EntrypointContext {
    pub fn new(children: Vec<ManagedChild>, timing: &TimingSettings, pid_file: PidFile) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            children,
            restart_delay: timing.child_restart_delay(),
            shutdown_grace: timing.shutdown_grace(),
            pid_file,
            shutdown,
        }
    }

    /// Soketi plus the admin API at `admin_binary`
    pub fn from_settings(
        settings: &ManagerSettings,
        config_path: &Path,
        probe: &dyn PathProbe,
        admin_binary: PathBuf,
        admin_args: Vec<String>,
    ) -> Result<Self> {
        let context = CommandContext::new(settings, config_path);
        let resolved = CommandResolver::default()
            .resolve(&context, probe)
            .ok_or_else(|| ManagerError::settings("no Soketi command could be resolved"))?;
        info!("🔍 Soketi deployment environment: {}", resolved.environment);

        let pid_file = PidFile::new(settings.paths.pid_file());

        let server = ManagedChild {
            name: "soketi",
            command: resolved.descriptor.attached(),
            start_delay: Duration::ZERO,
            pid_file: Some(pid_file.clone()),
        };

        // The admin API must edit the file this Soketi instance reads.
        let mut admin_env = HashMap::new();
        admin_env.insert(
            EnvVars::CONFIG_FILE.to_string(),
            config_path.display().to_string(),
        );

        let admin = ManagedChild {
            name: "admin-api",
            command: CommandDescriptor {
                program: admin_binary,
                args: admin_args,
                working_dir: settings.paths.project_root.clone(),
                env: admin_env,
                detached: false,
                stdio: StdioMode::Inherit,
            },
            start_delay: settings.timing.admin_start_delay(),
            pid_file: None,
        };

        Ok(Self::new(vec![server, admin], &settings.timing, pid_file))
    }

    pub fn children(&self) -> &[ManagedChild] {
        &self.children
    }

    /// Run until SIGTERM or SIGINT
    pub async fn run(self) -> Result<()> {
        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;

        self.run_until(async move {
            tokio::select! {
                _ = terminate.recv() => info!("🛑 Received SIGTERM, shutting down..."),
                _ = interrupt.recv() => info!("🛑 Received SIGINT, shutting down..."),
            }
        })
        .await
    }

    /// Supervise every child until `stop` completes, then shut down.
    ///
    /// Children are asked to terminate but not waited for; the call returns
    /// once the grace window has passed.
    pub async fn run_until<F>(self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let tasks: Vec<JoinHandle<()>> = self
            .children
            .iter()
            .cloned()
            .map(|child| {
                tokio::spawn(supervise(
                    child,
                    self.restart_delay,
                    self.shutdown.subscribe(),
                ))
            })
            .collect();

        stop.await;

        let _ = self.shutdown.send(true);
        if let Err(e) = self.pid_file.remove() {
            warn!("Failed to remove PID file {:?}: {}", self.pid_file.path(), e);
        }

        tokio::time::sleep(self.shutdown_grace).await;
        drop(tasks);
        info!("👋 Entrypoint stopped");
        Ok(())
    }
}

async fn supervise(child: ManagedChild, restart_delay: Duration, mut shutdown: watch::Receiver<bool>) {
    if !child.start_delay.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(child.start_delay) => {}
            _ = shutdown.changed() => return,
        }
    }

    loop {
        if *shutdown.borrow() {
            return;
        }

        let mut process = match build_command(&child.command).spawn() {
            Ok(process) => process,
            Err(e) => {
                error!("❌ Failed to start {}: {}", child.name, e);
                return;
            }
        };
        let pid = process.id();
        info!("🚀 Started {} (pid {:?}): {}", child.name, pid, child.command.display());

        if let (Some(pid_file), Some(pid)) = (&child.pid_file, pid) {
            if let Err(e) = pid_file.write(pid) {
                warn!("Failed to write PID file {:?}: {}", pid_file.path(), e);
            }
        }

        let status = tokio::select! {
            status = process.wait() => status,
            _ = shutdown.changed() => {
                if let Some(pid) = pid {
                    if let Err(e) = signal_process(pid, Some(Signal::SIGTERM)) {
                        warn!("Failed to stop {} (pid {}): {}", child.name, pid, e);
                    }
                }
                return;
            }
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                error!("❌ Lost track of {}: {}", child.name, e);
                return;
            }
        };

        if !should_restart(status.code(), status.signal(), *shutdown.borrow()) {
            info!("{} exited ({}), not restarting", child.name, status);
            return;
        }

        warn!(
            "⚠️ {} exited with code {:?}, restarting in {:?}",
            child.name,
            status.code(),
            restart_delay
        );
        tokio::select! {
            _ = tokio::time::sleep(restart_delay) => {}
            _ = shutdown.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixedProbe;
    use crate::supervisor::launcher::is_running;
    use tempfile::TempDir;

    fn shell(name: &'static str, script: String, dir: &Path) -> ManagedChild {
        ManagedChild {
            name,
            command: CommandDescriptor {
                program: PathBuf::from("sh"),
                args: vec!["-c".to_string(), script],
                working_dir: dir.to_path_buf(),
                env: HashMap::new(),
                detached: false,
                stdio: StdioMode::Discard,
            },
            start_delay: Duration::ZERO,
            pid_file: None,
        }
    }

    fn timing() -> TimingSettings {
        TimingSettings {
            child_restart_delay_ms: 50,
            shutdown_grace_ms: 50,
            ..TimingSettings::default()
        }
    }

    #[test]
    fn restart_rule() {
        let term = Signal::SIGTERM as i32;
        let int = Signal::SIGINT as i32;

        assert!(should_restart(Some(1), None, false));
        assert!(!should_restart(Some(0), None, false));
        assert!(!should_restart(None, Some(term), false));
        assert!(!should_restart(None, Some(int), false));
        assert!(!should_restart(Some(1), Some(term), false));
        assert!(!should_restart(Some(1), None, true));
        assert!(!should_restart(None, Some(Signal::SIGKILL as i32), false));
    }

    #[tokio::test]
    async fn crashing_child_is_restarted_until_shutdown() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("starts.log");
        let child = shell("crasher", format!("echo start >> {}; exit 3", log.display()), dir.path());

        let context = EntrypointContext::new(vec![child], &timing(), PidFile::new(dir.path().join(".pid")));
        context
            .run_until(tokio::time::sleep(Duration::from_millis(600)))
            .await
            .unwrap();

        let starts = std::fs::read_to_string(&log).unwrap().lines().count();
        assert!(starts >= 2, "expected restarts, saw {} starts", starts);
    }

    #[tokio::test]
    async fn clean_exit_is_not_restarted() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("starts.log");
        let child = shell("oneshot", format!("echo start >> {}; exit 0", log.display()), dir.path());

        let context = EntrypointContext::new(vec![child], &timing(), PidFile::new(dir.path().join(".pid")));
        context
            .run_until(tokio::time::sleep(Duration::from_millis(400)))
            .await
            .unwrap();

        let starts = std::fs::read_to_string(&log).unwrap().lines().count();
        assert_eq!(starts, 1);
    }

    #[tokio::test]
    async fn server_pid_is_recorded_and_removed_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(dir.path().join(".soketi.pid"));
        let mut server = shell("soketi", "exec sleep 30".to_string(), dir.path());
        server.pid_file = Some(pid_file.clone());

        let context = EntrypointContext::new(vec![server], &timing(), pid_file.clone());
        let observed = pid_file.clone();
        let recorded = std::sync::Arc::new(std::sync::Mutex::new(None));
        let seen = recorded.clone();

        context
            .run_until(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                *seen.lock().unwrap() = observed.read();
            })
            .await
            .unwrap();

        let pid = recorded.lock().unwrap().expect("server pid recorded");
        assert!(pid > 0);
        assert_eq!(pid_file.read(), None);
        assert!(!pid_file.path().exists());

        // Shutdown delivered SIGTERM to the running child.
        let mut stopped = false;
        for _ in 0..50 {
            if !is_running(pid) {
                stopped = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(stopped, "child {} still running after shutdown", pid);
    }

    #[test]
    fn container_layout_builds_server_and_admin_children() {
        let dir = TempDir::new().unwrap();
        let mut settings = ManagerSettings::default();
        settings.paths.project_root = dir.path().to_path_buf();

        let context = EntrypointContext::from_settings(
            &settings,
            Path::new("/app/data/soketi.json"),
            &FixedProbe::new(["/app/bin/server.js"]),
            PathBuf::from("/usr/local/bin/soketi-manager"),
            Vec::new(),
        )
        .unwrap();

        let children = context.children();
        assert_eq!(children.len(), 2);

        let server = &children[0];
        assert_eq!(server.name, "soketi");
        assert_eq!(server.command.program, PathBuf::from("node"));
        assert!(!server.command.detached);
        assert_eq!(server.command.stdio, StdioMode::Inherit);
        assert!(server.pid_file.is_some());

        let admin = &children[1];
        assert_eq!(admin.name, "admin-api");
        assert_eq!(admin.start_delay, Duration::from_millis(3000));
        assert!(admin.pid_file.is_none());
        assert_eq!(
            admin.command.env.get("SOKETI_CONFIG_FILE").map(String::as_str),
            Some("/app/data/soketi.json")
        );
    }
}
