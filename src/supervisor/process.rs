//! Soketi process supervision.
//!
//! [`ProcessSupervisor::restart`] stops the instance recorded in the PID
//! file, starts a replacement for the current deployment environment and
//! reports a [`RestartOutcome`]. Ownership of the child ends once its start
//! is confirmed; it is not waited on afterwards.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{ManagerSettings, PathProbe, RealProbe, TimingSettings};
use crate::error::{ManagerError, Result, SpawnFailureKind};
use crate::supervisor::detect::{CommandContext, CommandResolver, ResolvedCommand};
use crate::supervisor::launcher::{terminate, LaunchEvent, LaunchHandle, ProcessLauncher, TokioLauncher};
use crate::supervisor::pid_file::PidFile;
use crate::supervisor::types::RestartOutcome;

const NOT_FOUND_MESSAGE: &str =
    "Soketi command not found. For local development, install it with: npm install -g @soketi/soketi";

/// Anything that can restart the Soketi server
#[async_trait]
pub trait ServerRestarter: Send + Sync {
    async fn restart(&self) -> RestartOutcome;
}

/// Owns the lifecycle of the Soketi server process
pub struct ProcessSupervisor {
    context: CommandContext,
    timing: TimingSettings,
    pid_file: PidFile,
    resolver: CommandResolver,
    probe: Arc<dyn PathProbe>,
    launcher: Arc<dyn ProcessLauncher>,
    restart_lock: Mutex<()>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("config_path", &self.context.config_path)
            .field("pid_file", &self.pid_file)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Supervisor for the real filesystem and OS processes.
    ///
    /// `config_path` must be the path the config store resolved, so the
    /// server reads the same file the admin API writes.
    pub fn new(settings: &ManagerSettings, config_path: &Path) -> Self {
        Self {
            context: CommandContext::new(settings, config_path),
            timing: settings.timing.clone(),
            pid_file: PidFile::new(settings.paths.pid_file()),
            resolver: CommandResolver::default(),
            probe: Arc::new(RealProbe),
            launcher: Arc::new(TokioLauncher),
            restart_lock: Mutex::new(()),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn PathProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_resolver(mut self, resolver: CommandResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.context.config_path
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    /// PID of the last started instance, if recorded. May be stale.
    pub fn get_active_pid(&self) -> Option<u32> {
        self.pid_file.read()
    }

    /// Command for the current deployment environment, probed fresh
    pub fn resolve_command(&self) -> Option<ResolvedCommand> {
        self.resolver.resolve(&self.context, self.probe.as_ref())
    }

    /// Stop the running instance (if any) and start a new one.
    ///
    /// Never fails: every error ends up in the returned outcome. Concurrent
    /// calls queue behind each other.
    pub async fn restart(&self) -> RestartOutcome {
        let _guard = self.restart_lock.lock().await;
        info!("🔄 Restarting Soketi...");

        match self.restart_locked().await {
            Ok(outcome) => {
                if outcome.success {
                    info!("✅ {} (pid {:?})", outcome.message, outcome.pid);
                } else {
                    error!("❌ {}", outcome.message);
                }
                outcome
            }
            Err(e) => {
                error!("❌ Failed to restart Soketi [{}]: {}", e.category(), e);
                RestartOutcome::failed("Failed to restart Soketi", e.to_string())
            }
        }
    }

    async fn restart_locked(&self) -> Result<RestartOutcome> {
        if let Some(pid) = self.get_active_pid() {
            debug!("Stopping previous Soketi instance {}", pid);
            terminate(pid, self.timing.grace_period()).await;
        }

        let resolved = match self.resolve_command() {
            Some(resolved) => resolved,
            None => {
                return Ok(RestartOutcome::failed(
                    "Failed to start Soketi: no deployment environment matched",
                    "no command could be resolved",
                ))
            }
        };
        info!(
            "🚀 Starting Soketi ({}): {}",
            resolved.environment,
            resolved.descriptor.display()
        );

        let handle = self.launcher.launch(&resolved.descriptor);
        self.await_startup(handle).await
    }

    /// Race the launcher's explicit signal against the fallback delay.
    /// Only one branch produces the outcome.
    async fn await_startup(&self, handle: LaunchHandle) -> Result<RestartOutcome> {
        let LaunchHandle { mut events, state } = handle;
        let fallback = self.timing.spawn_fallback();

        let signalled = tokio::select! {
            biased;
            event = &mut events => Some(event),
            _ = tokio::time::sleep(fallback) => None,
        };

        let event = match signalled {
            Some(event) => event,
            None => {
                if let Some(pid) = state.live_pid() {
                    debug!("No start signal after {:?}; pid {} is live", fallback, pid);
                    return Ok(self.finish_success(pid));
                }

                let remaining = self.timing.spawn_deadline().saturating_sub(fallback);
                match tokio::time::timeout(remaining, events).await {
                    Ok(event) => event,
                    Err(_) => {
                        state.mark_killed();
                        return Ok(RestartOutcome::failed(
                            "Soketi did not report startup",
                            format!(
                                "no spawn result within {:?}",
                                self.timing.spawn_deadline()
                            ),
                        ));
                    }
                }
            }
        };

        match event {
            Ok(LaunchEvent::Spawned { pid }) => Ok(self.finish_success(pid)),
            Ok(LaunchEvent::Failed(e)) => Ok(spawn_failure(&e)),
            Err(_) => Err(ManagerError::Internal(anyhow::anyhow!(
                "launcher exited without reporting a result"
            ))),
        }
    }

    fn finish_success(&self, pid: u32) -> RestartOutcome {
        if let Err(e) = self.pid_file.write(pid) {
            warn!(
                "Soketi started as pid {} but the PID file {:?} could not be written: {}",
                pid,
                self.pid_file.path(),
                e
            );
        }
        RestartOutcome::started(pid)
    }
}

fn spawn_failure(error: &std::io::Error) -> RestartOutcome {
    match ManagerError::spawn(error) {
        ManagerError::ProcessSpawn {
            kind: SpawnFailureKind::NotFound,
            message,
        } => RestartOutcome::failed(NOT_FOUND_MESSAGE, message),
        ManagerError::ProcessSpawn { message, .. } => {
            RestartOutcome::failed(format!("Failed to start Soketi: {}", message), message)
        }
        other => RestartOutcome::failed("Failed to restart Soketi", other.to_string()),
    }
}

#[async_trait]
impl ServerRestarter for ProcessSupervisor {
    async fn restart(&self) -> RestartOutcome {
        ProcessSupervisor::restart(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixedProbe;
    use crate::supervisor::detect::EnvironmentDetector;
    use crate::supervisor::types::{CommandDescriptor, StdioMode};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    // PIDs above the kernel's pid_max; signalling them always fails.
    const FIRST_FAKE_PID: u32 = 900_000_001;

    enum Script {
        Spawn,
        Fail(std::io::ErrorKind),
        /// Records a pid (or not) and never reports
        Silent { pid: bool },
        /// Drops the sender without reporting
        Vanish,
    }

    struct ScriptedLauncher {
        script: Script,
        next_pid: AtomicU32,
        launched: StdMutex<Vec<CommandDescriptor>>,
        held: StdMutex<Vec<oneshot::Sender<LaunchEvent>>>,
    }

    impl ScriptedLauncher {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                next_pid: AtomicU32::new(FIRST_FAKE_PID),
                launched: StdMutex::new(Vec::new()),
                held: StdMutex::new(Vec::new()),
            })
        }

        fn launches(&self) -> usize {
            self.launched.lock().unwrap().len()
        }
    }

    impl ProcessLauncher for ScriptedLauncher {
        fn launch(&self, command: &CommandDescriptor) -> LaunchHandle {
            self.launched.lock().unwrap().push(command.clone());
            let (tx, state, handle) = LaunchHandle::channel();
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);

            match self.script {
                Script::Spawn => {
                    state.record_pid(pid);
                    tx.send(LaunchEvent::Spawned { pid }).unwrap();
                }
                Script::Fail(kind) => {
                    tx.send(LaunchEvent::Failed(std::io::Error::new(kind, "spawn failed")))
                        .unwrap();
                }
                Script::Silent { pid: with_pid } => {
                    if with_pid {
                        state.record_pid(pid);
                    }
                    self.held.lock().unwrap().push(tx);
                }
                Script::Vanish => drop(tx),
            }

            handle
        }
    }

    fn settings(dir: &TempDir) -> ManagerSettings {
        let mut settings = ManagerSettings::default();
        settings.paths.project_root = dir.path().to_path_buf();
        settings.timing.grace_period_ms = 10;
        settings.timing.spawn_fallback_ms = 20;
        settings.timing.spawn_deadline_ms = 150;
        settings
    }

    fn supervisor(dir: &TempDir, launcher: Arc<dyn ProcessLauncher>) -> ProcessSupervisor {
        ProcessSupervisor::new(&settings(dir), &dir.path().join("soketi.json"))
            .with_probe(Arc::new(FixedProbe::empty()))
            .with_launcher(launcher)
    }

    #[tokio::test]
    async fn stale_pid_is_replaced_with_new_pid() {
        let dir = TempDir::new().unwrap();
        let launcher = ScriptedLauncher::new(Script::Spawn);
        let supervisor = supervisor(&dir, launcher.clone());
        supervisor.pid_file().write(999_999_999).unwrap();

        let outcome = supervisor.restart().await;

        assert!(outcome.success, "{:?}", outcome);
        assert_eq!(outcome.message, "Soketi restarted successfully");
        assert_eq!(outcome.pid, Some(FIRST_FAKE_PID));
        assert_eq!(supervisor.get_active_pid(), Some(FIRST_FAKE_PID));
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test]
    async fn restart_without_previous_instance_succeeds() {
        let dir = TempDir::new().unwrap();
        let supervisor = supervisor(&dir, ScriptedLauncher::new(Script::Spawn));
        assert_eq!(supervisor.get_active_pid(), None);

        let outcome = supervisor.restart().await;
        assert!(outcome.success);
        assert_eq!(supervisor.get_active_pid(), outcome.pid);
    }

    #[tokio::test]
    async fn global_command_receives_resolved_config_path() {
        let dir = TempDir::new().unwrap();
        let launcher = ScriptedLauncher::new(Script::Spawn);
        let supervisor = supervisor(&dir, launcher.clone());

        supervisor.restart().await;

        let launched = launcher.launched.lock().unwrap();
        assert_eq!(launched[0].program, PathBuf::from("soketi"));
        assert_eq!(
            launched[0].args,
            vec![
                "start".to_string(),
                "--config".to_string(),
                dir.path().join("soketi.json").display().to_string()
            ]
        );
    }

    #[tokio::test]
    async fn fallback_resolves_when_no_signal_arrives() {
        let dir = TempDir::new().unwrap();
        let supervisor = supervisor(&dir, ScriptedLauncher::new(Script::Silent { pid: true }));

        let outcome = supervisor.restart().await;

        assert!(outcome.success);
        assert_eq!(outcome.pid, Some(FIRST_FAKE_PID));
        assert_eq!(supervisor.get_active_pid(), Some(FIRST_FAKE_PID));
    }

    #[tokio::test]
    async fn silent_launch_without_pid_fails_at_deadline() {
        let dir = TempDir::new().unwrap();
        let supervisor = supervisor(&dir, ScriptedLauncher::new(Script::Silent { pid: false }));

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), supervisor.restart())
            .await
            .expect("restart must resolve");

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Soketi did not report startup");
        assert_eq!(supervisor.get_active_pid(), None);
    }

    #[tokio::test]
    async fn missing_command_has_install_hint() {
        let dir = TempDir::new().unwrap();
        let supervisor = supervisor(
            &dir,
            ScriptedLauncher::new(Script::Fail(std::io::ErrorKind::NotFound)),
        );

        let outcome = supervisor.restart().await;

        assert!(!outcome.success);
        assert!(outcome.message.contains("npm install -g @soketi/soketi"));
        assert!(outcome.error.is_some());
        assert_eq!(supervisor.get_active_pid(), None);
    }

    #[tokio::test]
    async fn other_spawn_failures_are_reported() {
        let dir = TempDir::new().unwrap();
        let supervisor = supervisor(
            &dir,
            ScriptedLauncher::new(Script::Fail(std::io::ErrorKind::PermissionDenied)),
        );

        let outcome = supervisor.restart().await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Failed to start Soketi: "));
    }

    #[tokio::test]
    async fn unexpected_launcher_failure_becomes_failed_outcome() {
        let dir = TempDir::new().unwrap();
        let supervisor = supervisor(&dir, ScriptedLauncher::new(Script::Vanish));

        let outcome = supervisor.restart().await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Failed to restart Soketi");
    }

    #[tokio::test]
    async fn overlapping_restarts_run_one_after_another() {
        let dir = TempDir::new().unwrap();
        let launcher = ScriptedLauncher::new(Script::Silent { pid: true });
        let supervisor = Arc::new(supervisor(&dir, launcher.clone()));

        let (a, b) = tokio::join!(supervisor.restart(), supervisor.restart());

        assert!(a.success && b.success);
        assert_ne!(a.pid, b.pid);
        assert_eq!(launcher.launches(), 2);
        let last = a.pid.max(b.pid);
        assert_eq!(supervisor.get_active_pid(), last);
    }

    #[tokio::test]
    async fn real_launcher_reports_missing_binary() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir);
        settings.soketi.command = "/nonexistent/bin/soketi".to_string();

        let supervisor = ProcessSupervisor::new(&settings, &dir.path().join("soketi.json"))
            .with_probe(Arc::new(FixedProbe::empty()));

        let outcome = supervisor.restart().await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Soketi command not found"));
    }

    #[tokio::test]
    async fn real_launcher_records_spawned_pid() {
        let dir = TempDir::new().unwrap();
        let resolver = CommandResolver::new(vec![EnvironmentDetector::new(
            "sleeper",
            |_, _| true,
            |ctx| CommandDescriptor {
                program: PathBuf::from("sleep"),
                args: vec!["30".to_string()],
                working_dir: ctx.paths.project_root.clone(),
                env: HashMap::new(),
                detached: true,
                stdio: StdioMode::Discard,
            },
        )]);
        let supervisor = ProcessSupervisor::new(&settings(&dir), &dir.path().join("soketi.json"))
            .with_resolver(resolver);

        let outcome = supervisor.restart().await;
        assert!(outcome.success, "{:?}", outcome);
        let pid = outcome.pid.unwrap();
        assert_eq!(supervisor.get_active_pid(), Some(pid));

        // A second restart stops the first instance before starting another.
        let second = supervisor.restart().await;
        assert!(second.success);
        assert_ne!(second.pid, Some(pid));

        terminate(second.pid.unwrap(), std::time::Duration::from_millis(50)).await;
    }
}
