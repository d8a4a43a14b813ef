//! End-to-end restart tests against a stand-in Soketi executable

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use soketi_manager::config::{ConfigStore, ManagerSettings, RealProbe};
use soketi_manager::services::{AppRegistry, NewApp};
use soketi_manager::supervisor::{signal_process, terminate, ProcessSupervisor};

/// Installs `node_modules/.bin/soketi` that records its arguments and sleeps
fn install_fake_soketi(root: &Path) {
    let bin = root.join("node_modules").join(".bin");
    std::fs::create_dir_all(&bin).unwrap();
    let script = bin.join("soketi");
    std::fs::write(
        &script,
        "#!/bin/sh\necho \"$@\" > \"$(dirname \"$0\")/../../args.txt\"\nexec sleep 30\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn settings(root: &Path) -> ManagerSettings {
    let mut settings = ManagerSettings::default();
    settings.paths.project_root = root.to_path_buf();
    // Keep the container layout out of reach on machines that have /app.
    settings.paths.container_root = root.join("missing-app");
    settings.paths.container_script = root.join("missing-app/bin/server.js");
    settings.paths.container_config = root.join("missing-app/soketi.json");
    settings.paths.container_volume_config = root.join("missing-app/data/soketi.json");
    settings.timing.grace_period_ms = 100;
    settings
}

async fn wait_for_file(path: &Path) -> String {
    for _ in 0..50 {
        if let Ok(contents) = std::fs::read_to_string(path) {
            if !contents.is_empty() {
                return contents;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{:?} never appeared", path);
}

#[tokio::test]
async fn test_restart_uses_vendored_executable_and_replaces_stale_pid() {
    let dir = TempDir::new().unwrap();
    install_fake_soketi(dir.path());
    let settings = settings(dir.path());

    let store = ConfigStore::new(&settings.paths.config_layout(), &RealProbe);
    assert_eq!(store.path(), dir.path().join("soketi.json"));

    let supervisor = ProcessSupervisor::new(&settings, store.path());
    // Above pid_max; never a live process.
    supervisor.pid_file().write(999_999_999).unwrap();

    let resolved = supervisor.resolve_command().unwrap();
    assert_eq!(resolved.environment, "local");

    let outcome = supervisor.restart().await;
    assert!(outcome.success, "{:?}", outcome);
    let pid = outcome.pid.unwrap();
    assert_eq!(supervisor.get_active_pid(), Some(pid));

    let args = wait_for_file(&dir.path().join("args.txt")).await;
    assert_eq!(
        args.trim(),
        format!("start --config {}", dir.path().join("soketi.json").display())
    );

    // The next restart stops this instance first.
    let second = supervisor.restart().await;
    assert!(second.success);
    let second_pid = second.pid.unwrap();
    assert_ne!(second_pid, pid);
    assert_eq!(supervisor.get_active_pid(), Some(second_pid));

    terminate(second_pid, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_app_creation_restarts_server() {
    let dir = TempDir::new().unwrap();
    install_fake_soketi(dir.path());
    let settings = settings(dir.path());
    std::fs::write(
        dir.path().join("soketi.default.json"),
        json!({"appManager": {"array": {"apps": []}}}).to_string(),
    )
    .unwrap();

    let store = Arc::new(ConfigStore::new(&settings.paths.config_layout(), &RealProbe));
    let supervisor = Arc::new(ProcessSupervisor::new(&settings, store.path()));
    let registry = AppRegistry::new(store.clone(), supervisor.clone());

    let change = registry
        .create(NewApp {
            id: Some("a1".into()),
            key: Some("k1".into()),
            secret: Some("s1".into()),
            ..NewApp::default()
        })
        .await
        .unwrap();

    assert!(change.restart.success, "{:?}", change.restart);
    let pid = change.restart.pid.unwrap();
    assert!(signal_process(pid, None).is_ok());

    // Seeded from the bundled default, then written with the new app.
    let stored = store.read().await.unwrap();
    assert_eq!(stored["appManager"]["array"]["apps"][0]["id"], "a1");

    terminate(pid, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_missing_soketi_reports_install_hint() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings(dir.path());
    settings.soketi.command = dir.path().join("not-installed").display().to_string();

    let supervisor = ProcessSupervisor::new(&settings, &dir.path().join("soketi.json"));
    let outcome = supervisor.restart().await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.message,
        "Soketi command not found. For local development, install it with: npm install -g @soketi/soketi"
    );
    assert_eq!(supervisor.get_active_pid(), None);
}
