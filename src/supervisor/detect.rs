//! Deployment environment detection.
//!
//! Each [`EnvironmentDetector`] pairs a side-effect free predicate with a
//! descriptor builder. Detectors are evaluated in priority order and the
//! first match decides how Soketi is invoked. Evaluation is repeated on
//! every restart, so a freshly installed local executable is picked up
//! without restarting the manager.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{ManagerSettings, PathProbe, PathSettings, SoketiSettings};
use crate::supervisor::types::{CommandDescriptor, StdioMode};

/// Inputs shared by every detector
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub paths: PathSettings,
    pub soketi: SoketiSettings,
    /// Resolved Soketi config path passed as `--config`
    pub config_path: PathBuf,
}

impl CommandContext {
    pub fn new(settings: &ManagerSettings, config_path: &Path) -> Self {
        Self {
            paths: settings.paths.clone(),
            soketi: settings.soketi.clone(),
            config_path: config_path.to_path_buf(),
        }
    }

    fn soketi_args(&self) -> Vec<String> {
        vec![
            "start".to_string(),
            "--config".to_string(),
            self.config_path.display().to_string(),
        ]
    }
}

type Predicate = fn(&CommandContext, &dyn PathProbe) -> bool;
type Builder = fn(&CommandContext) -> CommandDescriptor;

/// One candidate deployment environment
#[derive(Clone)]
pub struct EnvironmentDetector {
    pub name: &'static str,
    matches: Predicate,
    build: Builder,
}

impl std::fmt::Debug for EnvironmentDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentDetector")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl EnvironmentDetector {
    pub fn new(name: &'static str, matches: Predicate, build: Builder) -> Self {
        Self { name, matches, build }
    }

    pub fn matches(&self, context: &CommandContext, probe: &dyn PathProbe) -> bool {
        (self.matches)(context, probe)
    }

    pub fn build(&self, context: &CommandContext) -> CommandDescriptor {
        (self.build)(context)
    }

    /// Container image with the Soketi entry script baked in
    pub fn container() -> Self {
        Self::new(
            "container",
            |ctx, probe| probe.exists(&ctx.paths.container_script),
            |ctx| {
                let mut args = vec![ctx.paths.container_script.display().to_string()];
                args.extend(ctx.soketi_args());

                let mut env = HashMap::new();
                env.insert(
                    "NODE_PATH".to_string(),
                    ctx.paths.container_node_modules().display().to_string(),
                );

                CommandDescriptor {
                    program: PathBuf::from(&ctx.soketi.node_binary),
                    args,
                    working_dir: ctx.paths.container_root.clone(),
                    env,
                    detached: true,
                    stdio: StdioMode::Discard,
                }
            },
        )
    }

    /// Soketi vendored into the project (`node_modules/.bin/soketi`)
    pub fn local() -> Self {
        Self::new(
            "local",
            |ctx, probe| probe.exists(&ctx.paths.local_executable_path()),
            |ctx| CommandDescriptor {
                program: ctx.paths.local_executable_path(),
                args: ctx.soketi_args(),
                working_dir: ctx.paths.project_root.clone(),
                env: HashMap::new(),
                detached: true,
                stdio: StdioMode::Discard,
            },
        )
    }

    /// Soketi installed globally and found on PATH
    pub fn global() -> Self {
        Self::new(
            "global",
            |_, _| true,
            |ctx| CommandDescriptor {
                program: PathBuf::from(&ctx.soketi.command),
                args: ctx.soketi_args(),
                working_dir: ctx.paths.project_root.clone(),
                env: HashMap::new(),
                detached: true,
                stdio: StdioMode::Discard,
            },
        )
    }
}

/// Result of resolving a command
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub environment: &'static str,
    pub descriptor: CommandDescriptor,
}

/// Ordered list of detectors
#[derive(Debug, Clone)]
pub struct CommandResolver {
    detectors: Vec<EnvironmentDetector>,
}

impl Default for CommandResolver {
    fn default() -> Self {
        Self::new(vec![
            EnvironmentDetector::container(),
            EnvironmentDetector::local(),
            EnvironmentDetector::global(),
        ])
    }
}

impl CommandResolver {
    pub fn new(detectors: Vec<EnvironmentDetector>) -> Self {
        Self { detectors }
    }

    /// First matching detector's descriptor, or `None` if nothing matches
    pub fn resolve(&self, context: &CommandContext, probe: &dyn PathProbe) -> Option<ResolvedCommand> {
        for detector in &self.detectors {
            if detector.matches(context, probe) {
                let descriptor = detector.build(context);
                debug!(
                    "Deployment environment '{}' selected: {}",
                    detector.name,
                    descriptor.display()
                );
                return Some(ResolvedCommand {
                    environment: detector.name,
                    descriptor,
                });
            }
        }
        None
    }
}
