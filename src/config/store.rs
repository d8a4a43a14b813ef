//! Shared Soketi configuration file access.
//!
//! The JSON document at the resolved path is read by Soketi at its own
//! startup and mutated here by the admin API. The store treats the document
//! as opaque: it only knows how to find it, seed it, read it and replace it.

use std::path::{Path, PathBuf};

use nix::errno::Errno;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::probe::PathProbe;
use crate::error::{ManagerError, Result};

/// Where the resolved config path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    /// `SOKETI_CONFIG_FILE` (or an explicit settings value)
    Override,
    /// Container image config (`/app/soketi.json`)
    Container,
    /// Container persistent volume (`/app/data/soketi.json`)
    ContainerVolume,
    /// Project-relative development config
    Development,
}

impl std::fmt::Display for PathSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PathSource::Override => "override",
            PathSource::Container => "container",
            PathSource::ContainerVolume => "container volume",
            PathSource::Development => "development",
        };
        f.write_str(label)
    }
}

/// Candidate locations for the config file and its bundled defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayout {
    pub override_path: Option<PathBuf>,
    pub container_config: PathBuf,
    pub container_volume_config: PathBuf,
    pub container_default: PathBuf,
    pub development_config: PathBuf,
    pub development_default: PathBuf,
}

impl ConfigLayout {
    /// Resolve the config path by precedence: override, container config,
    /// container volume (present or about to be seeded), development path.
    pub fn resolve(&self, probe: &dyn PathProbe) -> (PathBuf, PathSource) {
        if let Some(ref path) = self.override_path {
            return (path.clone(), PathSource::Override);
        }

        if probe.exists(&self.container_config) {
            return (self.container_config.clone(), PathSource::Container);
        }

        if probe.exists(&self.container_volume_config) || probe.exists(&self.container_default) {
            return (self.container_volume_config.clone(), PathSource::ContainerVolume);
        }

        (self.development_config.clone(), PathSource::Development)
    }

    /// Bundled default documents, in the order they are tried when seeding
    pub fn default_candidates(&self) -> Vec<PathBuf> {
        vec![self.container_default.clone(), self.development_default.clone()]
    }
}

/// Reader/writer for the single shared configuration document.
///
/// The path is resolved once at construction and never recomputed, so every
/// component holding this store (the CRUD layer, the process supervisor)
/// agrees on the same file. No locking is done here; callers serialize their
/// own read-modify-write cycles.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    source: PathSource,
    defaults: Vec<PathBuf>,
}

impl ConfigStore {
    /// Resolve the config path from `layout` and remember it
    pub fn new(layout: &ConfigLayout, probe: &dyn PathProbe) -> Self {
        let (path, source) = layout.resolve(probe);
        debug!("Resolved config path {:?} ({})", path, source);
        Self {
            path,
            source,
            defaults: layout.default_candidates(),
        }
    }

    /// Store bound to an explicit path with no seeding fallback
    pub fn at<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            source: PathSource::Override,
            defaults: Vec::new(),
        }
    }

    /// Replace the bundled default candidates used for seeding
    pub fn with_defaults(mut self, defaults: Vec<PathBuf>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> PathSource {
        self.source
    }

    /// Load and parse the document.
    ///
    /// A missing file is seeded once from the first existing bundled default
    /// and read again; this covers a persistent volume that is still empty
    /// at boot. Without a default the read fails with `ConfigNotFound`.
    pub async fn read(&self) -> Result<Value> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => self.parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !self.seed_from_default().await? {
                    return Err(ManagerError::config_not_found(&self.path));
                }

                match tokio::fs::read_to_string(&self.path).await {
                    Ok(contents) => self.parse(&contents),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Err(ManagerError::config_not_found(&self.path))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the whole document on disk.
    ///
    /// The serialized document goes to a sibling temporary file which is
    /// then renamed over the target, so Soketi never observes a half-written
    /// file.
    pub async fn write(&self, document: &Value) -> Result<()> {
        let contents = serde_json::to_string_pretty(document)
            .map_err(|e| ManagerError::config_corrupt(&self.path, e))?;
        write_atomic(&self.path, contents.as_bytes()).await?;
        debug!("Wrote config file {:?}", self.path);
        Ok(())
    }

    fn parse(&self, contents: &str) -> Result<Value> {
        serde_json::from_str(contents).map_err(|e| ManagerError::config_corrupt(&self.path, e))
    }

    async fn seed_from_default(&self) -> Result<bool> {
        for default in &self.defaults {
            if default == &self.path {
                continue;
            }

            let bytes = match tokio::fs::read(default).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Failed to read bundled default {:?}: {}", default, e);
                    continue;
                }
            };

            write_atomic(&self.path, &bytes).await?;
            info!("📋 Seeded config file {:?} from bundled default {:?}", self.path, default);
            return Ok(true);
        }

        Ok(false)
    }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    let tmp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    tokio::fs::write(&tmp_path, contents).await?;

    // The file holds app secrets; the replacement keeps the original mode.
    if let Ok(metadata) = tokio::fs::metadata(path).await {
        if let Err(e) = tokio::fs::set_permissions(&tmp_path, metadata.permissions()).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
    }

    match tokio::fs::rename(&tmp_path, path).await {
        Ok(()) => Ok(()),
        Err(e) if is_unrenamable_target(&e) => {
            // Single-file bind mounts cannot be replaced, only rewritten.
            debug!("Rename onto {:?} failed ({}), writing in place", path, e);
            let _ = tokio::fs::remove_file(&tmp_path).await;
            tokio::fs::write(path, contents).await?;
            Ok(())
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            Err(e.into())
        }
    }
}

fn is_unrenamable_target(error: &std::io::Error) -> bool {
    matches!(
        error.raw_os_error(),
        Some(code) if code == Errno::EBUSY as i32 || code == Errno::EXDEV as i32
    )
}
