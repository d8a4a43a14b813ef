//! PID file for the supervised Soketi instance.
//!
//! The file holds one base-10 integer. It is advisory: readers must expect a
//! stale PID, and a missing or garbled file simply means "no known instance".

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded PID, or `None` when the file is absent or unparsable
    pub fn read(&self) -> Option<u32> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Error reading Soketi PID file {:?}: {}", self.path, e);
                return None;
            }
        };

        match contents.trim().parse::<u32>() {
            Ok(0) => None,
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!("Ignoring unparsable PID file {:?}: {}", self.path, e);
                None
            }
        }
    }

    pub fn write(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, pid.to_string())?;
        Ok(())
    }

    /// Remove the file; a missing file is not an error
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
