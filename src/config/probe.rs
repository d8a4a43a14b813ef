//! Filesystem existence probing.
//!
//! Deployment detection (config location, container markers, vendored
//! executables) only ever asks "does this path exist?". Routing those checks
//! through [`PathProbe`] lets tests substitute a fixed set of paths for the
//! real filesystem.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Answers existence questions about paths.
pub trait PathProbe: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealProbe;

impl PathProbe for RealProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

impl<F> PathProbe for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn exists(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Probe that reports a fixed set of paths as present.
#[derive(Clone, Default)]
pub struct FixedProbe {
    present: HashSet<PathBuf>,
}

impl FixedProbe {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            present: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl fmt::Debug for FixedProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.present.iter()).finish()
    }
}

impl PathProbe for FixedProbe {
    fn exists(&self, path: &Path) -> bool {
        self.present.contains(path)
    }
}
