use crate::error::Result;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Scratch location for intermediate datasets. All paths minted here live in
/// one temporary directory that is removed when the workspace drops, so
/// abandoned intermediates never outlive a failed run.
pub struct Workspace {
    dir: TempDir,
    counter: AtomicUsize,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("raster-pipeline-").tempdir()?;
        debug!("Workspace: {}", dir.path().display());
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Mint a fresh, labeled scratch path. Sequential names keep reruns
    /// reproducible and failures easy to inspect.
    pub fn scratch_path(&self, label: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.dir.path().join(format!("{:03}-{}.tif", n, label))
    }
}
