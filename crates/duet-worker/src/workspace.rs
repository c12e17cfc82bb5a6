//! Per-run scratch workspace.
//!
//! Every intermediate file of a run lives in one directory owned by that run.
//! The directory is removed exactly once: by `close()` on the normal path, or
//! by `Drop` when the run is torn down early (cancellation, panic).

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, warn};

use duet_models::RunId;

const CLOSE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Scratch directory owned by a single composition run.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchWorkspace {
    /// Create a uniquely named directory under `root`.
    ///
    /// The workspace path is always absolute, even for a relative `root`.
    pub async fn create(root: &Path, run_id: &RunId) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let root = std::path::absolute(root)?;

        let prefix = format!("compose-{}-", run_id.short());
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(&root)
        })
        .await
        .map_err(io::Error::other)??;

        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "Created scratch workspace");

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory and everything in it.
    ///
    /// A failed removal is retried once after a short delay; a directory that
    /// is already gone counts as removed.
    pub async fn close(mut self) -> io::Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        let path = self.path.clone();
        let first = tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(io::Error::other)?;

        match first {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Retrying scratch workspace removal");
                tokio::time::sleep(CLOSE_RETRY_DELAY).await;
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }

        debug!(path = %path.display(), "Removed scratch workspace");
        Ok(())
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove scratch workspace"
                );
            }
        }
    }
}
