use crate::prelude::FilterResult;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};

/// Run-scoped working directory holding frames, masks and the cube volume.
///
/// Removal is attempted on every exit path. A failed removal is logged and
/// never changes the outcome of the run.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchSpace {
    pub fn create(parent: impl AsRef<Path>) -> FilterResult<Self> {
        let parent = parent.as_ref();
        fs::create_dir_all(parent)?;
        let dir = Builder::new().prefix("subsonic-").tempdir_in(parent)?;
        let path = dir.path().to_path_buf();
        info!("scratch space at {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cube_path(&self) -> PathBuf {
        self.path.join("cube_volume.dat")
    }

    /// Deletes the directory now; returns whether removal succeeded.
    pub fn close(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        match self.dir.take() {
            Some(dir) => match dir.close() {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        "could not remove scratch space {}: {}",
                        self.path.display(),
                        err
                    );
                    false
                }
            },
            None => true,
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        self.release();
    }
}
