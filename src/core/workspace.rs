use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to clean workspace {path}: {source}")]
    Clean {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create workspace {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Owner of the on-disk directory that builds run in.
///
/// Only one [`Workspace`] can be borrowed from a slot at a time, so two tasks
/// never observe the same directory concurrently.
#[derive(Debug, Clone)]
pub struct WorkspaceSlot {
    root: PathBuf,
}

impl WorkspaceSlot {
    pub fn new<T: AsRef<Path>>(root: T) -> Self {
        Self {
            root: root.as_ref().into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Erases whatever a previous task left behind and hands out a pristine
    /// directory.
    pub async fn acquire(&mut self) -> Result<Workspace<'_>, WorkspaceError> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(WorkspaceError::Clean {
                    path: self.root.clone(),
                    source,
                });
            }
        }
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: self.root.clone(),
                source,
            })?;

        tracing::debug!(path = %self.root.display(), "Workspace reset");
        Ok(Workspace { root: &self.root })
    }
}

#[derive(Debug)]
pub struct Workspace<'a> {
    root: &'a Path,
}

impl Workspace<'_> {
    pub fn path(&self) -> &Path {
        self.root
    }

    /// Erases the directory once the build no longer needs it. Failures are
    /// logged only; the next acquire retries the cleanup.
    pub async fn release(self) {
        match fs::remove_dir_all(self.root).await {
            Ok(()) => tracing::debug!(path = %self.root.display(), "Workspace released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.root.display(),
                "Failed to release workspace: {}",
                e
            ),
        }
    }
}
