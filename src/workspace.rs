//! Per-request workspace directories.
//!
//! A [`Workspace`] owns `<root>/<uuid>` for the lifetime of one execution. The
//! directory is removed by [`Workspace::destroy`], or by `Drop` if the owning
//! future is cancelled or unwinds first. Removal happens at most once and its
//! failure is only logged.

use std::fs::Permissions;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A file written into a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh, empty workspace directory.
    pub async fn create(&self) -> Result<Workspace> {
        let id = Uuid::new_v4();

        fs::create_dir_all(&self.root).await?;
        // Bind mounts need an absolute host path.
        let path = fs::canonicalize(&self.root).await?.join(id.to_string());
        // create_dir (not _all) so a colliding path is an error, never a reuse.
        fs::create_dir(&path).await?;
        let workspace = Workspace {
            id,
            path,
            files: Vec::new(),
            released: false,
        };
        // Container user may differ from the host user.
        fs::set_permissions(&workspace.path, Permissions::from_mode(0o777)).await?;

        debug!(workspace = %id, path = ?workspace.path, "Workspace created");
        Ok(workspace)
    }
}

#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    path: PathBuf,
    files: Vec<SourceFile>,
    released: bool,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Write the single source file of this workspace.
    pub async fn write_source(&mut self, filename: &str, content: &str) -> Result<PathBuf> {
        if filename.is_empty() || filename.contains('/') || filename == "." || filename == ".." {
            return Err(Error::Workspace(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid source filename: {filename:?}"),
            )));
        }
        if !self.files.is_empty() {
            return Err(Error::Workspace(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "workspace already holds a source file",
            )));
        }

        let full_path = self.path.join(filename);
        fs::write(&full_path, content).await?;
        fs::set_permissions(&full_path, Permissions::from_mode(0o644)).await?;

        self.files.push(SourceFile {
            name: filename.to_string(),
            content: content.to_string(),
        });
        Ok(full_path)
    }

    /// Remove the directory and everything in it.
    pub async fn destroy(mut self) {
        self.released = true;
        let result = fs::remove_dir_all(&self.path).await;
        log_removal(self.id, &self.path, result);
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let result = std::fs::remove_dir_all(&self.path);
        log_removal(self.id, &self.path, result);
    }
}

fn log_removal(id: Uuid, path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => debug!(workspace = %id, "Workspace removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(workspace = %id, path = ?path, error = %e, "Cleanup failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_makes_empty_unique_directory() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let a = manager.create().await.unwrap();
        let b = manager.create().await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());
        assert_eq!(std::fs::read_dir(a.path()).unwrap().count(), 0);
        assert!(a.files().is_empty());
    }

    #[tokio::test]
    async fn create_builds_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("temp").join("runs");
        let manager = WorkspaceManager::new(&nested);

        let ws = manager.create().await.unwrap();
        assert!(ws.path().is_absolute());
        assert!(ws.path().starts_with(std::fs::canonicalize(&nested).unwrap()));
    }

    #[tokio::test]
    async fn write_source_records_file() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = WorkspaceManager::new(root.path()).create().await.unwrap();

        let path = ws.write_source("main.py", "print('hi')\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "print('hi')\n");
        assert_eq!(ws.files().len(), 1);
        assert_eq!(ws.files()[0].name, "main.py");
    }

    #[tokio::test]
    async fn second_write_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = WorkspaceManager::new(root.path()).create().await.unwrap();

        ws.write_source("main.py", "a").await.unwrap();
        assert!(ws.write_source("other.py", "b").await.is_err());
    }

    #[tokio::test]
    async fn path_like_filenames_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = WorkspaceManager::new(root.path()).create().await.unwrap();

        assert!(ws.write_source("../escape.py", "x").await.is_err());
        assert!(ws.write_source("", "x").await.is_err());
        assert!(ws.files().is_empty());
    }

    #[tokio::test]
    async fn destroy_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = WorkspaceManager::new(root.path()).create().await.unwrap();
        ws.write_source("main.cpp", "int main() {}").await.unwrap();
        let path = ws.path().to_path_buf();

        ws.destroy().await;

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let ws = WorkspaceManager::new(root.path()).create().await.unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn destroy_tolerates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkspaceManager::new(root.path()).create().await.unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();

        ws.destroy().await;
    }
}
