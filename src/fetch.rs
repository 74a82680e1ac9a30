//! Trajectory file retrieval.
//!
//! The device only needs raw bytes for `(path, segment)`; where they come from
//! is behind [`TrajectoryFetcher`].

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Result, RigError};

#[async_trait]
pub trait TrajectoryFetcher: Send + Sync {
    async fn fetch(&self, path: &str, segment: &str) -> Result<Vec<u8>>;
}

/// Serves trajectory files from a local directory tree.
///
/// `fetch("runs/2024", "seg1")` reads `<root>/runs/2024/seg1`, falling back to
/// `<root>/runs/2024/seg1.json`.
#[derive(Clone, Debug)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str, segment: &str) -> Result<PathBuf> {
        let relative = Path::new(path).join(segment);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || segment.is_empty() {
            return Err(RigError::Fetch(format!(
                "refusing path {:?}",
                relative.display().to_string()
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl TrajectoryFetcher for DirectoryFetcher {
    async fn fetch(&self, path: &str, segment: &str) -> Result<Vec<u8>> {
        let file = self.resolve(path, segment)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut with_ext = file.into_os_string();
                with_ext.push(".json");
                let with_ext = PathBuf::from(with_ext);
                tokio::fs::read(&with_ext)
                    .await
                    .map_err(|e| RigError::Fetch(format!("{}: {}", with_ext.display(), e)))
            }
            Err(e) => Err(RigError::Fetch(format!("{}: {}", file.display(), e))),
        }
    }
}
