//! Filesystem [`ManifestByteReader`].
//!
//! Manifest paths stored on records are relative to a configured root.
//! Absolute paths, `..` components and symlinks leading outside the root
//! never resolve; the verifier then falls back to the stored hash and says
//! so in the evidence trail.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::SourceError;
use crate::sources::ManifestByteReader;

#[derive(Debug, Clone)]
pub struct FsManifestReader {
    root: PathBuf,
}

impl FsManifestReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `path` onto the root, refusing anything that could escape it.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let rel = Path::new(path.trim());
        if rel.as_os_str().is_empty() || rel.is_absolute() {
            return None;
        }
        let contained = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        contained.then(|| self.root.join(rel))
    }
}

#[async_trait]
impl ManifestByteReader for FsManifestReader {
    async fn read_all_bytes(&self, path: &str) -> Result<Option<Vec<u8>>, SourceError> {
        let Some(full) = self.resolve(path) else {
            tracing::warn!(path, "manifest path rejected: not relative to the manifest root");
            return Ok(None);
        };
        let contained = match (
            tokio::fs::canonicalize(&self.root).await,
            tokio::fs::canonicalize(&full).await,
        ) {
            (Ok(root), Ok(real)) => real.starts_with(&root).then_some(real),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(path = %full.display(), error = %e, "manifest file unreadable");
                return Ok(None);
            }
        };
        let Some(real) = contained else {
            tracing::warn!(path, "manifest path rejected: resolves outside the manifest root");
            return Ok(None);
        };
        match tokio::fs::read(&real).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) => {
                tracing::warn!(path = %full.display(), error = %e, "manifest file unreadable");
                Ok(None)
            }
        }
    }
}
