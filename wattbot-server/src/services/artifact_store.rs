//! Artifact store
//!
//! Binary blobs (original photo, annotated photo, label data) live outside
//! the database, keyed by a generated [`ArtifactHandle`]. There is no
//! reverse index: the owning reading is the only thing that knows a handle.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wattbot_common::{ArtifactHandle, Error, Result};

/// Descriptive data kept next to each blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub display_name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Content-blob persistence
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist bytes under a fresh handle
    async fn store(&self, bytes: &[u8], display_name: &str) -> Result<ArtifactHandle>;

    /// Load bytes; `NotFound` for an unknown handle
    async fn retrieve(&self, handle: ArtifactHandle) -> Result<Vec<u8>>;

    /// Remove a blob; `NotFound` for an unknown handle
    async fn delete(&self, handle: ArtifactHandle) -> Result<()>;

    /// Display name, size and creation time of a blob
    async fn metadata(&self, handle: ArtifactHandle) -> Result<ArtifactMetadata>;
}

/// Filesystem-backed store: `<dir>/<handle>` plus a `<handle>.json` sidecar
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, handle: ArtifactHandle) -> PathBuf {
        self.dir.join(handle.to_string())
    }

    fn sidecar_path(&self, handle: ArtifactHandle) -> PathBuf {
        self.dir.join(format!("{}.json", handle))
    }

    /// Write to a hidden temp file, then rename into place
    async fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<()> {
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Internal(format!("Invalid artifact path: {}", target.display())))?;
        let tmp = self.dir.join(format!(".{}.tmp", file_name));

        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn not_found(handle: ArtifactHandle) -> impl FnOnce(std::io::Error) -> Error {
    move |e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(format!("Artifact {}", handle)),
        _ => Error::Io(e),
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store(&self, bytes: &[u8], display_name: &str) -> Result<ArtifactHandle> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let handle = ArtifactHandle::generate();
        let metadata = ArtifactMetadata {
            display_name: display_name.to_string(),
            size: bytes.len() as u64,
            created_at: Utc::now(),
        };

        // Sidecar first: a visible blob always has its metadata
        self.write_atomic(&self.sidecar_path(handle), &serde_json::to_vec(&metadata)?)
            .await?;
        self.write_atomic(&self.blob_path(handle), bytes).await?;

        debug!(handle = %handle, display_name, size = metadata.size, "Artifact stored");
        Ok(handle)
    }

    async fn retrieve(&self, handle: ArtifactHandle) -> Result<Vec<u8>> {
        tokio::fs::read(self.blob_path(handle))
            .await
            .map_err(not_found(handle))
    }

    async fn delete(&self, handle: ArtifactHandle) -> Result<()> {
        tokio::fs::remove_file(self.blob_path(handle))
            .await
            .map_err(not_found(handle))?;

        match tokio::fs::remove_file(self.sidecar_path(handle)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        debug!(handle = %handle, "Artifact deleted");
        Ok(())
    }

    async fn metadata(&self, handle: ArtifactHandle) -> Result<ArtifactMetadata> {
        // Blob existence decides; the sidecar alone is not an artifact
        tokio::fs::metadata(self.blob_path(handle))
            .await
            .map_err(not_found(handle))?;

        let raw = tokio::fs::read(self.sidecar_path(handle))
            .await
            .map_err(not_found(handle))?;
        Ok(serde_json::from_slice(&raw)?)
    }
}
