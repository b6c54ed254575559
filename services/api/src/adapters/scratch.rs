//! services/api/src/adapters/scratch.rs
//!
//! This module contains the scratch-directory adapter, which implements the
//! `ArtifactStore` port. It downloads documents over HTTP into a process-wide
//! directory and hands their bytes back as base64.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use docchat_core::ports::{ArtifactStore, PortError, PortResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// An adapter that implements `ArtifactStore` on the local filesystem.
#[derive(Clone)]
pub struct ScratchDir {
    root: PathBuf,
    client: reqwest::Client,
}

impl ScratchDir {
    /// Creates a new `ScratchDir`. Nothing is created on disk until needed.
    pub fn new(root: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            root: root.into(),
            client,
        }
    }

    /// A per-download sibling of `destination`, so concurrent downloads of
    /// the same document never share a half-written file.
    fn staging_path(&self, destination: &Path) -> PathBuf {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.root
            .join(format!(".{}.{}.part", name, Uuid::now_v7().simple()))
    }
}

async fn write_then_rename(staging: &Path, destination: &Path, body: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(staging, body).await?;
    tokio::fs::rename(staging, destination).await
}

#[async_trait]
impl ArtifactStore for ScratchDir {
    fn resolve(&self, relative_name: &str) -> PortResult<PathBuf> {
        let name = Path::new(relative_name)
            .file_name()
            .ok_or_else(|| PortError::Validation(format!("'{}' is not a file name", relative_name)))?;
        Ok(self.root.join(name))
    }

    async fn ensure_scratch_dir(&self) -> PortResult<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            PortError::Unexpected(format!(
                "Failed to create scratch directory {}: {}",
                self.root.display(),
                e
            ))
        })?;
        Ok(self.root.clone())
    }

    async fn download(&self, source_url: &str, destination_name: &str) -> PortResult<PathBuf> {
        let destination = self.resolve(destination_name)?;
        self.ensure_scratch_dir().await?;

        info!(url = %source_url, path = %destination.display(), "Downloading document");
        let response = self
            .client
            .get(source_url)
            .send()
            .await
            .map_err(|e| PortError::DownloadFailed(format!("{} ({})", e, source_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::DownloadFailed(format!(
                "{} from {}",
                status, source_url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PortError::DownloadFailed(format!("{} ({})", e, source_url)))?;
        // Readers only ever see complete files: write aside, then rename into place.
        let staging = self.staging_path(&destination);
        if let Err(e) = write_then_rename(&staging, &destination, &body).await {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                debug!(path = %staging.display(), "No staging file to clean up: {}", cleanup);
            }
            return Err(PortError::DownloadFailed(format!(
                "cannot write {}: {}",
                destination.display(),
                e
            )));
        }

        info!(bytes = body.len(), path = %destination.display(), "Document downloaded");
        Ok(destination)
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn delete(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Deleted scratch file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Scratch file already gone")
            }
            Err(e) => warn!(path = %path.display(), "Failed to delete scratch file: {}", e),
        }
    }

    async fn read_as_encoded_bytes(&self, path: &Path) -> PortResult<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            PortError::ReadFailed(format!("{}: {}", name, e))
        })?;
        Ok(STANDARD.encode(bytes))
    }
}
