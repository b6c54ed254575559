//! crates/docchat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the JSON file, the local filesystem and the AI provider.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::assembler::CompletionRequest;
use crate::completion::CompletionError;
use crate::domain::Store;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., filesystem, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Download failed: {0}")]
    DownloadFailed(String),
    #[error("Failed to read file: {0}")]
    ReadFailed(String),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A mutation applied to the whole store inside a read-modify-write cycle.
pub type StoreMutation<'a> = Box<dyn FnOnce(&mut Store) -> PortResult<()> + Send + 'a>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Read-modify-write access to the persisted `{users, documents, settings}` blob.
///
/// There is no isolation between separate `update` calls made from different
/// processes: the last writer wins.
#[async_trait]
pub trait StoreService: Send + Sync {
    /// Returns the full store. A missing or unreadable backing file yields the
    /// seeded defaults instead of an error.
    async fn read(&self) -> Store;

    /// Replaces the persisted store wholesale.
    async fn write(&self, store: Store) -> PortResult<()>;

    /// `write(mutation(read()))`. Nothing is written if the mutation fails.
    async fn update(&self, mutation: StoreMutation<'_>) -> PortResult<()>;
}

/// Runs `f` inside [`StoreService::update`] and hands back whatever it produced.
pub async fn update_with<T, F>(store: &dyn StoreService, f: F) -> PortResult<T>
where
    T: Send,
    F: FnOnce(&mut Store) -> PortResult<T> + Send,
{
    let mut output = None;
    store
        .update(Box::new(|state: &mut Store| {
            output = Some(f(state)?);
            Ok(())
        }))
        .await?;
    output.ok_or_else(|| PortError::Unexpected("store update produced no result".to_string()))
}

/// The scratch directory holding downloaded document copies.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Maps a client-supplied relative name onto the scratch directory.
    /// Only the final path component is kept.
    fn resolve(&self, relative_name: &str) -> PortResult<PathBuf>;

    /// Creates the scratch directory if it is missing. Idempotent.
    async fn ensure_scratch_dir(&self) -> PortResult<PathBuf>;

    /// Fetches `source_url` and writes the full body to `destination_name`
    /// inside the scratch directory, overwriting any previous copy.
    async fn download(&self, source_url: &str, destination_name: &str) -> PortResult<PathBuf>;

    async fn exists(&self, path: &Path) -> bool;

    /// Best-effort removal. Failures are logged, never returned.
    async fn delete(&self, path: &Path);

    /// Reads the file and returns its contents as standard base64.
    async fn read_as_encoded_bytes(&self, path: &Path) -> PortResult<String>;
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Sends one completion request and returns the concatenated reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}
