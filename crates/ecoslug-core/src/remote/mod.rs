//! Remote file store abstraction consumed by the sync coordinator.

mod drive;

pub use drive::DriveStore;

use std::fmt;
use std::future::Future;

use thiserror::Error;

/// Opaque handle identifying one remote blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef(String);

impl FileRef {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Not signed in to a cloud account")]
    NotSignedIn,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Named-blob storage operations; transport-agnostic from the caller's side.
pub trait RemoteStore: Send + Sync {
    /// Look up the file with the given name, if it exists.
    fn find_named(
        &self,
        name: &str,
    ) -> impl Future<Output = RemoteResult<Option<FileRef>>> + Send;

    /// Download the blob contents.
    fn read(&self, file: &FileRef) -> impl Future<Output = RemoteResult<Vec<u8>>> + Send;

    /// Create a new named blob and return its handle.
    fn create(
        &self,
        name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = RemoteResult<FileRef>> + Send;

    /// Overwrite an existing blob's contents.
    fn update(
        &self,
        file: &FileRef,
        bytes: Vec<u8>,
    ) -> impl Future<Output = RemoteResult<FileRef>> + Send;
}
