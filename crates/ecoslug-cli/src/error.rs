use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] ecoslug_core::sync::SyncError),
    #[error(transparent)]
    Records(#[from] ecoslug_core::records::RecordError),
    #[error("Remote store error: {0}")]
    Remote(#[from] ecoslug_core::remote::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Not signed in. Run `ecoslug config init --client-id ...` and `ecoslug auth login` first."
    )]
    NotSignedIn,
}
