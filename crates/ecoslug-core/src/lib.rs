//! ecoslug-core - Core library for EcoSlug Tracker
//!
//! This crate contains the local record store, the Google auth/Drive
//! clients, and the cloud sync coordinator shared by all EcoSlug interfaces.

pub mod auth;
pub mod payload;
pub mod records;
pub mod remote;
pub mod sync;
pub mod util;

pub use payload::{SyncPayload, PAYLOAD_VERSION};
pub use records::{LocalRecordStore, RecordKey};
pub use sync::{PullOutcome, PushOutcome, SyncCoordinator, SyncState, SYNC_FILE_NAME};
