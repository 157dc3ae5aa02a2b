//! Cloud sync payload model and wire format.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::RecordKey;

/// Schema version written into every uploaded payload.
pub const PAYLOAD_VERSION: &str = "1.0";

/// Snapshot of all locally-tracked records uploaded as one cloud blob.
///
/// `last_sync` and `version` are always present; the record fields are
/// optional on read, and an absent field is skipped during apply instead of
/// erasing existing local data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pest_count_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_application: Option<String>,
    pub last_sync: DateTime<Utc>,
    pub version: String,
}

impl SyncPayload {
    /// Records carried by this payload as a store write batch.
    ///
    /// Only fields present in the payload are included; the `lastCloudSync`
    /// marker is appended by the coordinator after this batch is built.
    pub fn to_record_batch(&self) -> serde_json::Result<Vec<(RecordKey, String)>> {
        let mut batch = Vec::new();
        if let Some(settings) = &self.settings {
            batch.push((RecordKey::Settings, serde_json::to_string(settings)?));
        }
        if let Some(log_data) = &self.log_data {
            batch.push((RecordKey::Log, serde_json::to_string(log_data)?));
        }
        if let Some(pest_count_data) = &self.pest_count_data {
            batch.push((RecordKey::PestCount, serde_json::to_string(pest_count_data)?));
        }
        if let Some(last_application) = &self.last_application {
            batch.push((RecordKey::LastApplication, last_application.clone()));
        }
        Ok(batch)
    }
}

/// Format a sync timestamp the way it is stored in the `lastCloudSync` record.
#[must_use]
pub fn format_sync_marker(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored `lastCloudSync` marker.
///
/// A missing or unparseable marker means the device has never synced and is
/// treated as the Unix epoch, so any remote backup counts as newer.
#[must_use]
pub fn parse_sync_marker(marker: Option<&str>) -> DateTime<Utc> {
    marker
        .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |parsed| {
            parsed.with_timezone(&Utc)
        })
}
