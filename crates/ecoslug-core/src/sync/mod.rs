//! Cloud sync coordination: push/pull of local records against the one
//! named remote backup, with timestamp-based conflict detection.
//!
//! The coordinator owns the sync state machine (`Idle -> Pushing|Pulling ->
//! Idle`) and guarantees at most one operation in flight. It never touches
//! UI; callers surface the typed outcomes however they like.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;

use crate::auth::AuthProvider;
use crate::payload::{format_sync_marker, parse_sync_marker, SyncPayload, PAYLOAD_VERSION};
use crate::records::{LocalRecordStore, RecordError, RecordKey};
use crate::remote::{FileRef, RemoteError, RemoteStore};

/// Fixed name of the one backup blob kept per account.
pub const SYNC_FILE_NAME: &str = "ecoslug-tracker-data.json";

/// Coordinator state; at most one non-`Idle` state at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Pushing,
    Pulling,
}

/// Which direction a failed remote call belonged to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOp {
    Push,
    Pull,
}

impl fmt::Display for SyncOp {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Push => "push",
            Self::Pull => "pull",
        })
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Another sync operation is already in flight")]
    Busy,
    #[error("Cloud {op} failed: {source}")]
    Remote {
        op: SyncOp,
        #[source]
        source: RemoteError,
    },
    #[error("Invalid sync payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Local record store error: {0}")]
    LocalStore(#[from] RecordError),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq)]
pub struct PushOutcome {
    /// Remote file the payload was written to.
    pub file: FileRef,
    /// Timestamp embedded in the uploaded payload and persisted locally.
    pub synced_at: DateTime<Utc>,
}

/// Result of a pull; only `Applied` mutates local records.
#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    /// Remote payload was applied to the local store.
    Applied(SyncPayload),
    /// Local data is already at least as recent as the backup.
    UpToDate,
    /// No backup exists for this account yet.
    NoRemoteData,
    /// The user declined the confirmation prompt.
    Cancelled,
}

/// User-confirmation capability, injected so tests can stub the response.
pub trait ConfirmSync: Send + Sync {
    fn confirm(&self, message: &str) -> impl Future<Output = bool> + Send;
}

/// Orchestrates push/pull between the local record store and the remote
/// backup file, serializing all operations through its state flag.
pub struct SyncCoordinator<A, R, L, C> {
    auth: A,
    remote: R,
    records: L,
    confirm: C,
    state: Mutex<SyncState>,
}

impl<A, R, L, C> SyncCoordinator<A, R, L, C>
where
    A: AuthProvider,
    R: RemoteStore,
    L: LocalRecordStore,
    C: ConfirmSync,
{
    pub const fn new(auth: A, remote: R, records: L, confirm: C) -> Self {
        Self {
            auth,
            remote,
            records,
            confirm,
            state: Mutex::new(SyncState::Idle),
        }
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        *lock_state(&self.state)
    }

    /// Upload a fresh snapshot of the local records to the remote store.
    ///
    /// Local records are never mutated by a push; only the `lastCloudSync`
    /// marker is written, and only after the upload has been confirmed.
    pub async fn push(&self) -> SyncResult<PushOutcome> {
        if self.auth.identity().is_none() {
            return Err(SyncError::NotSignedIn);
        }
        let _guard = self.begin(SyncState::Pushing)?;

        let payload = self.build_payload()?;
        let bytes = serde_json::to_vec_pretty(&payload)?;

        let existing = self
            .remote
            .find_named(SYNC_FILE_NAME)
            .await
            .map_err(|source| SyncError::Remote {
                op: SyncOp::Push,
                source,
            })?;
        let file = match existing {
            Some(file) => self.remote.update(&file, bytes).await,
            None => self.remote.create(SYNC_FILE_NAME, bytes).await,
        }
        .map_err(|source| SyncError::Remote {
            op: SyncOp::Push,
            source,
        })?;

        self.records.set(
            RecordKey::LastCloudSync,
            &format_sync_marker(payload.last_sync),
        )?;
        tracing::info!(file = %file, "pushed local records to cloud");

        Ok(PushOutcome {
            file,
            synced_at: payload.last_sync,
        })
    }

    /// Fetch the remote backup and apply it to local records if appropriate.
    ///
    /// Without `force`, the backup is applied only when its timestamp is
    /// strictly newer than the local `lastCloudSync` marker. Either way the
    /// injected confirmation must approve before any local write; a confirmed
    /// apply lands as one atomic batch.
    pub async fn pull(&self, force: bool) -> SyncResult<PullOutcome> {
        if self.auth.identity().is_none() {
            return Err(SyncError::NotSignedIn);
        }
        let _guard = self.begin(SyncState::Pulling)?;

        let found = self
            .remote
            .find_named(SYNC_FILE_NAME)
            .await
            .map_err(|source| SyncError::Remote {
                op: SyncOp::Pull,
                source,
            })?;
        let Some(file) = found else {
            tracing::info!("no cloud backup found");
            return Ok(PullOutcome::NoRemoteData);
        };

        let bytes = self
            .remote
            .read(&file)
            .await
            .map_err(|source| SyncError::Remote {
                op: SyncOp::Pull,
                source,
            })?;
        let payload: SyncPayload = serde_json::from_slice(&bytes)?;

        let local_marker = self.records.get(RecordKey::LastCloudSync)?;
        let local_sync_time = parse_sync_marker(local_marker.as_deref());
        if !force && payload.last_sync <= local_sync_time {
            return Ok(PullOutcome::UpToDate);
        }

        let message = if force {
            format!(
                "Found cloud backup from {}. Restore it? This will replace all current local data.",
                format_sync_marker(payload.last_sync)
            )
        } else {
            "Cloud data is more recent than local data. Replace your local data with the cloud copy?".to_string()
        };
        if !self.confirm.confirm(&message).await {
            return Ok(PullOutcome::Cancelled);
        }

        let mut batch = payload.to_record_batch()?;
        batch.push((
            RecordKey::LastCloudSync,
            format_sync_marker(payload.last_sync),
        ));
        self.records.set_batch(&batch)?;
        tracing::info!(last_sync = %payload.last_sync, "restored records from cloud backup");

        Ok(PullOutcome::Applied(payload))
    }

    /// Snapshot the current records into a payload stamped with `now()`.
    fn build_payload(&self) -> SyncResult<SyncPayload> {
        Ok(SyncPayload {
            settings: self.parse_record(RecordKey::Settings)?,
            log_data: self.parse_record(RecordKey::Log)?,
            pest_count_data: self.parse_record(RecordKey::PestCount)?,
            last_application: self.records.get(RecordKey::LastApplication)?,
            // Millisecond precision, matching the stored marker format.
            last_sync: Utc::now().trunc_subsecs(3),
            version: PAYLOAD_VERSION.to_string(),
        })
    }

    fn parse_record(&self, key: RecordKey) -> SyncResult<Option<serde_json::Value>> {
        let Some(raw) = self.records.get(key)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn begin(&self, next: SyncState) -> SyncResult<StateGuard<'_>> {
        let mut state = lock_state(&self.state);
        if *state != SyncState::Idle {
            return Err(SyncError::Busy);
        }
        *state = next;
        Ok(StateGuard { state: &self.state })
    }
}

fn lock_state(state: &Mutex<SyncState>) -> MutexGuard<'_, SyncState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Restores `Idle` on every exit path, success or failure.
struct StateGuard<'a> {
    state: &'a Mutex<SyncState>,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *lock_state(self.state) = SyncState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::Notify;

    use crate::auth::{Identity, StateListener};
    use crate::records::{MemoryRecordStore, RecordResult};
    use crate::remote::RemoteResult;

    use super::*;

    #[derive(Clone)]
    struct StaticAuth {
        identity: Option<Identity>,
    }

    impl StaticAuth {
        fn signed_in() -> Self {
            Self {
                identity: Some(Identity {
                    id: "user-1".to_string(),
                    name: Some("Slug Gardener".to_string()),
                    email: None,
                    picture: None,
                }),
            }
        }

        const fn signed_out() -> Self {
            Self { identity: None }
        }
    }

    impl AuthProvider for StaticAuth {
        fn identity(&self) -> Option<Identity> {
            self.identity.clone()
        }

        fn access_token(&self) -> Option<String> {
            self.identity.as_ref().map(|_| "token".to_string())
        }

        fn on_state_change(&self, _listener: StateListener) {}
    }

    #[derive(Clone, Default)]
    struct FakeRemote {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        creates: Arc<AtomicUsize>,
        updates: Arc<AtomicUsize>,
        fail_writes: bool,
        read_gate: Option<Arc<Notify>>,
    }

    impl FakeRemote {
        fn seed(&self, name: &str, bytes: &[u8]) {
            self.files
                .lock()
                .unwrap()
                .insert(name.to_string(), bytes.to_vec());
        }

        fn stored(&self, name: &str) -> Option<Vec<u8>> {
            self.files.lock().unwrap().get(name).cloned()
        }
    }

    impl RemoteStore for FakeRemote {
        async fn find_named(&self, name: &str) -> RemoteResult<Option<FileRef>> {
            let files = self.files.lock().unwrap();
            Ok(files.contains_key(name).then(|| FileRef::new(name)))
        }

        async fn read(&self, file: &FileRef) -> RemoteResult<Vec<u8>> {
            if let Some(gate) = &self.read_gate {
                gate.notified().await;
            }
            let files = self.files.lock().unwrap();
            files
                .get(file.id())
                .cloned()
                .ok_or_else(|| RemoteError::Api("File not found (404)".to_string()))
        }

        async fn create(&self, name: &str, bytes: Vec<u8>) -> RemoteResult<FileRef> {
            if self.fail_writes {
                return Err(RemoteError::Api("Insufficient storage (507)".to_string()));
            }
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.files.lock().unwrap().insert(name.to_string(), bytes);
            Ok(FileRef::new(name))
        }

        async fn update(&self, file: &FileRef, bytes: Vec<u8>) -> RemoteResult<FileRef> {
            if self.fail_writes {
                return Err(RemoteError::Api("Insufficient storage (507)".to_string()));
            }
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.files
                .lock()
                .unwrap()
                .insert(file.id().to_string(), bytes);
            Ok(file.clone())
        }
    }

    /// Record store whose batch apply always fails mid-sync.
    #[derive(Clone, Default)]
    struct FailingBatchStore {
        inner: MemoryRecordStore,
    }

    impl LocalRecordStore for FailingBatchStore {
        fn get(&self, key: RecordKey) -> RecordResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: RecordKey, value: &str) -> RecordResult<()> {
            self.inner.set(key, value)
        }

        fn set_batch(&self, _entries: &[(RecordKey, String)]) -> RecordResult<()> {
            Err(RecordError::Io(std::io::Error::other("disk full")))
        }
    }

    #[derive(Clone)]
    struct StubConfirm {
        answer: bool,
        calls: Arc<AtomicUsize>,
    }

    impl StubConfirm {
        fn answering(answer: bool) -> Self {
            Self {
                answer,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ConfirmSync for StubConfirm {
        async fn confirm(&self, _message: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    type TestCoordinator = SyncCoordinator<StaticAuth, FakeRemote, MemoryRecordStore, StubConfirm>;

    fn coordinator(
        auth: StaticAuth,
        remote: FakeRemote,
        records: MemoryRecordStore,
        confirm: StubConfirm,
    ) -> TestCoordinator {
        SyncCoordinator::new(auth, remote, records, confirm)
    }

    fn seed_local_records(records: &MemoryRecordStore) {
        records
            .set_batch(&[
                (RecordKey::Settings, r#"{"unit":"cm"}"#.to_string()),
                (RecordKey::Log, r#"[{"date":"2024-05-01"}]"#.to_string()),
                (RecordKey::PestCount, r#"{"2024-05-01":3}"#.to_string()),
                (RecordKey::LastApplication, "2024-05-01T08:00:00Z".to_string()),
            ])
            .unwrap();
    }

    fn remote_payload_bytes(last_sync: &str, settings: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "settings": settings,
            "lastSync": last_sync,
            "version": "1.0",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn push_without_identity_is_rejected() {
        let sync = coordinator(
            StaticAuth::signed_out(),
            FakeRemote::default(),
            MemoryRecordStore::new(),
            StubConfirm::answering(true),
        );
        assert!(matches!(sync.push().await, Err(SyncError::NotSignedIn)));
        assert!(matches!(
            sync.pull(false).await,
            Err(SyncError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn first_push_creates_then_second_updates() {
        let remote = FakeRemote::default();
        let records = MemoryRecordStore::new();
        seed_local_records(&records);
        let sync = coordinator(
            StaticAuth::signed_in(),
            remote.clone(),
            records.clone(),
            StubConfirm::answering(true),
        );

        let first = sync.push().await.unwrap();
        assert_eq!(first.file, FileRef::new(SYNC_FILE_NAME));
        assert_eq!(remote.creates.load(Ordering::SeqCst), 1);
        assert_eq!(remote.updates.load(Ordering::SeqCst), 0);

        sync.push().await.unwrap();
        assert_eq!(remote.creates.load(Ordering::SeqCst), 1);
        assert_eq!(remote.updates.load(Ordering::SeqCst), 1);

        // The uploaded blob carries the local records verbatim.
        let uploaded: SyncPayload =
            serde_json::from_slice(&remote.stored(SYNC_FILE_NAME).unwrap()).unwrap();
        assert_eq!(uploaded.settings, Some(json!({"unit": "cm"})));
        assert_eq!(uploaded.version, PAYLOAD_VERSION);
    }

    #[tokio::test]
    async fn push_persists_sync_marker_matching_payload() {
        let records = MemoryRecordStore::new();
        seed_local_records(&records);
        let sync = coordinator(
            StaticAuth::signed_in(),
            FakeRemote::default(),
            records.clone(),
            StubConfirm::answering(true),
        );

        let outcome = sync.push().await.unwrap();
        let marker = records.get(RecordKey::LastCloudSync).unwrap().unwrap();
        assert_eq!(parse_sync_marker(Some(&marker)), outcome.synced_at);
    }

    #[tokio::test]
    async fn failed_push_leaves_local_records_untouched() {
        let remote = FakeRemote {
            fail_writes: true,
            ..FakeRemote::default()
        };
        let records = MemoryRecordStore::new();
        seed_local_records(&records);
        let sync = coordinator(
            StaticAuth::signed_in(),
            remote,
            records.clone(),
            StubConfirm::answering(true),
        );

        let error = sync.push().await.unwrap_err();
        assert!(matches!(
            error,
            SyncError::Remote {
                op: SyncOp::Push,
                ..
            }
        ));
        assert_eq!(records.get(RecordKey::LastCloudSync).unwrap(), None);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn pull_after_push_reports_up_to_date() {
        let remote = FakeRemote::default();
        let records = MemoryRecordStore::new();
        seed_local_records(&records);
        let confirm = StubConfirm::answering(true);
        let sync = coordinator(
            StaticAuth::signed_in(),
            remote,
            records,
            confirm.clone(),
        );

        sync.push().await.unwrap();
        let outcome = sync.pull(false).await.unwrap();

        assert_eq!(outcome, PullOutcome::UpToDate);
        assert_eq!(confirm.call_count(), 0);
    }

    #[tokio::test]
    async fn pull_round_trips_pushed_records() {
        let remote = FakeRemote::default();
        let records = MemoryRecordStore::new();
        seed_local_records(&records);
        let sync = coordinator(
            StaticAuth::signed_in(),
            remote.clone(),
            records.clone(),
            StubConfirm::answering(true),
        );
        sync.push().await.unwrap();

        // Fresh device: same account, empty local store.
        let restored_records = MemoryRecordStore::new();
        let restore = coordinator(
            StaticAuth::signed_in(),
            remote,
            restored_records.clone(),
            StubConfirm::answering(true),
        );
        let outcome = restore.pull(false).await.unwrap();

        assert!(matches!(outcome, PullOutcome::Applied(_)));
        for key in [
            RecordKey::Settings,
            RecordKey::Log,
            RecordKey::PestCount,
            RecordKey::LastApplication,
        ] {
            assert_eq!(
                restored_records.get(key).unwrap(),
                records.get(key).unwrap(),
                "record {key:?} should survive the round trip"
            );
        }
    }

    #[tokio::test]
    async fn pull_without_remote_file_reports_no_data() {
        let sync = coordinator(
            StaticAuth::signed_in(),
            FakeRemote::default(),
            MemoryRecordStore::new(),
            StubConfirm::answering(true),
        );
        assert_eq!(sync.pull(false).await.unwrap(), PullOutcome::NoRemoteData);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn newer_remote_backup_is_applied() {
        let remote = FakeRemote::default();
        remote.seed(
            SYNC_FILE_NAME,
            &remote_payload_bytes("2024-01-02T00:00:00Z", json!({"unit": "cm"})),
        );
        let records = MemoryRecordStore::new();
        records
            .set(RecordKey::LastCloudSync, "2024-01-01T00:00:00Z")
            .unwrap();
        let sync = coordinator(
            StaticAuth::signed_in(),
            remote,
            records.clone(),
            StubConfirm::answering(true),
        );

        let outcome = sync.pull(false).await.unwrap();

        assert!(matches!(outcome, PullOutcome::Applied(_)));
        assert_eq!(
            records.get(RecordKey::Settings).unwrap().as_deref(),
            Some(r#"{"unit":"cm"}"#)
        );
        assert_eq!(
            records.get(RecordKey::LastCloudSync).unwrap().as_deref(),
            Some("2024-01-02T00:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn older_remote_backup_is_skipped_unless_forced() {
        let remote = FakeRemote::default();
        remote.seed(
            SYNC_FILE_NAME,
            &remote_payload_bytes("2024-01-01T00:00:00Z", json!({"unit": "in"})),
        );
        let records = MemoryRecordStore::new();
        records
            .set(RecordKey::LastCloudSync, "2024-01-02T00:00:00Z")
            .unwrap();
        let confirm = StubConfirm::answering(true);
        let sync = coordinator(
            StaticAuth::signed_in(),
            remote,
            records.clone(),
            confirm.clone(),
        );

        assert_eq!(sync.pull(false).await.unwrap(), PullOutcome::UpToDate);
        assert_eq!(confirm.call_count(), 0);
        assert_eq!(records.get(RecordKey::Settings).unwrap(), None);

        // Forcing re-opens the prompt even for an older backup.
        let outcome = sync.pull(true).await.unwrap();
        assert!(matches!(outcome, PullOutcome::Applied(_)));
        assert_eq!(confirm.call_count(), 1);
    }

    #[tokio::test]
    async fn equal_timestamps_count_as_up_to_date() {
        let remote = FakeRemote::default();
        remote.seed(
            SYNC_FILE_NAME,
            &remote_payload_bytes("2024-01-02T00:00:00Z", json!({})),
        );
        let records = MemoryRecordStore::new();
        records
            .set(RecordKey::LastCloudSync, "2024-01-02T00:00:00Z")
            .unwrap();
        let sync = coordinator(
            StaticAuth::signed_in(),
            remote,
            records,
            StubConfirm::answering(true),
        );

        assert_eq!(sync.pull(false).await.unwrap(), PullOutcome::UpToDate);
    }

    #[tokio::test]
    async fn declined_confirmation_cancels_without_writes() {
        let remote = FakeRemote::default();
        remote.seed(
            SYNC_FILE_NAME,
            &remote_payload_bytes("2024-01-02T00:00:00Z", json!({"unit": "cm"})),
        );
        let records = MemoryRecordStore::new();
        let confirm = StubConfirm::answering(false);
        let sync = coordinator(
            StaticAuth::signed_in(),
            remote,
            records.clone(),
            confirm.clone(),
        );

        assert_eq!(sync.pull(false).await.unwrap(), PullOutcome::Cancelled);
        assert_eq!(confirm.call_count(), 1);
        assert_eq!(records.get(RecordKey::Settings).unwrap(), None);
        assert_eq!(records.get(RecordKey::LastCloudSync).unwrap(), None);
    }

    #[tokio::test]
    async fn partial_payload_preserves_missing_fields() {
        let remote = FakeRemote::default();
        // Backup carries settings but no pestCountData.
        remote.seed(
            SYNC_FILE_NAME,
            &remote_payload_bytes("2024-01-02T00:00:00Z", json!({"unit": "cm"})),
        );
        let records = MemoryRecordStore::new();
        records
            .set(RecordKey::PestCount, r#"{"2024-05-01":3}"#)
            .unwrap();
        let sync = coordinator(
            StaticAuth::signed_in(),
            remote,
            records.clone(),
            StubConfirm::answering(true),
        );

        let outcome = sync.pull(false).await.unwrap();

        assert!(matches!(outcome, PullOutcome::Applied(_)));
        assert_eq!(
            records.get(RecordKey::PestCount).unwrap().as_deref(),
            Some(r#"{"2024-05-01":3}"#)
        );
        assert_eq!(
            records.get(RecordKey::Settings).unwrap().as_deref(),
            Some(r#"{"unit":"cm"}"#)
        );
    }

    #[tokio::test]
    async fn failed_batch_apply_surfaces_local_store_error() {
        let remote = FakeRemote::default();
        remote.seed(
            SYNC_FILE_NAME,
            &remote_payload_bytes("2024-01-02T00:00:00Z", json!({"unit": "cm"})),
        );
        let records = FailingBatchStore::default();
        records
            .set(RecordKey::PestCount, r#"{"2024-05-01":3}"#)
            .unwrap();
        let confirm = StubConfirm::answering(true);
        let sync = SyncCoordinator::new(
            StaticAuth::signed_in(),
            remote,
            records.clone(),
            confirm.clone(),
        );

        let error = sync.pull(false).await.unwrap_err();

        assert!(matches!(error, SyncError::LocalStore(_)));
        assert_eq!(confirm.call_count(), 1);
        // The failed apply leaves every pre-existing record and the sync
        // marker untouched.
        assert_eq!(
            records.get(RecordKey::PestCount).unwrap().as_deref(),
            Some(r#"{"2024-05-01":3}"#)
        );
        assert_eq!(records.get(RecordKey::Settings).unwrap(), None);
        assert_eq!(records.get(RecordKey::LastCloudSync).unwrap(), None);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn corrupt_remote_payload_surfaces_as_payload_error() {
        let remote = FakeRemote::default();
        remote.seed(SYNC_FILE_NAME, b"not json");
        let records = MemoryRecordStore::new();
        let sync = coordinator(
            StaticAuth::signed_in(),
            remote,
            records.clone(),
            StubConfirm::answering(true),
        );

        assert!(matches!(
            sync.pull(false).await,
            Err(SyncError::Payload(_))
        ));
        assert_eq!(records.get(RecordKey::LastCloudSync).unwrap(), None);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn push_while_pull_in_flight_returns_busy() {
        let gate = Arc::new(Notify::new());
        let remote = FakeRemote {
            read_gate: Some(Arc::clone(&gate)),
            ..FakeRemote::default()
        };
        remote.seed(
            SYNC_FILE_NAME,
            &remote_payload_bytes("2024-01-02T00:00:00Z", json!({"unit": "cm"})),
        );
        let sync = Arc::new(coordinator(
            StaticAuth::signed_in(),
            remote,
            MemoryRecordStore::new(),
            StubConfirm::answering(true),
        ));

        let in_flight = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.pull(false).await }
        });
        while sync.state() != SyncState::Pulling {
            tokio::task::yield_now().await;
        }

        assert!(matches!(sync.push().await, Err(SyncError::Busy)));
        assert!(matches!(sync.pull(false).await, Err(SyncError::Busy)));

        // The in-flight pull is unaffected and completes normally.
        gate.notify_one();
        let outcome = in_flight.await.unwrap().unwrap();
        assert!(matches!(outcome, PullOutcome::Applied(_)));
        assert_eq!(sync.state(), SyncState::Idle);
    }
}
