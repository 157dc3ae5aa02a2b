//! Push/pull/status commands built on the core sync coordinator.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use ecoslug_core::auth::AuthProvider;
use ecoslug_core::payload::format_sync_marker;
use ecoslug_core::records::{JsonFileRecordStore, LocalRecordStore, RecordKey};
use ecoslug_core::remote::DriveStore;
use ecoslug_core::sync::{ConfirmSync, PullOutcome, SyncCoordinator};

use crate::auth::{client_for_profile, CliAuthClient};
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

type CliCoordinator =
    SyncCoordinator<CliAuthClient, DriveStore<CliAuthClient>, JsonFileRecordStore, CliConfirm>;

/// Terminal-backed confirmation; `--yes` answers without prompting.
pub struct CliConfirm {
    assume_yes: bool,
}

impl CliConfirm {
    #[must_use]
    pub const fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ConfirmSync for CliConfirm {
    async fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            println!("{message} (confirmed by --yes)");
            return true;
        }
        if !io::stdin().is_terminal() {
            eprintln!("{message}");
            eprintln!("Refusing to restore without a terminal; pass --yes to confirm.");
            return false;
        }

        let message = message.to_string();
        tokio::task::spawn_blocking(move || prompt_yes_no(&message))
            .await
            .unwrap_or(false)
    }
}

fn prompt_yes_no(message: &str) -> bool {
    print!("{message} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    parse_confirmation(&answer)
}

fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub async fn run_push(global_profile: Option<&str>) -> Result<(), CliError> {
    let coordinator = open_coordinator(global_profile, CliConfirm::new(true)).await?;
    let outcome = coordinator.push().await?;
    println!(
        "Backed up local records to the cloud (file {}, synced at {})",
        outcome.file,
        format_sync_marker(outcome.synced_at)
    );
    Ok(())
}

pub async fn run_pull(
    force: bool,
    assume_yes: bool,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let coordinator = open_coordinator(global_profile, CliConfirm::new(assume_yes)).await?;
    match coordinator.pull(force).await? {
        PullOutcome::Applied(payload) => {
            println!(
                "Restored records from cloud backup dated {}",
                format_sync_marker(payload.last_sync)
            );
        }
        PullOutcome::UpToDate => println!("Local data is up to date with the cloud backup."),
        PullOutcome::NoRemoteData => {
            println!("No cloud backup found. Run `ecoslug push` to create one.");
        }
        PullOutcome::Cancelled => println!("Cloud restore cancelled."),
    }
    Ok(())
}

pub async fn run_status(global_profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let maybe_client = client_for_profile(&profile_name, &profile)
        .map_err(|error| CliError::Auth(error.to_string()))?;
    let identity = if let Some(client) = maybe_client {
        client
            .restore_session()
            .await
            .map_err(|error| CliError::Auth(error.to_string()))?
            .map(|session| session.identity)
    } else {
        None
    };

    match identity {
        Some(identity) => {
            let label = identity
                .email
                .or(identity.name)
                .unwrap_or_else(|| identity.id.clone());
            println!("Profile '{profile_name}' is signed in as {label}");
        }
        None => println!("Profile '{profile_name}' is not signed in."),
    }

    let records = open_records(&profile)?;
    let last_sync = records.get(RecordKey::LastCloudSync)?;
    println!(
        "Last cloud sync: {}",
        last_sync.as_deref().unwrap_or("never")
    );
    println!("Records file: {}", records.path().display());
    Ok(())
}

async fn open_coordinator(
    global_profile: Option<&str>,
    confirm: CliConfirm,
) -> Result<CliCoordinator, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let client = client_for_profile(&profile_name, &profile)
        .map_err(|error| CliError::Auth(error.to_string()))?
        .ok_or(CliError::NotSignedIn)?;
    client
        .restore_session()
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?;
    if client.identity().is_none() {
        return Err(CliError::NotSignedIn);
    }

    let records = open_records(&profile)?;
    tracing::debug!(
        profile = %profile_name,
        records = %records.path().display(),
        "sync context ready"
    );
    let remote = DriveStore::new(client.clone())?;
    Ok(SyncCoordinator::new(client, remote, records, confirm))
}

fn open_records(profile: &CliProfile) -> Result<JsonFileRecordStore, CliError> {
    let path = resolve_records_path(profile)?;
    Ok(JsonFileRecordStore::new(path))
}

fn resolve_records_path(profile: &CliProfile) -> Result<PathBuf, CliError> {
    if let Ok(path) = std::env::var("ECOSLUG_RECORDS_PATH") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    if let Some(path) = profile.records_path() {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::data_dir()
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))?;
    Ok(base.join("ecoslug").join("records.json"))
}
