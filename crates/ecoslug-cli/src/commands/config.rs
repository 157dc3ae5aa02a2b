use std::env;

use ecoslug_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            client_id,
            client_secret,
            records_path,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            client_id,
            client_secret,
            records_path,
            no_activate,
        ),
    }
}

fn run_config_init(
    profile_name: Option<&str>,
    client_id: Option<String>,
    client_secret: Option<String>,
    records_path: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged_client_id = normalize_text_option(client_id)
        .or_else(|| normalize_text_option(env::var("GOOGLE_CLIENT_ID").ok()))
        .or_else(|| existing_profile.client_id());
    let merged_client_secret = normalize_text_option(client_secret)
        .or_else(|| normalize_text_option(env::var("GOOGLE_CLIENT_SECRET").ok()))
        .or_else(|| existing_profile.client_secret());
    let merged_records_path =
        normalize_text_option(records_path).or_else(|| existing_profile.records_path());

    if merged_client_id.is_none() {
        return Err(CliError::Config(
            "A Google OAuth client id is required. Pass --client-id or set GOOGLE_CLIENT_ID."
                .to_string(),
        ));
    }

    let profile = config.profile_mut_or_default(&profile_name);
    profile.google_client_id = merged_client_id;
    profile.google_client_secret = merged_client_secret;
    profile.records_path = merged_records_path;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Saved profile '{profile_name}' to {}", path.display());
    if !no_activate {
        println!("Profile '{profile_name}' is now active");
    }
    Ok(())
}
