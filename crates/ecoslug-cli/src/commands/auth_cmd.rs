use crate::auth::{clear_stored_session, client_for_profile, load_stored_session};
use crate::cli::AuthCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            profile,
            refresh_token,
        } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let profile_config = config.profile(&profile_name).cloned().unwrap_or_default();
            let client = client_for_profile(&profile_name, &profile_config)
                .map_err(|error| CliError::Auth(error.to_string()))?
                .ok_or_else(|| {
                    CliError::Config(format!(
                        "Profile '{profile_name}' has no Google client id. Run `ecoslug config init --profile {profile_name} --client-id ...` first."
                    ))
                })?;

            let session = client
                .sign_in_with_refresh_token(&refresh_token)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let email_label = session.identity.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let profile_config = config.profile(&profile_name).cloned().unwrap_or_default();

            let maybe_client = client_for_profile(&profile_name, &profile_config)
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let session = if let Some(client) = maybe_client {
                client
                    .restore_session()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?
            } else {
                load_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?
            };

            if let Some(session) = session {
                let email_label = session.identity.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (expires_at={})",
                    profile_name, email_label, session.expires_at
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let profile_config = config.profile(&profile_name).cloned().unwrap_or_default();

            let maybe_client = client_for_profile(&profile_name, &profile_config)
                .map_err(|error| CliError::Auth(error.to_string()))?;
            if let Some(client) = maybe_client {
                // Load the stored session so sign-out can revoke the grant.
                client
                    .restore_session()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?;
                client
                    .sign_out()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?;
            } else {
                clear_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?;
            }

            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}
