use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ecoslug")]
#[command(about = "Track garden pests and back up your data to Google Drive")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for Google OAuth configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload local records to the cloud backup
    Push,
    /// Restore local records from the cloud backup
    Pull {
        /// Offer to restore even when the backup is not newer than local data
        #[arg(long)]
        force: bool,
        /// Answer the restore confirmation with yes (for scripting)
        #[arg(long)]
        yes: bool,
    },
    /// Show sign-in state and last cloud sync
    Status,
    /// Authenticate with Google
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with an OAuth refresh token and store the session in the keychain
    Login {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Refresh token minted by a Google OAuth consent flow
        #[arg(long, value_name = "TOKEN")]
        refresh_token: String,
    },
    /// Show auth status for profile
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Sign out and revoke the stored session
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Google OAuth client id
        #[arg(long, value_name = "ID")]
        client_id: Option<String>,
        /// Google OAuth client secret (installed-app clients)
        #[arg(long, value_name = "SECRET")]
        client_secret: Option<String>,
        /// Override path of the local records file
        #[arg(long, value_name = "PATH")]
        records_path: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}
