pub mod auth_cmd;
pub mod completions;
pub mod config;
pub mod sync_cmd;
