//! Configuration commands.

use std::path::Path;

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// Prints the effective configuration, with literal client secrets masked.
pub fn dump(config: &AppConfig, config_path: &Path) -> CliResult<()> {
    println!("# config.toml ({})", config_path.display());
    println!("{}", render(config)?);
    Ok(())
}

fn render(config: &AppConfig) -> CliResult<String> {
    let mut shown = config.clone();
    if let Some(ref mut google) = shown.google
        && let Some(ref mut secret) = google.client_secret
        && !crate::secret::is_reference(secret)
    {
        *secret = "<redacted>".to_string();
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| CliError::config(format!("failed to serialize config: {e}")))
}

/// Checks every section the way `serve` would use it.
pub fn validate(config: &AppConfig) -> CliResult<()> {
    let server = config
        .server
        .to_server_config()
        .map_err(|e| CliError::config(format!("[server]: {e}")))?;
    server
        .origin_header()
        .map_err(|e| CliError::config(format!("[server]: {e}")))?;

    if let Some(ref google) = config.google {
        validate_google(google, config)?;
        println!("Google settings are valid.");
    }
    if let Some(ref school) = config.school {
        validate_school(school)?;
        println!("School settings are valid.");
    }
    if config.google.is_none() && config.school.is_none() {
        println!("No calendar sources configured.");
    }

    println!("Configuration is valid.");
    Ok(())
}

#[cfg(feature = "google")]
fn validate_google(google: &crate::config::GoogleSettings, config: &AppConfig) -> CliResult<()> {
    google
        .to_provider_config(config)
        .map(|_| ())
        .map_err(|e| CliError::config(format!("[google]: {e}")))
}

#[cfg(not(feature = "google"))]
fn validate_google(_google: &crate::config::GoogleSettings, _config: &AppConfig) -> CliResult<()> {
    Err(CliError::config("[google]: built without the google feature"))
}

#[cfg(feature = "school")]
fn validate_school(school: &crate::config::SchoolSettings) -> CliResult<()> {
    school
        .to_provider_config()
        .map(|_| ())
        .map_err(|e| CliError::config(format!("[school]: {e}")))
}

#[cfg(not(feature = "school"))]
fn validate_school(_school: &crate::config::SchoolSettings) -> CliResult<()> {
    Err(CliError::config("[school]: built without the school feature"))
}

/// Shows the configuration file path in use.
pub fn path(config_path: &Path) -> CliResult<()> {
    println!("config: {}", config_path.display());
    Ok(())
}
