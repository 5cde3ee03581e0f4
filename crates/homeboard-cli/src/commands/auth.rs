//! Authentication commands.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{AppConfig, GoogleSettings};
use crate::error::{CliError, CliResult};

/// Runs the Google consent flow and writes the token file `serve` reads.
///
/// Credentials that came from flags or `--credentials-file` are persisted
/// into `config_path` so the server finds them on its next start.
pub async fn google(
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials_file: Option<PathBuf>,
    force: bool,
    config: &AppConfig,
    config_path: &Path,
) -> CliResult<()> {
    use homeboard_providers::google::{GoogleConfig, OAuthClient, OAuthCredentials, TokenStorage};

    let (id, secret, source) =
        resolve_google_credentials(client_id, client_secret, credentials_file, config)?;

    let credentials = OAuthCredentials::new(&id, &secret);
    credentials
        .validate()
        .map_err(|e| CliError::config(format!("invalid Google credentials: {e}")))?;

    let mut google_config = GoogleConfig::new(credentials);
    if let Some(ref settings) = config.google
        && let Some(ref path) = settings.token_path
    {
        google_config = google_config.with_token_path(config.resolve_path(path));
    }

    let storage = TokenStorage::new(&google_config.token_path);
    let loaded = storage.load();
    if !force {
        // an unreadable token file only matters when we would keep it
        loaded?;
    }
    if !force && !storage.needs_reauth(&google_config.scopes) {
        save_credentials_to_config(config_path, &id, &secret, &source)?;
        println!("Already authorized for Google Calendar.");
        println!("Use --force to re-authorize.");
        return Ok(());
    }

    println!("Starting Google Calendar authorization...");
    println!();
    println!("A browser window will open for you to grant read access.");
    println!("If it doesn't, copy the URL printed below.");
    println!();

    let oauth = OAuthClient::new(&google_config)?;
    let tokens = oauth
        .authorize(&google_config.scopes, google_config.loopback_port_range)
        .await?;
    storage.set(tokens)?;

    save_credentials_to_config(config_path, &id, &secret, &source)?;

    info!(path = %storage.path().display(), "Google authorization saved");
    println!();
    println!("Authorization successful.");
    println!("Token saved to {}", storage.path().display());
    println!("Start the server with: homeboard serve");
    Ok(())
}

/// Where the credentials were resolved from.
#[derive(Debug, PartialEq)]
enum CredentialSource {
    /// `--client-id`/`--client-secret` or `--credentials-file`
    Cli,
    /// Already in config.toml
    Config,
}

/// Writes credentials into the `[google]` table of `config_path`.
///
/// No-op when they were read from that file in the first place. Other
/// tables, keys and comments are left untouched.
fn save_credentials_to_config(
    config_path: &Path,
    client_id: &str,
    client_secret: &str,
    source: &CredentialSource,
) -> CliResult<()> {
    if *source == CredentialSource::Config {
        return Ok(());
    }

    let content = if config_path.exists() {
        std::fs::read_to_string(config_path)?
    } else {
        String::new()
    };
    let mut doc = content.parse::<toml_edit::DocumentMut>().map_err(|e| {
        CliError::config(format!(
            "could not parse {} for writing: {e}",
            config_path.display()
        ))
    })?;

    if !doc.contains_key("google") {
        doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let google = doc["google"]
        .as_table_mut()
        .ok_or_else(|| CliError::config("`google` in config.toml is not a table"))?;
    google["client_id"] = toml_edit::value(client_id);
    google["client_secret"] = toml_edit::value(client_secret);
    if !google.contains_key("calendar_ids") {
        let mut ids = toml_edit::Array::new();
        ids.push("primary");
        google["calendar_ids"] = toml_edit::value(ids);
    }

    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, doc.to_string())?;

    info!(path = %config_path.display(), "credentials saved");
    println!("Credentials saved to {}", config_path.display());
    Ok(())
}

/// Resolves Google client credentials.
///
/// Priority (highest to lowest):
/// 1. `--client-id` + `--client-secret`
/// 2. `--credentials-file`
/// 3. the `[google]` section of config.toml, inline or via its credentials file
fn resolve_google_credentials(
    cli_client_id: Option<String>,
    cli_client_secret: Option<String>,
    cli_credentials_file: Option<PathBuf>,
    config: &AppConfig,
) -> CliResult<(String, String, CredentialSource)> {
    use homeboard_providers::google::OAuthCredentials;

    match (cli_client_id, cli_client_secret) {
        (Some(id), Some(secret)) => return Ok((id, secret, CredentialSource::Cli)),
        (Some(_), None) | (None, Some(_)) => {
            return Err(CliError::config(
                "both --client-id and --client-secret are required when providing credentials directly",
            ));
        }
        (None, None) => {}
    }

    if let Some(ref path) = cli_credentials_file {
        let creds = OAuthCredentials::from_file(path).map_err(|e| {
            CliError::config(format!(
                "failed to load credentials from {}: {e}",
                path.display()
            ))
        })?;
        return Ok((creds.client_id, creds.client_secret, CredentialSource::Cli));
    }

    let Some(google) = config.google.as_ref() else {
        return Err(missing_credentials());
    };
    if google.client_id.is_none() && google.client_secret.is_none() && google.credentials_file.is_none() {
        return Err(missing_credentials());
    }
    let creds = resolve_from_settings(google, config)?;
    Ok((creds.client_id, creds.client_secret, CredentialSource::Config))
}

fn resolve_from_settings(
    google: &GoogleSettings,
    config: &AppConfig,
) -> CliResult<homeboard_providers::google::OAuthCredentials> {
    google
        .resolve_credentials(config)
        .map_err(|e| CliError::config(format!("failed to resolve Google credentials from config: {e}")))
}

fn missing_credentials() -> CliError {
    CliError::config(format!(
        "Google credentials are required. Provide via:\n  \
         - client_id + client_secret or credentials_file in {}\n  \
         - --client-id and --client-secret flags\n  \
         - --credentials-file flag (path to Google Cloud Console JSON)\n  \
         - GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET env vars",
        AppConfig::default_path().display()
    ))
}
