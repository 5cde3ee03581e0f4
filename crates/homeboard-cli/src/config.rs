//! Application configuration.
//!
//! All settings live in a single `config.toml`, by default at
//! `~/.config/homeboard/config.toml`. Relative paths inside it are taken
//! relative to the file's directory.
//!
//! Credential values (`client_id`, `client_secret`) support secret references:
//! - `pass::path/in/store` resolved via `pass show`
//! - `env::VAR_NAME` resolved from the environment
//! - plain text used as-is

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use homeboard_core::parse_offset;
use homeboard_server::ServerConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AppConfig (config.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,

    /// Google Calendar source. Absent means not configured.
    pub google: Option<GoogleSettings>,

    /// School calendar source. Absent means not configured.
    pub school: Option<SchoolSettings>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// `[server]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    pub allowed_origin: String,
    pub cache_ttl_secs: u64,
    pub cache_check_period_secs: u64,
    pub upstream_timeout_secs: u64,
    /// Fixed UTC offset for the local day, e.g. `-04:00`.
    pub local_offset: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind: defaults.bind,
            allowed_origin: defaults.allowed_origin,
            cache_ttl_secs: defaults.cache_ttl.as_secs(),
            cache_check_period_secs: defaults.cache_check_period.as_secs(),
            upstream_timeout_secs: defaults.upstream_timeout.as_secs(),
            local_offset: defaults.local_offset.to_string(),
        }
    }
}

impl ServerSettings {
    pub fn to_server_config(&self) -> Result<ServerConfig, String> {
        let local_offset = parse_offset(&self.local_offset).map_err(|e| e.to_string())?;
        let config = ServerConfig::default()
            .with_bind(self.bind)
            .with_allowed_origin(&self.allowed_origin)
            .with_cache_ttl(Duration::from_secs(self.cache_ttl_secs))
            .with_cache_check_period(Duration::from_secs(self.cache_check_period_secs))
            .with_upstream_timeout(Duration::from_secs(self.upstream_timeout_secs))
            .with_local_offset(local_offset);
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

impl AppConfig {
    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self {
                base_dir: path.parent().map(Path::to_path_buf),
                ..Self::default()
            })
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("homeboard")
    }

    /// `path` as given when absolute, else under the config file's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

// ---------------------------------------------------------------------------
// GoogleSettings
// ---------------------------------------------------------------------------

/// `[google]`
///
/// Credentials come from either `credentials_file` (the JSON downloaded from
/// Google Cloud Console) or inline `client_id` / `client_secret`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleSettings {
    pub credentials_file: Option<PathBuf>,

    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    pub token_path: Option<PathBuf>,

    #[serde(default = "default_calendar_ids")]
    pub calendar_ids: Vec<String>,

    pub timeout_secs: Option<u64>,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            credentials_file: None,
            client_id: None,
            client_secret: None,
            token_path: None,
            calendar_ids: default_calendar_ids(),
            timeout_secs: None,
        }
    }
}

fn default_calendar_ids() -> Vec<String> {
    vec!["primary".to_string()]
}

#[cfg(feature = "google")]
impl GoogleSettings {
    /// Builds the source configuration, resolving credentials and paths.
    pub fn to_provider_config(
        &self,
        app: &AppConfig,
    ) -> Result<homeboard_providers::google::GoogleConfig, String> {
        use homeboard_providers::google::GoogleConfig;

        let credentials = self.resolve_credentials(app)?;
        let mut config = GoogleConfig::new(credentials);
        if !self.calendar_ids.is_empty() {
            config = config.with_calendar_ids(self.calendar_ids.clone());
        }
        if let Some(ref path) = self.token_path {
            config = config.with_token_path(app.resolve_path(path));
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }

    /// Resolves OAuth client credentials.
    ///
    /// Inline `client_id` + `client_secret` win over `credentials_file`.
    /// Each inline value is passed through [`crate::secret::resolve`].
    pub(crate) fn resolve_credentials(
        &self,
        app: &AppConfig,
    ) -> Result<homeboard_providers::google::OAuthCredentials, String> {
        use homeboard_providers::google::OAuthCredentials;

        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => {
                let id = crate::secret::resolve(id)
                    .map_err(|e| format!("failed to resolve client_id: {e}"))?;
                let secret = crate::secret::resolve(secret)
                    .map_err(|e| format!("failed to resolve client_secret: {e}"))?;
                return Ok(OAuthCredentials::new(id, secret));
            }
            (Some(_), None) => {
                return Err("client_secret is missing from [google] section".to_string());
            }
            (None, Some(_)) => {
                return Err("client_id is missing from [google] section".to_string());
            }
            (None, None) => {}
        }

        let Some(ref file) = self.credentials_file else {
            return Err(format!(
                "Google credentials not found. Add to {}:\n  \
                 [google]\n  \
                 credentials_file = \"credentials.json\"\n\n  \
                 or client_id / client_secret, or run: homeboard auth google --credentials-file <path>",
                AppConfig::default_path().display()
            ));
        };
        let path = app.resolve_path(file);
        OAuthCredentials::from_file(&path)
            .map_err(|e| format!("failed to load {}: {e}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// SchoolSettings
// ---------------------------------------------------------------------------

/// `[school]` and its `[school.schedule]` day table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchoolSettings {
    pub endpoint: String,
    pub calendar_id: String,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub schedule: BTreeMap<String, String>,
}

#[cfg(feature = "school")]
impl SchoolSettings {
    pub fn to_provider_config(&self) -> Result<homeboard_providers::school::SchoolConfig, String> {
        use homeboard_providers::school::SchoolConfig;

        let mut config = SchoolConfig::new(&self.endpoint, &self.calendar_id)
            .with_schedule(self.schedule.clone());
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }
}
