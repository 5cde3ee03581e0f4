//! OAuth token persistence.
//!
//! The token file is the only durable state homeboard keeps. Two layouts
//! are read: homeboard's own [`TokenInfo`] JSON, and the `authorized_user`
//! file written by Google's Node.js quickstart, so an existing
//! `token.json` keeps working. Writes always use the [`TokenInfo`] layout.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Tokens are treated as expired this long before Google says they are.
const EXPIRY_SKEW_SECS: i64 = 60;

/// A stored OAuth grant.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub last_refresh: DateTime<Utc>,
}

impl std::fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInfo")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// `token.json` as written by the Google quickstart: a refresh token and
/// the client that owns it, no access token.
#[derive(Debug, Deserialize)]
struct AuthorizedUserFile {
    #[serde(rename = "type")]
    kind: String,
    refresh_token: String,
}

impl TokenInfo {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(|secs| expiry_from(now, secs)),
            scopes,
            last_refresh: now,
        }
    }

    /// A grant holding only a refresh token. The first use refreshes it.
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: String::new(),
            refresh_token: Some(refresh_token.into()),
            expires_at: Some(DateTime::<Utc>::UNIX_EPOCH),
            scopes: Vec::new(),
            last_refresh: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Tokens without an expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_empty() || self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        let now = Utc::now();
        self.access_token = access_token.into();
        self.expires_at = expires_in_secs.map(|secs| expiry_from(now, secs));
        self.last_refresh = now;
    }

    fn parse(content: &str) -> ProviderResult<Self> {
        if let Ok(tokens) = serde_json::from_str::<TokenInfo>(content) {
            return Ok(tokens);
        }
        let file: AuthorizedUserFile = serde_json::from_str(content).map_err(|e| {
            ProviderError::configuration("failed to parse token file").with_source(e)
        })?;
        if file.kind != "authorized_user" {
            return Err(ProviderError::configuration(format!(
                "unsupported token file type '{}'",
                file.kind
            )));
        }
        Ok(Self::from_refresh_token(file.refresh_token))
    }
}

fn expiry_from(now: DateTime<Utc>, expires_in_secs: i64) -> DateTime<Utc> {
    now + Duration::seconds(expires_in_secs) - Duration::seconds(EXPIRY_SKEW_SECS)
}

/// File-backed token storage with an in-memory copy.
#[derive(Debug)]
pub struct TokenStorage {
    path: PathBuf,
    tokens: Mutex<Option<TokenInfo>>,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tokens: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<TokenInfo>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads the token file. Returns `Ok(false)` when there is none.
    pub fn load(&self) -> ProviderResult<bool> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no token file");
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read token file {}",
                self.path.display()
            ))
            .with_source(e)
        })?;
        let tokens = TokenInfo::parse(&content)?;

        info!(path = %self.path.display(), "loaded OAuth token");
        *self.lock() = Some(tokens);
        Ok(true)
    }

    /// Writes the in-memory tokens to disk, atomically and owner-only.
    pub fn save(&self) -> ProviderResult<()> {
        let content = {
            let tokens = self.lock();
            let tokens = tokens
                .as_ref()
                .ok_or_else(|| ProviderError::internal("no tokens to save"))?;
            serde_json::to_string_pretty(tokens).map_err(|e| {
                ProviderError::internal("failed to serialize tokens").with_source(e)
            })?
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration("failed to create token directory").with_source(e)
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content).map_err(|e| {
            ProviderError::configuration("failed to write token file").with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration("failed to rename token file").with_source(e)
        })?;

        debug!(path = %self.path.display(), "saved OAuth token");
        Ok(())
    }

    pub fn get(&self) -> Option<TokenInfo> {
        self.lock().clone()
    }

    /// Replaces the tokens and persists them.
    pub fn set(&self, tokens: TokenInfo) -> ProviderResult<()> {
        *self.lock() = Some(tokens);
        self.save()
    }

    /// Swaps in a refreshed access token and persists it.
    pub fn update_access_token(
        &self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) -> ProviderResult<()> {
        {
            let mut tokens = self.lock();
            let tokens = tokens
                .as_mut()
                .ok_or_else(|| ProviderError::internal("no tokens to update"))?;
            tokens.update_access_token(access_token, expires_in_secs);
        }
        self.save()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn needs_reauth(&self, required_scopes: &[String]) -> bool {
        match self.lock().as_ref() {
            None => true,
            Some(tokens) => {
                (tokens.refresh_token.is_none() && tokens.is_expired())
                    || (!tokens.scopes.is_empty() && !tokens.has_scopes(required_scopes))
            }
        }
    }
}
