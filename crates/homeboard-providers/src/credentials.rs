//! Credential acquisition for authenticated sources.
//!
//! A [`CredentialStore`] answers one question per fetch: "give me an access
//! token". The answer records how it was obtained so callers can log it,
//! and "a human has to run the consent flow" is an ordinary outcome rather
//! than a crash.

use std::fmt;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

/// The result of asking a store for a credential.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// The stored token was still valid.
    CachedValid { access_token: String },
    /// The stored token had expired and was refreshed.
    Refreshed { access_token: String },
    /// No token can be produced without user interaction.
    InteractiveRequired { reason: String },
}

impl Credential {
    pub fn access_token(&self) -> Option<&str> {
        match self {
            Self::CachedValid { access_token } | Self::Refreshed { access_token } => {
                Some(access_token)
            }
            Self::InteractiveRequired { .. } => None,
        }
    }

    /// Short label for logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::CachedValid { .. } => "cached",
            Self::Refreshed { .. } => "refreshed",
            Self::InteractiveRequired { .. } => "interactive_required",
        }
    }

    /// The bearer token, or an authentication error if consent is needed.
    pub fn into_access_token(self) -> ProviderResult<String> {
        match self {
            Self::CachedValid { access_token } | Self::Refreshed { access_token } => {
                Ok(access_token)
            }
            Self::InteractiveRequired { reason } => Err(ProviderError::authentication(reason)),
        }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InteractiveRequired { reason } => f
                .debug_struct("InteractiveRequired")
                .field("reason", reason)
                .finish(),
            other => write!(f, "Credential({})", other.outcome()),
        }
    }
}

/// Something that can hand out access tokens.
pub trait CredentialStore: Send + Sync {
    /// Returns a usable credential, refreshing if needed.
    ///
    /// # Errors
    ///
    /// Transport failures while refreshing are errors. A missing or revoked
    /// grant is [`Credential::InteractiveRequired`], not an error.
    fn acquire(&self) -> BoxFuture<'_, ProviderResult<Credential>>;
}

/// A store holding one fixed token. Useful for tests and for tokens
/// managed outside homeboard.
#[derive(Debug, Clone)]
pub struct StaticCredentialStore {
    credential: Credential,
}

impl StaticCredentialStore {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            credential: Credential::CachedValid {
                access_token: access_token.into(),
            },
        }
    }

    /// A store that always reports that consent is needed.
    pub fn interactive_required(reason: impl Into<String>) -> Self {
        Self {
            credential: Credential::InteractiveRequired {
                reason: reason.into(),
            },
        }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn acquire(&self) -> BoxFuture<'_, ProviderResult<Credential>> {
        let credential = self.credential.clone();
        Box::pin(async move { Ok(credential) })
    }
}
