//! Token-file-backed [`CredentialStore`] for Google.

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::credentials::{Credential, CredentialStore};
use crate::error::{ProviderErrorCode, ProviderResult};
use crate::provider::BoxFuture;

use super::config::GoogleConfig;
use super::oauth::OAuthClient;
use super::tokens::TokenStorage;

const REAUTH_HINT: &str = "run `homeboard auth google` to grant calendar access";

/// Hands out Google access tokens from the token file, refreshing them
/// with the stored refresh token when they expire.
///
/// Concurrent callers that all find an expired token share one refresh.
#[derive(Debug)]
pub struct GoogleCredentialStore {
    storage: TokenStorage,
    oauth: OAuthClient,
    refresh_lock: AsyncMutex<()>,
}

impl GoogleCredentialStore {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let storage = TokenStorage::new(&config.token_path);
        if let Err(e) = storage.load() {
            warn!(error = %e, "ignoring unreadable token file");
        }
        Ok(Self {
            storage,
            oauth: OAuthClient::new(config)?,
            refresh_lock: AsyncMutex::new(()),
        })
    }

    async fn acquire_inner(&self) -> ProviderResult<Credential> {
        if self.storage.get().is_none() {
            // picks up a token written by `auth google` after startup
            let _ = self.storage.load();
        }
        let Some(tokens) = self.storage.get() else {
            return Ok(interactive(format!(
                "no token at {}; {REAUTH_HINT}",
                self.storage.path().display()
            )));
        };
        if !tokens.is_expired() {
            return Ok(Credential::CachedValid {
                access_token: tokens.access_token,
            });
        }

        let _guard = self.refresh_lock.lock().await;

        // someone else may have refreshed while we waited
        if let Some(current) = self.storage.get()
            && !current.is_expired()
        {
            debug!("token refreshed by a concurrent request");
            return Ok(Credential::Refreshed {
                access_token: current.access_token,
            });
        }

        let Some(refresh_token) = tokens.refresh_token else {
            return Ok(interactive(format!(
                "access token expired and no refresh token is stored; {REAUTH_HINT}"
            )));
        };

        match self.oauth.refresh_token(&refresh_token).await {
            Ok(refreshed) => {
                self.storage
                    .update_access_token(&refreshed.access_token, refreshed.expires_in)?;
                info!("Google access token refreshed");
                Ok(Credential::Refreshed {
                    access_token: refreshed.access_token,
                })
            }
            Err(e) if e.code() == ProviderErrorCode::AuthenticationFailed => {
                warn!(error = %e, "refresh token rejected");
                Ok(interactive(format!("{}; {REAUTH_HINT}", e.message())))
            }
            Err(e) => Err(e),
        }
    }
}

fn interactive(reason: String) -> Credential {
    Credential::InteractiveRequired { reason }
}

impl CredentialStore for GoogleCredentialStore {
    fn acquire(&self) -> BoxFuture<'_, ProviderResult<Credential>> {
        Box::pin(self.acquire_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::config::OAuthCredentials;
    use crate::google::tokens::TokenInfo;
    use std::path::Path;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(token_path: &Path, token_url: String) -> GoogleConfig {
        GoogleConfig::new(OAuthCredentials::new(
            "test-client.apps.googleusercontent.com",
            "test-secret",
        ))
        .with_token_path(token_path)
        .with_token_url(token_url)
    }

    async fn token_endpoint(status: u16, body: &str, calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(calls)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn valid_token_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        TokenStorage::new(&token_path)
            .set(TokenInfo::new("ya29.valid", Some("1//r".into()), Some(3600), vec![]))
            .unwrap();
        let server = token_endpoint(200, "{}", 0).await;

        let store =
            GoogleCredentialStore::new(&config(&token_path, format!("{}/token", server.uri())))
                .unwrap();
        let credential = store.acquire().await.unwrap();
        assert_eq!(
            credential,
            Credential::CachedValid {
                access_token: "ya29.valid".to_string()
            }
        );
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        TokenStorage::new(&token_path)
            .set(TokenInfo::from_refresh_token("1//r"))
            .unwrap();
        let server =
            token_endpoint(200, r#"{"access_token":"ya29.fresh","expires_in":3600}"#, 1).await;

        let store =
            GoogleCredentialStore::new(&config(&token_path, format!("{}/token", server.uri())))
                .unwrap();
        let credential = store.acquire().await.unwrap();
        assert_eq!(credential.outcome(), "refreshed");
        assert_eq!(credential.access_token(), Some("ya29.fresh"));

        // second call hits the cached token
        let again = store.acquire().await.unwrap();
        assert_eq!(again.outcome(), "cached");

        let on_disk = TokenStorage::new(&token_path);
        on_disk.load().unwrap();
        assert_eq!(on_disk.get().unwrap().access_token, "ya29.fresh");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        TokenStorage::new(&token_path)
            .set(TokenInfo::from_refresh_token("1//r"))
            .unwrap();
        let server =
            token_endpoint(200, r#"{"access_token":"ya29.fresh","expires_in":3600}"#, 1).await;

        let store =
            GoogleCredentialStore::new(&config(&token_path, format!("{}/token", server.uri())))
                .unwrap();
        let (a, b) = tokio::join!(store.acquire(), store.acquire());
        assert_eq!(a.unwrap().access_token(), Some("ya29.fresh"));
        assert_eq!(b.unwrap().access_token(), Some("ya29.fresh"));
    }

    #[tokio::test]
    async fn missing_token_requires_interaction() {
        let dir = tempfile::tempdir().unwrap();
        let server = token_endpoint(200, "{}", 0).await;

        let store = GoogleCredentialStore::new(&config(
            &dir.path().join("absent.json"),
            format!("{}/token", server.uri()),
        ))
        .unwrap();
        let credential = store.acquire().await.unwrap();
        assert_eq!(credential.outcome(), "interactive_required");
    }

    #[tokio::test]
    async fn revoked_refresh_token_requires_interaction() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        TokenStorage::new(&token_path)
            .set(TokenInfo::from_refresh_token("1//revoked"))
            .unwrap();
        let server = token_endpoint(400, r#"{"error":"invalid_grant"}"#, 1).await;

        let store =
            GoogleCredentialStore::new(&config(&token_path, format!("{}/token", server.uri())))
                .unwrap();
        match store.acquire().await.unwrap() {
            Credential::InteractiveRequired { reason } => {
                assert!(reason.contains("invalid_grant"));
                assert!(reason.contains("homeboard auth google"));
            }
            other => panic!("expected interactive_required, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn token_endpoint_outage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        TokenStorage::new(&token_path)
            .set(TokenInfo::from_refresh_token("1//r"))
            .unwrap();
        let server = token_endpoint(500, "", 1).await;

        let store =
            GoogleCredentialStore::new(&config(&token_path, format!("{}/token", server.uri())))
                .unwrap();
        let err = store.acquire().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
    }
}
