//! OAuth 2.0 for Google: token refresh and the PKCE consent flow.
//!
//! The server only ever refreshes. The consent flow (authorization code
//! with PKCE, loopback redirect on 127.0.0.1) runs from `homeboard auth
//! google`, once, to produce the refresh token the server lives on.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult, from_reqwest};

use super::config::{GoogleConfig, OAuthCredentials};
use super::tokens::TokenInfo;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Bytes of entropy in the PKCE verifier.
const CODE_VERIFIER_LENGTH: usize = 32;

/// How long `authorize` waits for the browser to come back.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// A fresh access token from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

/// Talks to Google's OAuth endpoints.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    token_url: String,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            credentials: config.credentials.clone(),
            token_url: config.token_url.clone(),
            http_client,
        })
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// A 400/401 from the endpoint (revoked or expired grant) is an
    /// authentication error; anything else keeps its transport category.
    pub async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<RefreshedToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token = self.post_token_form(&params, "token refresh").await?;
        info!("refreshed Google access token");
        Ok(RefreshedToken {
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }

    /// Runs the interactive consent flow and returns the granted tokens.
    ///
    /// Opens the browser (or prints the URL when that fails) and waits on
    /// the loopback listener, off the async runtime, until Google redirects
    /// back.
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> ProviderResult<TokenInfo> {
        let pkce = PkceFlow::new();
        let (listener, port) = bind_loopback(port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{port}/callback");
        let auth_url = pkce.build_auth_url(&self.credentials.client_id, &redirect_uri, scopes);

        info!(port, "waiting for Google consent in the browser");
        if let Err(e) = open::that(&auth_url) {
            warn!(error = %e, "could not open a browser");
            eprintln!("\nOpen this URL in your browser:\n\n{auth_url}\n");
        }

        let callback = tokio::task::spawn_blocking(move || wait_for_callback(listener))
            .await
            .map_err(|e| ProviderError::internal("OAuth callback task failed").with_source(e))??;
        if callback.state != pkce.state {
            return Err(ProviderError::authentication(
                "OAuth state mismatch, refusing the authorization code",
            ));
        }

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", callback.code.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        let token = self.post_token_form(&params, "code exchange").await?;

        if token.refresh_token.is_none() {
            warn!("Google returned no refresh token; the server will need re-consent when this token expires");
        }
        Ok(TokenInfo::new(
            token.access_token,
            token.refresh_token,
            token.expires_in,
            scopes.to_vec(),
        ))
    }

    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
        context: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| from_reqwest(context, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| from_reqwest(context, e))?;

        if status.is_client_error() {
            return Err(ProviderError::authentication(format!(
                "{context} rejected ({status}): {}",
                oauth_error_summary(&body)
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::server(format!("{context} failed ({status})")));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("{context}: malformed token response"))
                .with_source(e)
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// `invalid_grant: Token has been expired or revoked.` from an OAuth error body.
fn oauth_error_summary(body: &str) -> String {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(OAuthErrorBody {
            error,
            error_description: Some(description),
        }) => format!("{error}: {description}"),
        Ok(OAuthErrorBody { error, .. }) => error,
        Err(_) => "unrecognised error body".to_string(),
    }
}

fn bind_loopback(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            debug!(port, "bound loopback listener");
            return Ok((listener, port));
        }
    }
    Err(ProviderError::configuration(format!(
        "no free loopback port in {}-{}",
        port_range.0, port_range.1
    )))
}

/// What the browser brought back on the redirect.
#[derive(Debug, PartialEq, Eq)]
struct Callback {
    code: String,
    state: String,
}

fn wait_for_callback(listener: TcpListener) -> ProviderResult<Callback> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            if let Some(result) = handle_connection(stream) {
                let _ = tx.send(result);
                return;
            }
        }
    });

    match rx.recv_timeout(CALLBACK_TIMEOUT) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ProviderError::authentication(
            "timed out waiting for the OAuth redirect",
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(ProviderError::internal("OAuth callback listener stopped"))
        }
    }
}

/// Handles one request on the loopback listener. Returns `None` for
/// requests that are not the redirect (favicon and the like).
fn handle_connection(mut stream: TcpStream) -> Option<ProviderResult<Callback>> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return None;
    };
    let result = parse_callback_target(target)?;

    let page = match result {
        Ok(_) => "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html><body><h1>homeboard is authorized</h1><p>You can close this window.</p></body></html>",
        Err(_) => "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n<html><body><h1>Authorization failed</h1><p>Check the terminal.</p></body></html>",
    };
    let _ = stream.write_all(page.as_bytes());
    let _ = stream.flush();
    Some(result)
}

fn parse_callback_target(target: &str) -> Option<ProviderResult<Callback>> {
    let url = Url::parse(&format!("http://127.0.0.1{target}")).ok()?;
    if url.path() != "/callback" {
        return None;
    }

    let mut code = None;
    let mut state = String::new();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = value.into_owned(),
            "error" => {
                return Some(Err(ProviderError::authentication(format!(
                    "authorization denied: {value}"
                ))));
            }
            _ => {}
        }
    }

    Some(match code {
        Some(code) => Ok(Callback { code, state }),
        None => Err(ProviderError::authentication(
            "redirect carried no authorization code",
        )),
    })
}

/// PKCE verifier, challenge and CSRF state (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    /// base64url(SHA-256(verifier))
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// The consent URL, asking for offline access so Google issues a
    /// refresh token.
    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &scopes.join(" "))
            .append_pair("code_challenge", &self.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &self.state)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .finish();
        format!("{GOOGLE_AUTH_URL}?{query}")
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}
