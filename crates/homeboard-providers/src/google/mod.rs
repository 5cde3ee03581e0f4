//! Google Calendar source.
//!
//! Reads `events.list` for each configured calendar with a bearer token
//! from a [`CredentialStore`](crate::CredentialStore). The default store
//! is [`GoogleCredentialStore`], which keeps the grant in a token file and
//! refreshes it as needed.
//!
//! Getting the first grant is a one-off interactive step:
//!
//! 1. Register a desktop OAuth client in Google Cloud Console and download
//!    its `credentials.json`.
//! 2. Run `homeboard auth google`. It opens the consent page, receives the
//!    redirect on a loopback port and writes the token file.
//! 3. `homeboard serve` refreshes from that file from then on.
//!
//! ```ignore
//! use homeboard_providers::google::{GoogleConfig, GoogleSource, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::from_file("credentials.json")?;
//! let source = GoogleSource::new(&GoogleConfig::new(credentials))?;
//! ```

mod client;
mod config;
mod oauth;
mod source;
mod store;
mod tokens;

pub use client::GoogleCalendarClient;
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{OAuthClient, PkceFlow, RefreshedToken};
pub use source::GoogleSource;
pub use store::GoogleCredentialStore;
pub use tokens::{TokenInfo, TokenStorage};
