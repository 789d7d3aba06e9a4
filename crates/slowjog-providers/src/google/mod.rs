//! Google Calendar exporter.
//!
//! # Authentication Flow
//!
//! 1. The operator registers a "web application" OAuth client and hands
//!    its id, secret and redirect URI to the server
//! 2. The server sends the browser to Google's consent page with a random
//!    `state` remembered in the browser's session
//! 3. Google redirects back with `code` and `state`
//! 4. The server checks `state` and exchanges the code for tokens
//! 5. Tokens stay in the session; an expired access token is refreshed
//!    before the next insert
//!
//! # Example
//!
//! ```ignore
//! use slowjog_providers::google::{GoogleConfig, GoogleExporter, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::new("id.apps.googleusercontent.com", "secret");
//! let config = GoogleConfig::new(credentials, "http://localhost:3000/auth/google/callback");
//! let exporter = GoogleExporter::new(&config)?;
//!
//! let consent = exporter.authorization_url(&state);
//! let tokens = exporter.exchange_code(&code).await?;
//! let receipt = exporter.export(&tokens, &event).await?;
//! ```

mod client;
mod config;
mod exporter;
mod oauth;
mod tokens;

pub use client::GoogleCalendarClient;
pub use config::{CALENDAR_API_BASE, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GoogleConfig, OAuthCredentials};
pub use exporter::GoogleExporter;
pub use oauth::{OAuthClient, generate_state};
pub use tokens::TokenInfo;
