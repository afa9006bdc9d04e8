//! WordPress.com OAuth session.
//!
//! Tracks whether a visitor is logged in, holds their profile, and persists
//! the access and refresh tokens through a [`TokenStore`]. The authorization
//! code itself is exchanged by the token proxy (see [`crate::token`]), which
//! holds the client secret.

use std::{
    collections::HashMap,
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use reqwest::{
    Client, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    config::AuthConfig,
    error::{Error, Result},
};

/// Store key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "wp_token";

/// Store key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "wp_refresh_token";

// =============================================================================
// Token storage
// =============================================================================

/// Persistence for session tokens, keyed by fixed names.
pub trait TokenStore: Debug + Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Tokens kept in memory for the life of the process.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

/// Tokens kept in a JSON object on disk.
///
/// The file is read on every access so separate processes see each other's
/// logins.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                Error::TokenStore(format!("{} is not a token file: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(Error::TokenStore(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::TokenStore(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, contents).map_err(|e| {
            Error::TokenStore(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.read()?;
        values.insert(key.to_string(), value.to_string());
        self.write(&values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.read()?;
        if values.remove(key).is_some() {
            self.write(&values)?;
        }
        Ok(())
    }
}

// =============================================================================
// Session
// =============================================================================

/// Profile of the logged-in WordPress.com user.
///
/// Decodes the `/rest/v1/me` shape and serializes with camelCase keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(alias = "ID")]
    pub id: u64,
    #[serde(alias = "display_name")]
    pub display_name: String,
    pub username: String,
    #[serde(alias = "avatar_URL", default)]
    pub avatar_url: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Token endpoint reply, either tokens or an OAuth error.
#[derive(Debug, Default, Deserialize)]
struct TokenReply {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenReply {
    fn failure_reason(self) -> String {
        self.error_description
            .or(self.error)
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// Login state for one visitor.
#[derive(Debug)]
pub struct AuthSession {
    http: Client,
    config: AuthConfig,
    store: Arc<dyn TokenStore>,
    user: RwLock<Option<UserInfo>>,
}

impl AuthSession {
    /// Creates a logged-out session. Call [`AuthSession::restore`] to pick
    /// up a previously stored token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: AuthConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            http: Client::builder().default_headers(headers).build()?,
            config,
            store,
            user: RwLock::new(None),
        })
    }

    /// `true` while a signed-in user profile is held.
    pub fn is_logged_in(&self) -> bool {
        self.user_info().is_some()
    }

    /// Profile of the signed-in user.
    pub fn user_info(&self) -> Option<UserInfo> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The stored access token, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read.
    pub fn access_token(&self) -> Result<Option<String>> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    /// URL the user agent must open to start the authorization-code flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorize URL is not a valid URL.
    pub fn login_url(&self) -> Result<String> {
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "global"),
            ],
        )
        .map_err(|e| Error::InvalidInput(format!("invalid authorize URL: {e}")))?;
        Ok(url.into())
    }

    /// Loads the profile for the stored token. A token the profile endpoint
    /// rejects is discarded. Returns whether the session is now logged in.
    ///
    /// # Errors
    ///
    /// Returns an error only if the token store fails.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<bool> {
        let Some(token) = self.store.get(ACCESS_TOKEN_KEY)? else {
            self.set_user(None);
            return Ok(false);
        };

        match self.fetch_profile(&token).await {
            Ok(user) => {
                info!(username = %user.username, "Session restored");
                self.set_user(Some(user));
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Stored token rejected, clearing session");
                self.store.remove(ACCESS_TOKEN_KEY)?;
                self.set_user(None);
                Ok(false)
            }
        }
    }

    /// Finishes login with the authorization `code` from the redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The proxy is unreachable or replies with something other than JSON
    /// - The identity provider refuses the code (`Login`, carrying its
    ///   description)
    /// - The issued token is rejected by the profile endpoint
    /// - The token store fails
    #[instrument(skip(self, code))]
    pub async fn complete_login(&self, code: &str) -> Result<UserInfo> {
        let reply = self
            .post_token_request(&self.config.token_exchange_url, "code", code)
            .await?;
        self.store_tokens(reply)?;

        if self.restore().await? {
            self.user_info().ok_or(Error::NotLoggedIn)
        } else {
            Err(Error::Login(
                "issued token was rejected by the profile endpoint".to_string(),
            ))
        }
    }

    /// Trades the stored refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `NotLoggedIn` without a refresh token, `Login` when the
    /// provider refuses it, or a transport/store error.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let refresh_token = self
            .store
            .get(REFRESH_TOKEN_KEY)?
            .ok_or(Error::NotLoggedIn)?;
        let reply = self
            .post_token_request(&self.config.token_refresh_url, "refresh_token", &refresh_token)
            .await?;
        self.store_tokens(reply)
    }

    /// Clears the stored tokens and the profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be written.
    pub fn logout(&self) -> Result<()> {
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        self.set_user(None);
        info!("Logged out");
        Ok(())
    }

    fn set_user(&self, user: Option<UserInfo>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }

    fn store_tokens(&self, reply: TokenReply) -> Result<()> {
        let Some(access_token) = reply.access_token.clone() else {
            return Err(Error::Login(reply.failure_reason()));
        };
        self.store.set(ACCESS_TOKEN_KEY, &access_token)?;
        if let Some(refresh_token) = &reply.refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, refresh_token)?;
        }
        Ok(())
    }

    async fn post_token_request(&self, url: &str, field: &str, value: &str) -> Result<TokenReply> {
        let body: HashMap<&str, &str> = HashMap::from([(field, value)]);
        let response = self.http.post(url).json(&body).send().await?;
        // Error replies carry the provider's JSON too, so the status is not
        // checked here.
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn fetch_profile(&self, token: &str) -> Result<UserInfo> {
        let response = self
            .http
            .get(&self.config.profile_url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status, body));
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
