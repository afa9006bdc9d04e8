//! Configuration for the content client, the OAuth session and the token
//! exchange proxy.
//!
//! Settings live in `pharma-news.toml`. Every section and field is optional;
//! anything missing falls back to the production WordPress.com endpoints.
//!
//! # Resolution Algorithm
//!
//! 1. `PHARMA_NEWS_CONFIG` environment variable
//! 2. Current directory
//! 3. Parent directories (walk up to filesystem root)
//! 4. User config directory (`~/.config/pharma-news/pharma-news.toml`)
//!
//! If no file is found the defaults are used.
//!
//! # Example
//!
//! ```toml
//! [content]
//! base_url = "https://public-api.wordpress.com/wp/v2/sites/clinpharmanews.wordpress.com"
//! timeout_secs = 15
//!
//! [auth]
//! client_id = "123712"
//! redirect_uri = "https://pharmanews.vercel.app/oauth/callback"
//!
//! [proxy]
//! listen = "127.0.0.1:3000"
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

/// Name of the config file looked up in each directory.
pub const CONFIG_FILE_NAME: &str = "pharma-news.toml";

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "PHARMA_NEWS_CONFIG";

pub const DEFAULT_CONTENT_BASE_URL: &str =
    "https://public-api.wordpress.com/wp/v2/sites/clinpharmanews.wordpress.com";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://public-api.wordpress.com/oauth2/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://public-api.wordpress.com/oauth2/token";
pub const DEFAULT_PROFILE_URL: &str = "https://public-api.wordpress.com/rest/v1/me";
pub const DEFAULT_CLIENT_ID: &str = "123712";
pub const DEFAULT_REDIRECT_URI: &str = "https://pharmanews.vercel.app/oauth/callback";
pub const DEFAULT_SITE_URL: &str = "https://pharmanews.vercel.app";

/// Errors that can occur while locating or loading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error when reading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML or has wrongly typed fields.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub content: ContentConfig,
    pub auth: AuthConfig,
    pub proxy: ProxyConfig,
}

/// Content API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Base URL of the WordPress REST API for the site, without trailing
    /// slash.
    pub base_url: String,
    /// Per-request timeout. Unset means the transport default.
    pub timeout_secs: Option<u64>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CONTENT_BASE_URL.to_string(),
            timeout_secs: None,
        }
    }
}

impl ContentConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// OAuth client settings used by [`crate::AuthSession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub profile_url: String,
    /// Proxy endpoint exchanging an authorization code for tokens.
    pub token_exchange_url: String,
    /// Proxy endpoint exchanging a refresh token for new tokens.
    pub token_refresh_url: String,
    /// Where tokens are persisted. Defaults to the user data directory.
    pub token_store: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            profile_url: DEFAULT_PROFILE_URL.to_string(),
            token_exchange_url: format!("{DEFAULT_SITE_URL}/api/get-token"),
            token_refresh_url: format!("{DEFAULT_SITE_URL}/api/refresh-token"),
            token_store: None,
        }
    }
}

impl AuthConfig {
    /// Resolved token store location.
    pub fn token_store_path(&self) -> PathBuf {
        self.token_store.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pharma-news")
                .join("tokens.json")
        })
    }
}

/// Token exchange proxy settings. Client credentials are usually supplied
/// through `CLIENT_ID`, `CLIENT_SECRET` and `WP_REDIRECT_URI`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub listen: String,
    /// Identity provider token endpoint.
    pub token_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: None,
            client_secret: None,
            redirect_uri: None,
        }
    }
}

impl Config {
    /// Loads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file cannot be read, `Parse` if it is not
    /// valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|_e| ConfigError::NotFound(path.to_path_buf()))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Finds and loads the config file using the resolution algorithm
    /// described in the module docs. Returns the defaults and `None` when no
    /// file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a found file cannot be read or parsed, or if the
    /// current directory is inaccessible.
    pub fn resolve() -> Result<(Self, Option<PathBuf>), ConfigError> {
        let current = std::env::current_dir()?;
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let user_path =
            dirs::config_dir().map(|dir| dir.join("pharma-news").join(CONFIG_FILE_NAME));
        Self::resolve_from(env_path.as_deref(), &current, user_path.as_deref())
    }

    /// Resolution with every input made explicit.
    ///
    /// # Errors
    ///
    /// Same as [`Config::resolve`].
    pub fn resolve_from(
        env_path: Option<&Path>,
        start_dir: &Path,
        user_path: Option<&Path>,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = env_path
            && path.exists()
        {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        for dir in start_dir.ancestors() {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Ok((Self::load(&candidate)?, Some(candidate)));
            }
        }

        if let Some(path) = user_path
            && path.exists()
        {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        Ok((Self::default(), None))
    }

    /// Overlays proxy credentials from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Overlays proxy credentials using `lookup` to read variables.
    #[must_use]
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("CLIENT_ID") {
            self.proxy.client_id = Some(value);
        }
        if let Some(value) = lookup("CLIENT_SECRET") {
            self.proxy.client_secret = Some(value);
        }
        if let Some(value) = lookup("WP_REDIRECT_URI") {
            self.proxy.redirect_uri = Some(value);
        }
        self
    }
}
