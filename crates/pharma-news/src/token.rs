//! Server side of the OAuth token exchange.
//!
//! The browser never sees the client secret: it posts the authorization code
//! (or a refresh token) here, and [`TokenExchange`] forwards it to the
//! identity provider with the server-held credentials. Replies are always a
//! status plus a JSON body, ready to be written to an HTTP response.

use reqwest::{Client, StatusCode};
use serde_json::{Value as JsonValue, json};
use tracing::{error, info, instrument, warn};

use crate::config::ProxyConfig;

/// Errors raised while setting up a [`TokenExchange`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TokenError {
    /// A required client credential is not configured.
    #[error("missing proxy credential `{0}` (set it in [proxy] or the environment)")]
    MissingCredential(&'static str),

    /// The HTTP client could not be created.
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Client credentials registered with the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Status and JSON body to send back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenResponse {
    pub status: StatusCode,
    pub body: JsonValue,
}

impl TokenResponse {
    fn error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }

    pub fn method_not_allowed() -> Self {
        Self::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }
}

/// Forwards token requests to the identity provider.
#[derive(Debug, Clone)]
pub struct TokenExchange {
    http: Client,
    token_url: String,
    credentials: Credentials,
}

impl TokenExchange {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token_url: impl Into<String>, credentials: Credentials) -> Result<Self, TokenError> {
        Ok(Self {
            http: Client::builder().build()?,
            token_url: token_url.into(),
            credentials,
        })
    }

    /// Builds an exchange from the `[proxy]` config section.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` if the client id or secret is unset. A
    /// missing redirect URI falls back to an empty string, which the provider
    /// only checks for code exchanges.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, TokenError> {
        let client_id = config
            .client_id
            .clone()
            .ok_or(TokenError::MissingCredential("CLIENT_ID"))?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or(TokenError::MissingCredential("CLIENT_SECRET"))?;
        let redirect_uri = config.redirect_uri.clone().unwrap_or_else(|| {
            warn!("WP_REDIRECT_URI is not set, code exchanges will likely be refused");
            String::new()
        });

        Self::new(
            config.token_url.clone(),
            Credentials {
                client_id,
                client_secret,
                redirect_uri,
            },
        )
    }

    /// Provider endpoint that receives the forwarded grants.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Exchanges the `code` in a JSON request body for tokens.
    #[instrument(skip_all)]
    pub async fn exchange_code(&self, body: &[u8]) -> TokenResponse {
        let Some(code) = string_field(body, "code") else {
            return TokenResponse::error(StatusCode::BAD_REQUEST, "Missing authorization code");
        };

        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
        ];
        self.forward(&form, "get-token").await
    }

    /// Exchanges the `refresh_token` in a JSON request body for new tokens.
    #[instrument(skip_all)]
    pub async fn exchange_refresh_token(&self, body: &[u8]) -> TokenResponse {
        let Some(refresh_token) = string_field(body, "refresh_token") else {
            return TokenResponse::error(StatusCode::BAD_REQUEST, "Missing refresh_token");
        };

        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        self.forward(&form, "refresh-token").await
    }

    async fn forward(&self, form: &[(&str, &str)], route: &str) -> TokenResponse {
        match self.post_form(form).await {
            Ok((provider_ok, body)) => {
                let status = if provider_ok {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                };
                info!(route, status = status.as_u16(), "Token request forwarded");
                TokenResponse { status, body }
            }
            Err(e) => {
                error!(route, error = %e, "Token request failed");
                TokenResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
            }
        }
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> crate::Result<(bool, JsonValue)> {
        let response = self.http.post(&self.token_url).form(form).send().await?;
        let ok = response.status().is_success();
        let bytes = response.bytes().await?;
        Ok((ok, serde_json::from_slice(&bytes)?))
    }
}

/// Reads a non-empty string field from a JSON object body. Empty or
/// malformed bodies count as `{}`.
fn string_field(body: &[u8], field: &str) -> Option<String> {
    let value: JsonValue = serde_json::from_slice(body).unwrap_or(JsonValue::Null);
    value
        .get(field)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
