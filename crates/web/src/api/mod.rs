//! Listings backend REST client.
//!
//! # Architecture
//!
//! - Typed methods per endpoint, grouped by resource (`properties`, `auth`,
//!   `favorites`, `notifications`)
//! - The backend is the source of truth - nothing is persisted locally
//! - Public property reads are cached in-memory via `moka` (60 second TTL);
//!   writes invalidate the affected entries
//! - Every outcome is normalized into `Result<T, ApiError>`: transport
//!   failures, non-2xx statuses and undecodable bodies all land in the error
//!   branch so callers branch once
//!
//! # Example
//!
//! ```rust,ignore
//! let client = ApiClient::new(&config.api)?;
//!
//! match client.get_property(id).await {
//!     Ok(property) => render(property),
//!     Err(ApiError::NotFound) => not_found(),
//!     Err(e) => inline_error(e.user_message()),
//! }
//! ```

mod auth;
mod cache;
mod favorites;
mod notifications;
mod properties;
mod uploads;

pub use auth::{AuthResponse, BrokerDocumentUpload, ProfileUpdate, RegisterRequest};
pub use properties::PropertyQuery;
pub use uploads::{MAX_UPLOAD_BYTES, UploadClient, UploadFile};

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::models::AuthToken;

use cache::{CacheKey, CacheValue};

/// Errors returned by the backend client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend rejected the bearer token (401/403).
    #[error("not authorized")]
    Unauthorized,

    /// The resource does not exist (404).
    #[error("not found")]
    NotFound,

    /// Any other non-2xx status, with the server's message when it sent one.
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// A file was rejected before upload.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
}

impl ApiError {
    /// Message shown inline next to the form or page section that failed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "Não foi possível conectar ao servidor. Verifique sua conexão e tente novamente."
                    .to_string()
            }
            Self::Unauthorized => "Sua sessão expirou. Entre novamente.".to_string(),
            Self::NotFound => "Registro não encontrado.".to_string(),
            Self::Api { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Api { .. } | Self::Decode(_) => {
                "Ocorreu um erro inesperado. Tente novamente em instantes.".to_string()
            }
            Self::InvalidUpload(message) => message.clone(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Client for the listings backend.
///
/// Cheaply cloneable; clones share the HTTP connection pool and the cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("morada-web/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(60))
            .support_invalidation_closures()
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                cache,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&AuthToken>,
    ) -> RequestBuilder {
        let builder = self.inner.client.request(method, self.url(path));
        match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.execute_raw(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to decode backend response"
            );
            ApiError::Decode(e.to_string())
        })
    }

    /// Send a request whose response body is ignored.
    async fn execute_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.execute_raw(request).await.map(drop)
    }

    async fn execute_raw(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Backend request failed");
        })?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized,
            StatusCode::NOT_FOUND => ApiError::NotFound,
            _ => {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Backend returned non-success status"
                );
                ApiError::Api {
                    status: status.as_u16(),
                    message: error_message(&body),
                }
            }
        })
    }

    /// Check that the backend answers its health probe.
    ///
    /// # Errors
    ///
    /// Returns the normalized error if the probe fails.
    pub async fn ping(&self) -> Result<(), ApiError> {
        self.execute_empty(self.request(reqwest::Method::GET, "/health", None))
            .await
    }
}

/// Pull a human message out of an error body: `{"message": ..}`,
/// `{"error": ..}` or `{"error": {"message": ..}}`.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return String::new();
    };
    let candidates = [
        value.get("message"),
        value.get("error").and_then(|e| e.get("message")),
        value.get("error"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(r#"{"message":"E-mail já cadastrado"}"#), "E-mail já cadastrado");
        assert_eq!(error_message(r#"{"error":"CRECI inválido"}"#), "CRECI inválido");
        assert_eq!(error_message(r#"{"error":{"message":"Limite"}}"#), "Limite");
        assert_eq!(error_message("<html>502</html>"), "");
        assert_eq!(error_message(r#"{"error":42}"#), "");
    }

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = ApiError::Api {
            status: 409,
            message: "E-mail já cadastrado".to_string(),
        };
        assert_eq!(err.user_message(), "E-mail já cadastrado");

        let err = ApiError::Api {
            status: 500,
            message: String::new(),
        };
        assert!(err.user_message().starts_with("Ocorreu um erro"));
        assert!(ApiError::NotFound.is_not_found());
        assert!(ApiError::Unauthorized.is_unauthorized());
    }
}
