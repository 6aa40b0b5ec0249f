//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The session is
//! the portal's only server-side storage: sign-in state, favorites and the
//! registration draft all live in it.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::PortalConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "morada_session";

/// Session expiry time in seconds (30 days).
const SESSION_EXPIRY_SECONDS: i64 = 30 * 24 * 60 * 60;

/// The session secret could not be turned into a signing key.
#[derive(Debug, thiserror::Error)]
#[error("session secret is not a valid signing key: {0}")]
pub struct SessionKeyError(String);

/// Create a `PostgreSQL` connection pool for the session store.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Signing key derived from the configured secret.
///
/// # Errors
///
/// Returns an error if the secret is shorter than 64 bytes.
pub fn signing_key(secret: &SecretString) -> Result<Key, SessionKeyError> {
    Key::try_from(secret.expose_secret().as_bytes()).map_err(|e| SessionKeyError(e.to_string()))
}

/// Session layer over any store, with the portal's cookie settings.
#[must_use]
pub fn session_layer<S: SessionStore + Clone>(
    store: S,
    key: Key,
    secure: bool,
) -> SessionManagerLayer<S, SignedCookie> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key)
}

/// Create the session layer with the `PostgreSQL` store.
///
/// Creates the sessions table if it does not exist yet.
///
/// # Errors
///
/// Returns an error if the migration fails or the secret is unusable.
pub async fn create_session_layer(
    pool: &PgPool,
    config: &PortalConfig,
) -> Result<SessionManagerLayer<PostgresStore, SignedCookie>, Box<dyn std::error::Error>> {
    let store = PostgresStore::new(pool.clone());
    store.migrate().await?;

    let key = signing_key(&config.session_secret)?;
    Ok(session_layer(store, key, config.is_secure()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_needs_64_bytes() {
        assert!(signing_key(&SecretString::from("x".repeat(32))).is_err());
        assert!(signing_key(&SecretString::from("k".repeat(64))).is_ok());
    }
}
