//! Per-request authentication state.
//!
//! [`AuthSession`] is the single place that reads and writes who is signed
//! in. `sign_in` and `sign_out` are the only init and teardown points; the
//! favorite set is loaded at sign-in and kept in step with the backend by
//! [`AuthSession::toggle_favorite`].

use std::collections::BTreeSet;

use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};
use morada_core::{PropertyId, User};
use thiserror::Error;
use tower_sessions::Session;

use crate::api::{ApiClient, ApiError, AuthResponse};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::{AuthToken, CurrentUser, session_keys};

/// Errors from session-backed authentication state.
#[derive(Debug, Error)]
pub enum AuthSessionError {
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("not signed in")]
    NotSignedIn,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Authentication state of the current visitor.
#[derive(Clone)]
pub struct AuthSession {
    session: Session,
}

impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        Ok(Self::new(session))
    }
}

impl AuthSession {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// The underlying session, for other per-visitor state.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Key of this visitor for the double-submit guard, once the session
    /// has been stored and has an id.
    #[must_use]
    pub fn submit_owner(&self) -> Option<String> {
        self.session.id().map(|id| id.to_string())
    }

    pub async fn current_user(&self) -> Option<CurrentUser> {
        self.session
            .get(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
    }

    pub async fn token(&self) -> Option<AuthToken> {
        self.session
            .get(session_keys::AUTH_TOKEN)
            .await
            .ok()
            .flatten()
    }

    pub async fn is_signed_in(&self) -> bool {
        self.token().await.is_some()
    }

    /// Token of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `AuthSessionError::NotSignedIn` for anonymous visitors.
    pub async fn require_token(&self) -> Result<AuthToken, AuthSessionError> {
        self.token().await.ok_or(AuthSessionError::NotSignedIn)
    }

    /// Start an authenticated session from a backend sign-in.
    ///
    /// Rotates the session id, stores token and user, and loads the
    /// favorite set. A failed favorites load leaves the set unknown; it is
    /// loaded again on the first toggle.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn sign_in(
        &self,
        api: &ApiClient,
        response: AuthResponse,
    ) -> Result<CurrentUser, AuthSessionError> {
        self.session.cycle_id().await?;

        let current = CurrentUser::from(&response.user);
        self.session
            .insert(session_keys::AUTH_TOKEN, &response.token)
            .await?;
        self.session
            .insert(session_keys::CURRENT_USER, &current)
            .await?;

        match api.list_favorites(&response.token).await {
            Ok(properties) => {
                let favorites: BTreeSet<PropertyId> =
                    properties.into_iter().map(|p| p.id).collect();
                self.store_favorites(&favorites).await?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load favorites at sign-in");
                self.forget_favorites().await?;
            }
        }

        set_sentry_user(&current.id, Some(&current.email));
        tracing::info!(user_id = %current.id, "Signed in");
        Ok(current)
    }

    /// End the session. Everything stored for the visitor is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be deleted.
    pub async fn sign_out(&self) -> Result<(), AuthSessionError> {
        self.session.flush().await?;
        clear_sentry_user();
        Ok(())
    }

    /// Replace the user snapshot after a profile change.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn refresh_user(&self, user: &User) -> Result<CurrentUser, AuthSessionError> {
        let current = CurrentUser::from(user);
        self.session
            .insert(session_keys::CURRENT_USER, &current)
            .await?;
        Ok(current)
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Favorite ids for display. Empty while the set is unknown.
    pub async fn favorites(&self) -> BTreeSet<PropertyId> {
        self.known_favorites().await.unwrap_or_default()
    }

    /// The stored set, or `None` if it was never loaded.
    pub async fn known_favorites(&self) -> Option<BTreeSet<PropertyId>> {
        self.session
            .get(session_keys::FAVORITES)
            .await
            .ok()
            .flatten()
    }

    async fn forget_favorites(&self) -> Result<(), AuthSessionError> {
        self.session
            .remove::<BTreeSet<PropertyId>>(session_keys::FAVORITES)
            .await?;
        Ok(())
    }

    pub async fn is_favorite(&self, id: PropertyId) -> bool {
        self.favorites().await.contains(&id)
    }

    async fn store_favorites(&self, favorites: &BTreeSet<PropertyId>) -> Result<(), AuthSessionError> {
        self.session
            .insert(session_keys::FAVORITES, favorites)
            .await?;
        Ok(())
    }

    /// Flip the favorite state of a property and return the new state.
    ///
    /// An unknown set is loaded from the backend first. The local set then
    /// changes; if the backend call fails the change is rolled back and the
    /// error returned.
    ///
    /// # Errors
    ///
    /// Returns `AuthSessionError::NotSignedIn` without calling the backend
    /// for anonymous visitors, or the backend error after rolling back.
    pub async fn toggle_favorite(
        &self,
        api: &ApiClient,
        id: PropertyId,
    ) -> Result<bool, AuthSessionError> {
        let token = self.require_token().await?;

        let mut favorites = match self.known_favorites().await {
            Some(favorites) => favorites,
            None => api
                .list_favorites(&token)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect(),
        };
        let now_favorite = !favorites.contains(&id);
        if now_favorite {
            favorites.insert(id);
        } else {
            favorites.remove(&id);
        }
        self.store_favorites(&favorites).await?;

        let result = if now_favorite {
            api.add_favorite(&token, id).await
        } else {
            api.remove_favorite(&token, id).await
        };

        if let Err(e) = result {
            tracing::warn!(property_id = %id, error = %e, "Favorite toggle failed, rolling back");
            if now_favorite {
                favorites.remove(&id);
            } else {
                favorites.insert(id);
            }
            self.store_favorites(&favorites).await?;
            return Err(e.into());
        }

        Ok(now_favorite)
    }

    // =========================================================================
    // Flash messages
    // =========================================================================

    /// Queue a message for the next rendered page.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn set_flash(&self, message: &str) -> Result<(), AuthSessionError> {
        self.session.insert(session_keys::FLASH, message).await?;
        Ok(())
    }

    /// Take the queued message, if any.
    pub async fn take_flash(&self) -> Option<String> {
        self.session
            .remove::<String>(session_keys::FLASH)
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::ApiConfig;

    fn unreachable_api() -> ApiClient {
        // Nothing listens on port 9 locally; any call fails fast.
        ApiClient::new(&ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
        })
        .unwrap()
    }

    fn auth() -> AuthSession {
        AuthSession::new(Session::new(None, Arc::new(MemoryStore::default()), None))
    }

    #[tokio::test]
    async fn test_anonymous_toggle_is_rejected() {
        let auth = auth();
        let err = auth
            .toggle_favorite(&unreachable_api(), PropertyId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthSessionError::NotSignedIn));
        assert!(auth.favorites().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_toggle_rolls_back() {
        let auth = auth();
        auth.session()
            .insert(session_keys::AUTH_TOKEN, AuthToken::new("jwt"))
            .await
            .unwrap();
        auth.store_favorites(&BTreeSet::from([PropertyId::new(7)]))
            .await
            .unwrap();

        let err = auth
            .toggle_favorite(&unreachable_api(), PropertyId::new(7))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthSessionError::Api(ApiError::Network(_))));
        assert!(auth.is_favorite(PropertyId::new(7)).await);
    }

    #[tokio::test]
    async fn test_toggle_with_unknown_set_needs_a_reload() {
        let auth = auth();
        auth.session()
            .insert(session_keys::AUTH_TOKEN, AuthToken::new("jwt"))
            .await
            .unwrap();
        assert!(auth.known_favorites().await.is_none());

        let err = auth
            .toggle_favorite(&unreachable_api(), PropertyId::new(3))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthSessionError::Api(ApiError::Network(_))));
        assert!(auth.known_favorites().await.is_none());
    }

    #[tokio::test]
    async fn test_flash_is_taken_once() {
        let auth = auth();
        auth.set_flash("Perfil atualizado").await.unwrap();
        assert_eq!(auth.take_flash().await.as_deref(), Some("Perfil atualizado"));
        assert_eq!(auth.take_flash().await, None);
    }
}
