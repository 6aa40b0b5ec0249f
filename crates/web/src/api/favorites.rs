//! Favorite endpoints.

use morada_core::{Property, PropertyId};
use reqwest::Method;
use tracing::instrument;

use super::{ApiClient, ApiError};
use crate::models::AuthToken;

impl ApiClient {
    /// Favorited properties of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token))]
    pub async fn list_favorites(&self, token: &AuthToken) -> Result<Vec<Property>, ApiError> {
        self.execute(self.request(Method::GET, "/favorites", Some(token)))
            .await
    }

    /// Add a property to the favorites.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token))]
    pub async fn add_favorite(&self, token: &AuthToken, id: PropertyId) -> Result<(), ApiError> {
        self.execute_empty(self.request(Method::POST, &format!("/favorites/{id}"), Some(token)))
            .await
    }

    /// Remove a property from the favorites.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token))]
    pub async fn remove_favorite(&self, token: &AuthToken, id: PropertyId) -> Result<(), ApiError> {
        self.execute_empty(self.request(Method::DELETE, &format!("/favorites/{id}"), Some(token)))
            .await
    }
}
