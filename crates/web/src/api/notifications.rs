//! Notification endpoints.

use morada_core::{Notification, NotificationId};
use reqwest::Method;
use tracing::instrument;

use super::{ApiClient, ApiError};
use crate::models::AuthToken;

impl ApiClient {
    /// Notifications of the signed-in user, newest first.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token))]
    pub async fn list_notifications(
        &self,
        token: &AuthToken,
    ) -> Result<Vec<Notification>, ApiError> {
        self.execute(self.request(Method::GET, "/notifications", Some(token)))
            .await
    }

    /// Mark one notification as read.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token))]
    pub async fn mark_notification_read(
        &self,
        token: &AuthToken,
        id: NotificationId,
    ) -> Result<(), ApiError> {
        self.execute_empty(self.request(
            Method::PATCH,
            &format!("/notifications/{id}/read"),
            Some(token),
        ))
        .await
    }
}
