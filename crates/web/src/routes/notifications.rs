//! In-app notifications.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use morada_core::{Notification, NotificationId};
use tracing::instrument;

use crate::api::ApiError;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAuth, is_htmx, login_redirect, safe_redirect};
use crate::page::PageContext;
use crate::services::AuthSession;
use crate::state::AppState;

const NOTIFICATIONS_PATH: &str = "/notificacoes";

/// A notification row.
#[derive(Debug, Clone)]
pub struct NotificationView {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    /// Same-site link only.
    pub link: Option<String>,
    pub read: bool,
    /// `05/03/2025 14:30`
    pub when: String,
}

impl From<&Notification> for NotificationView {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            link: safe_redirect(notification.link.as_deref()).map(str::to_string),
            read: notification.read,
            when: notification.created_at.format("%d/%m/%Y %H:%M").to_string(),
        }
    }
}

impl NotificationView {
    #[must_use]
    pub fn read_action(&self) -> String {
        format!("{NOTIFICATIONS_PATH}/{}/lida", self.id)
    }
}

/// Notifications page template.
#[derive(Template, WebTemplate)]
#[template(path = "notifications/index.html")]
pub struct NotificationsTemplate {
    pub page: PageContext,
    pub notifications: Vec<NotificationView>,
    pub unread: usize,
    pub error: Option<String>,
}

/// Notification row fragment (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/notification.html")]
pub struct NotificationTemplate {
    pub notification: NotificationView,
}

/// List notifications, newest first.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    auth: AuthSession,
    RequireAuth(_current): RequireAuth,
    page: PageContext,
) -> Result<Response, AppError> {
    let token = auth.require_token().await?;

    let (notifications, error) = match state.api().list_notifications(&token).await {
        Ok(list) => (list.iter().map(NotificationView::from).collect::<Vec<_>>(), None),
        Err(e) if e.is_unauthorized() => {
            auth.sign_out().await?;
            return Ok(login_redirect(NOTIFICATIONS_PATH, false));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list notifications");
            (Vec::new(), Some(e.user_message()))
        }
    };
    let unread = notifications.iter().filter(|n| !n.read).count();

    Ok(NotificationsTemplate {
        page,
        notifications,
        unread,
        error,
    }
    .into_response())
}

/// Mark a notification as read.
///
/// HTMX requests get the updated row; plain posts go back to the list.
#[instrument(skip(state, auth, headers))]
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthSession,
    RequireAuth(_current): RequireAuth,
    headers: HeaderMap,
    Path(id): Path<NotificationId>,
) -> Result<Response, AppError> {
    let token = auth.require_token().await?;
    let htmx = is_htmx(&headers);
    if let Err(e) = state.api().mark_notification_read(&token, id).await {
        return mark_read_failed(&auth, &e, htmx).await;
    }

    if !htmx {
        return Ok(Redirect::to(NOTIFICATIONS_PATH).into_response());
    }

    // The backend has no single-notification endpoint; re-read the list.
    let list = match state.api().list_notifications(&token).await {
        Ok(list) => list,
        Err(e) => return mark_read_failed(&auth, &e, htmx).await,
    };
    let notification = list
        .iter()
        .find(|n| n.id == id)
        .map(NotificationView::from)
        .ok_or_else(|| AppError::NotFound(format!("notification {id}")))?;
    Ok(NotificationTemplate { notification }.into_response())
}

/// A failed mark-read leaves the row as it is.
async fn mark_read_failed(
    auth: &AuthSession,
    e: &ApiError,
    htmx: bool,
) -> Result<Response, AppError> {
    if e.is_unauthorized() {
        auth.sign_out().await?;
        return Ok(login_redirect(NOTIFICATIONS_PATH, htmx));
    }
    tracing::warn!(error = %e, "Failed to mark notification as read");
    if htmx {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    auth.set_flash(&e.user_message()).await?;
    Ok(Redirect::to(NOTIFICATIONS_PATH).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_view_drops_external_links() {
        let notification: Notification = serde_json::from_value(serde_json::json!({
            "id": 3,
            "title": "Anúncio aprovado",
            "link": "https://phishing.example/",
            "created_at": "2025-03-05T14:30:00Z"
        }))
        .unwrap();
        let view = NotificationView::from(&notification);
        assert_eq!(view.link, None);
        assert_eq!(view.when, "05/03/2025 14:30");
        assert_eq!(view.read_action(), "/notificacoes/3/lida");
        assert!(!view.read);
    }
}
