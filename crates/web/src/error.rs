//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. Route handlers return `Result<T, AppError>` for
//! failures they do not render inline.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::ApiError;
use crate::identity::IdentityError;
use crate::services::{AuthSessionError, DraftStoreError};

/// Application-level error type for the portal.
#[derive(Debug, Error)]
pub enum AppError {
    /// Listings backend call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Identity provider call failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthSessionError> for AppError {
    fn from(err: AuthSessionError) -> Self {
        match err {
            AuthSessionError::Session(e) => Self::Session(e),
            AuthSessionError::NotSignedIn => Self::Unauthorized("not signed in".to_string()),
            AuthSessionError::Api(e) => Self::Api(e),
        }
    }
}

impl From<DraftStoreError> for AppError {
    fn from(err: DraftStoreError) -> Self {
        match err {
            DraftStoreError::Session(e) => Self::Session(e),
            DraftStoreError::Serde(e) => Self::Internal(e.to_string()),
        }
    }
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        match self {
            Self::Api(err) => matches!(
                err,
                ApiError::Network(_) | ApiError::Api { .. } | ApiError::Decode(_)
            ),
            Self::Identity(err) => matches!(err, IdentityError::Http(_) | IdentityError::Parse(_)),
            Self::Session(_) | Self::Internal(_) => true,
            Self::NotFound(_) | Self::Unauthorized(_) | Self::BadRequest(_) => false,
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::Api(err) => match err {
                ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
                ApiError::NotFound => StatusCode::NOT_FOUND,
                ApiError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
                ApiError::Network(_) | ApiError::Api { .. } | ApiError::Decode(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::Identity(err) => match err {
                IdentityError::Disabled => StatusCode::NOT_FOUND,
                IdentityError::Provider(_) => StatusCode::UNAUTHORIZED,
                IdentityError::Http(_) | IdentityError::Parse(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Api(err) => err.user_message(),
            Self::Identity(err) => err.user_message().to_string(),
            Self::Session(_) | Self::Internal(_) => {
                "Erro interno. Tente novamente em instantes.".to_string()
            }
            Self::NotFound(_) => "Página não encontrada.".to_string(),
            Self::Unauthorized(_) => "Entre na sua conta para continuar.".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        };

        (self.status(), message).into_response()
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("favorites", "Toggled favorite", Some(&[("property_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("imovel-123".to_string());
        assert_eq!(err.to_string(), "Not found: imovel-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Api(ApiError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Api(ApiError::Api {
                status: 500,
                message: String::new()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Identity(IdentityError::Provider("INVALID_CODE".into()))),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::from(AuthSessionError::NotSignedIn)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
