//! Authentication extractors.
//!
//! Provides extractors for requiring a signed-in user in route handlers.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};

/// Sign-in page.
pub const LOGIN_PATH: &str = "/login";

/// Whether the request was issued by HTMX.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers.get("hx-request").is_some_and(|v| v == "true")
}

/// `/login?redirect=<path>`, with the path percent-encoded.
#[must_use]
pub fn login_url(return_to: &str) -> String {
    format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(return_to))
}

/// Only same-site relative paths are followed after sign-in.
#[must_use]
pub fn safe_redirect(target: Option<&str>) -> Option<&str> {
    target.filter(|t| t.starts_with('/') && !t.starts_with("//") && !t.starts_with("/\\"))
}

/// Send the visitor to sign in, coming back to `return_to` afterwards.
///
/// HTMX requests get an `HX-Redirect` header so the whole page navigates.
#[must_use]
pub fn login_redirect(return_to: &str, htmx: bool) -> Response {
    let url = login_url(return_to);
    if htmx {
        match HeaderValue::from_str(&url) {
            Ok(value) => ([("hx-redirect", value)], StatusCode::OK).into_response(),
            Err(_) => StatusCode::UNAUTHORIZED.into_response(),
        }
    } else {
        Redirect::to(&url).into_response()
    }
}

fn return_path(parts: &Parts) -> &str {
    parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str())
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Extractor that requires a signed-in user.
///
/// If nobody is signed in, redirects to the login page carrying the current
/// path.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Olá, {}!", user.first_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Rejection for signed-in-only pages.
pub struct AuthRejection {
    return_to: String,
    htmx: bool,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        login_redirect(&self.return_to, self.htmx)
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_user(parts)
            .await
            .map(Self)
            .ok_or_else(|| AuthRejection {
                return_to: return_path(parts).to_string(),
                htmx: is_htmx(&parts.headers),
            })
    }
}

/// Extractor that requires a verified broker.
///
/// Anonymous visitors go to the login page; signed-in users who cannot
/// publish go to their profile.
pub struct RequireBroker(pub CurrentUser);

/// Rejection for broker-only pages.
pub enum BrokerRejection {
    Login(AuthRejection),
    NotBroker,
}

impl IntoResponse for BrokerRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Login(rejection) => rejection.into_response(),
            Self::NotBroker => Redirect::to("/perfil").into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireBroker
where
    S: Send + Sync,
{
    type Rejection = BrokerRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state)
            .await
            .map_err(BrokerRejection::Login)?;
        if user.can_publish() {
            Ok(Self(user))
        } else {
            Err(BrokerRejection::NotBroker)
        }
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject anonymous visitors.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_encodes_return_path() {
        assert_eq!(
            login_url("/imoveis/12?x=1"),
            "/login?redirect=%2Fimoveis%2F12%3Fx%3D1"
        );
    }

    #[test]
    fn test_safe_redirect() {
        assert_eq!(safe_redirect(Some("/perfil")), Some("/perfil"));
        assert_eq!(safe_redirect(Some("//evil.example")), None);
        assert_eq!(safe_redirect(Some("https://evil.example")), None);
        assert_eq!(safe_redirect(None), None);
    }

    #[test]
    fn test_htmx_login_redirect_uses_header() {
        let response = login_redirect("/favoritos", true);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("hx-redirect").unwrap(),
            "/login?redirect=%2Ffavoritos"
        );

        let response = login_redirect("/favoritos", false);
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/login?redirect=%2Ffavoritos"
        );
    }
}
