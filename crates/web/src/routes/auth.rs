//! Authentication route handlers.
//!
//! E-mail and password sign-in goes straight to the listings backend.
//! Google and phone sign-in first verify the visitor with the identity
//! provider, then exchange its ID token with the backend. When the backend
//! has no account for that identity, a registration draft is seeded from the
//! provider profile and the visitor continues on `/cadastro`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use morada_core::validation::{self, messages};
use morada_core::{Phone, RegistrationStep, ValidationErrors};
use serde::Deserialize;
use tower_sessions::cookie::Cookie;
use tracing::instrument;

use crate::filters;
use crate::identity::IdentityProfile;
use crate::middleware::safe_redirect;
use crate::models::{PhoneVerification, session_keys};
use crate::page::PageContext;
use crate::services::{AuthSession, RegistrationService, SessionDraftStore};
use crate::state::AppState;

/// Cookie the Google sign-in button sets next to the posted credential.
const GOOGLE_CSRF_COOKIE: &str = "g_csrf_token";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub redirect: Option<String>,
}

/// Credential posted by the Google sign-in button.
#[derive(Debug, Deserialize)]
pub struct GoogleForm {
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub g_csrf_token: String,
}

/// Phone number form data.
#[derive(Debug, Deserialize)]
pub struct PhoneForm {
    #[serde(default)]
    pub phone: String,
    pub recaptcha_token: Option<String>,
    pub redirect: Option<String>,
}

/// Texted code form data.
#[derive(Debug, Deserialize)]
pub struct CodeForm {
    #[serde(default)]
    pub code: String,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    #[serde(default)]
    pub email: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Where to return after signing in.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    pub redirect: Option<String>,
}

impl RedirectQuery {
    fn target(&self) -> String {
        safe_redirect(self.redirect.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub error: Option<String>,
    pub email: String,
    /// Safe return path, empty for the default.
    pub redirect: String,
    pub google_client_id: Option<String>,
    /// Where the Google button posts its credential.
    pub google_login_uri: String,
    pub phone_enabled: bool,
}

/// Phone number entry template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/phone.html")]
pub struct PhoneTemplate {
    pub page: PageContext,
    pub error: Option<String>,
    pub phone: String,
    pub redirect: String,
}

/// Texted code entry template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/phone_verify.html")]
pub struct PhoneVerifyTemplate {
    pub page: PageContext,
    pub error: Option<String>,
    pub phone: String,
}

/// Forgot password template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub page: PageContext,
    pub error: Option<String>,
    pub sent: bool,
    pub email: String,
}

// =============================================================================
// Helpers
// =============================================================================

fn login_template(
    state: &AppState,
    page: PageContext,
    redirect: String,
    email: String,
    error: Option<String>,
) -> LoginTemplate {
    let google_login_uri = if redirect.is_empty() {
        format!("{}/login/google", state.config().base_url)
    } else {
        format!(
            "{}/login/google?redirect={}",
            state.config().base_url,
            urlencoding::encode(&redirect)
        )
    };
    LoginTemplate {
        page,
        error,
        email,
        redirect,
        google_client_id: state.identity().google_client_id().map(str::to_string),
        google_login_uri,
        phone_enabled: state.identity().is_enabled(),
    }
}

/// Whether the Google double-submit token in the form matches its cookie.
fn google_csrf_matches(headers: &HeaderMap, form_token: &str) -> bool {
    if form_token.is_empty() {
        return false;
    }
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .any(|cookie| cookie.name() == GOOGLE_CSRF_COOKIE && cookie.value() == form_token)
}

fn signed_in_target(redirect: Option<&str>) -> String {
    safe_redirect(redirect).unwrap_or("/").to_string()
}

/// Finish a provider sign-in: exchange the ID token, or start a sign-up.
async fn complete_provider_sign_in(
    state: &AppState,
    auth: &AuthSession,
    profile: &IdentityProfile,
    redirect: Option<&str>,
) -> Result<Response, String> {
    match state
        .api()
        .provider_login(profile.provider, &profile.id_token)
        .await
    {
        Ok(Some(response)) => {
            auth.sign_in(state.api(), response).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to store session after provider sign-in");
                "Não foi possível entrar. Tente novamente.".to_string()
            })?;
            Ok(Redirect::to(&signed_in_target(redirect)).into_response())
        }
        Ok(None) => {
            tracing::info!(provider = ?profile.provider, "No account for provider identity; starting sign-up");
            let registration = RegistrationService::new(SessionDraftStore::new(auth.session().clone()));
            if let Err(e) = registration.begin_from_provider(profile, Utc::now()).await {
                tracing::error!(error = %e, "Failed to seed registration draft");
                return Err("Não foi possível iniciar seu cadastro. Tente novamente.".to_string());
            }
            if let Err(e) = auth
                .set_flash(&format!(
                    "Confirmamos sua identidade pelo {}. Complete seu cadastro para continuar.",
                    profile.provider.label()
                ))
                .await
            {
                tracing::warn!(error = %e, "Failed to set flash message");
            }
            Ok(Redirect::to(RegistrationStep::Form.path()).into_response())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Provider login failed");
            Err(e.user_message())
        }
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<RedirectQuery>,
) -> impl IntoResponse {
    login_template(&state, page, query.target(), String::new(), None)
}

/// Handle e-mail and password sign-in.
#[instrument(skip(state, auth, page, form))]
pub async fn login(
    State(state): State<AppState>,
    auth: AuthSession,
    page: PageContext,
    Form(form): Form<LoginForm>,
) -> Response {
    let redirect = safe_redirect(form.redirect.as_deref())
        .unwrap_or_default()
        .to_string();
    let email = form.email.trim().to_ascii_lowercase();

    if email.is_empty() || form.password.is_empty() {
        return login_template(
            &state,
            page,
            redirect,
            email,
            Some("Informe e-mail e senha.".to_string()),
        )
        .into_response();
    }

    match state.api().login(&email, &form.password).await {
        Ok(response) => match auth.sign_in(state.api(), response).await {
            Ok(_) => Redirect::to(&signed_in_target(Some(&redirect))).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to store session after login");
                login_template(
                    &state,
                    page,
                    redirect,
                    email,
                    Some("Não foi possível entrar. Tente novamente.".to_string()),
                )
                .into_response()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            let message = if e.is_unauthorized() {
                "E-mail ou senha incorretos.".to_string()
            } else {
                e.user_message()
            };
            login_template(&state, page, redirect, email, Some(message)).into_response()
        }
    }
}

/// Handle the credential posted by the Google sign-in button.
#[instrument(skip_all)]
pub async fn google(
    State(state): State<AppState>,
    auth: AuthSession,
    page: PageContext,
    headers: HeaderMap,
    Query(query): Query<RedirectQuery>,
    Form(form): Form<GoogleForm>,
) -> Response {
    let redirect = query.target();
    let fail = |page, message: &str| {
        login_template(&state, page, redirect.clone(), String::new(), Some(message.to_string()))
            .into_response()
    };

    if !google_csrf_matches(&headers, &form.g_csrf_token) {
        tracing::warn!("Google sign-in rejected: CSRF token mismatch");
        return fail(page, "Não foi possível confirmar sua identidade.");
    }

    let profile = match state.identity().sign_in_with_google(&form.credential).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "Google sign-in failed");
            return fail(page, e.user_message());
        }
    };

    match complete_provider_sign_in(&state, &auth, &profile, Some(&redirect)).await {
        Ok(response) => response,
        Err(message) => fail(page, &message),
    }
}

// =============================================================================
// Phone Sign-in Routes
// =============================================================================

/// Display the phone number form.
pub async fn phone_page(page: PageContext, Query(query): Query<RedirectQuery>) -> impl IntoResponse {
    PhoneTemplate {
        page,
        error: None,
        phone: String::new(),
        redirect: query.target(),
    }
}

/// Text a verification code.
#[instrument(skip_all)]
pub async fn send_phone_code(
    State(state): State<AppState>,
    auth: AuthSession,
    page: PageContext,
    Form(form): Form<PhoneForm>,
) -> Response {
    let redirect = safe_redirect(form.redirect.as_deref())
        .unwrap_or_default()
        .to_string();
    let retry = |page, error: &str| {
        PhoneTemplate {
            page,
            error: Some(error.to_string()),
            phone: form.phone.clone(),
            redirect: redirect.clone(),
        }
        .into_response()
    };

    let Ok(phone) = Phone::parse(&form.phone) else {
        return retry(page, messages::PHONE_INVALID);
    };

    let session_info = match state
        .identity()
        .send_verification_code(&phone, form.recaptcha_token.as_deref())
        .await
    {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to send phone code");
            return retry(page, e.user_message());
        }
    };

    let pending = PhoneVerification {
        phone: phone.formatted(),
        session_info,
        sent_at: Utc::now(),
        redirect: (!redirect.is_empty()).then(|| redirect.clone()),
    };
    if let Err(e) = auth
        .session()
        .insert(session_keys::PHONE_VERIFICATION, &pending)
        .await
    {
        tracing::error!(error = %e, "Failed to store phone verification");
        return retry(page, "Não foi possível enviar o código. Tente novamente.");
    }

    Redirect::to("/login/telefone/verificar").into_response()
}

async fn pending_verification(auth: &AuthSession) -> Option<PhoneVerification> {
    auth.session()
        .get(session_keys::PHONE_VERIFICATION)
        .await
        .ok()
        .flatten()
}

/// Display the code form.
pub async fn verify_page(auth: AuthSession, page: PageContext) -> Response {
    match pending_verification(&auth).await {
        Some(pending) => PhoneVerifyTemplate {
            page,
            error: None,
            phone: pending.phone,
        }
        .into_response(),
        None => Redirect::to("/login/telefone").into_response(),
    }
}

/// Confirm the texted code and sign in.
#[instrument(skip_all)]
pub async fn verify_phone_code(
    State(state): State<AppState>,
    auth: AuthSession,
    page: PageContext,
    Form(form): Form<CodeForm>,
) -> Response {
    let Some(pending) = pending_verification(&auth).await else {
        return Redirect::to("/login/telefone").into_response();
    };
    let retry = |page, error: &str| {
        PhoneVerifyTemplate {
            page,
            error: Some(error.to_string()),
            phone: pending.phone.clone(),
        }
        .into_response()
    };

    if form.code.trim().is_empty() {
        return retry(page, "Informe o código recebido.");
    }

    let profile = match state
        .identity()
        .verify_phone_code(&pending.session_info, &form.code)
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "Phone code rejected");
            return retry(page, e.user_message());
        }
    };

    if let Err(e) = auth
        .session()
        .remove_value(session_keys::PHONE_VERIFICATION)
        .await
    {
        tracing::warn!(error = %e, "Failed to clear phone verification");
    }

    match complete_provider_sign_in(&state, &auth, &profile, pending.redirect.as_deref()).await {
        Ok(response) => response,
        Err(message) => retry(page, &message),
    }
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
pub async fn forgot_password_page(page: PageContext) -> impl IntoResponse {
    ForgotPasswordTemplate {
        page,
        error: None,
        sent: false,
        email: String::new(),
    }
}

/// Ask the backend for a reset e-mail.
///
/// Always reports success for a well-formed address so the page cannot be
/// used to probe which e-mails have accounts.
#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    page: PageContext,
    Form(form): Form<ForgotPasswordForm>,
) -> impl IntoResponse {
    let mut errors = ValidationErrors::new();
    let Some(email) = validation::check_email(&form.email, &mut errors) else {
        return ForgotPasswordTemplate {
            page,
            error: errors.first().map(str::to_string),
            sent: false,
            email: form.email,
        };
    };

    if let Err(e) = state.api().forgot_password(email.as_str()).await {
        tracing::warn!(error = %e, "Password recovery request failed");
    }

    ForgotPasswordTemplate {
        page,
        error: None,
        sent: true,
        email: email.into_inner(),
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout. The whole session is dropped, drafts included.
pub async fn logout(auth: AuthSession) -> Redirect {
    if let Err(e) = auth.sign_out().await {
        tracing::error!(error = %e, "Failed to clear session");
    }
    Redirect::to("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_google_csrf_requires_matching_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("morada_session=abc; g_csrf_token=t0k3n"),
        );
        assert!(google_csrf_matches(&headers, "t0k3n"));
        assert!(!google_csrf_matches(&headers, "other"));
        assert!(!google_csrf_matches(&headers, ""));
        assert!(!google_csrf_matches(&HeaderMap::new(), "t0k3n"));
    }

    #[test]
    fn test_signed_in_target_rejects_offsite() {
        assert_eq!(signed_in_target(Some("/favoritos")), "/favoritos");
        assert_eq!(signed_in_target(Some("https://evil.example")), "/");
        assert_eq!(signed_in_target(Some("//evil.example")), "/");
        assert_eq!(signed_in_target(None), "/");
    }

    #[test]
    fn test_redirect_query_target() {
        let query = RedirectQuery {
            redirect: Some("/imoveis/3".to_string()),
        };
        assert_eq!(query.target(), "/imoveis/3");
        assert_eq!(RedirectQuery::default().target(), "");
    }
}
