//! Sign-up route handlers.
//!
//! # Routes
//!
//! ```text
//! GET  /cadastro             - Sign-up form, filled from the draft
//! POST /cadastro             - Submit the form
//! POST /cadastro/rascunho    - Save the draft (HTMX, on every change)
//! POST /cadastro/descartar   - Throw the draft away
//! GET  /cadastro/creci       - CRECI step (new broker or client upgrade)
//! POST /cadastro/creci       - Submit CRECI and documents (multipart)
//! GET  /cadastro/concluido   - Done
//! ```

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use morada_core::{
    Address, AuthData, CreciEntryDenied, CreciFlow, RegistrationDraft, RegistrationStep,
    UserType, ValidationErrors,
};
use serde::Deserialize;
use tracing::instrument;

use super::multipart::MultipartForm;
use crate::api::BrokerDocumentUpload;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{is_htmx, login_redirect};
use crate::page::{PageContext, SelectOption, state_options};
use crate::services::{
    AuthSession, IN_FLIGHT_MESSAGE, RegistrationService, SessionDraftStore, SignupForm,
    SubmitError,
};
use crate::state::AppState;

const SIGNUP_FORM: &str = "cadastro";
const CRECI_FORM: &str = "cadastro-creci";

// =============================================================================
// Form Types
// =============================================================================

/// The sign-up form as posted. Also the body of the HTMX draft save.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupFields {
    pub user_type: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub bairro: String,
    pub city: String,
    pub state: String,
    pub cep: String,
    pub creci: String,
    pub password: String,
    pub password_confirm: String,
}

impl SignupFields {
    fn user_type(&self) -> UserType {
        self.user_type.parse().unwrap_or_default()
    }

    /// Draft fields. The provider link is carried over by the draft itself.
    fn auth_data(&self) -> AuthData {
        AuthData {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: Address {
                street: self.street.clone(),
                number: self.number.clone(),
                complement: self.complement.clone(),
                bairro: self.bairro.clone(),
                city: self.city.clone(),
                state: self.state.clone(),
                cep: self.cep.clone(),
            },
            creci: self.creci.clone(),
            provider: None,
        }
    }

    fn into_signup(self) -> SignupForm {
        SignupForm {
            user_type: self.user_type(),
            auth_data: self.auth_data(),
            password: self.password,
            password_confirm: self.password_confirm,
        }
    }
}

// =============================================================================
// View Models
// =============================================================================

/// What the form shows. Passwords are never echoed back.
#[derive(Debug, Clone, Default)]
pub struct SignupView {
    pub is_broker: bool,
    pub data: AuthData,
    /// `Google` or `telefone` when a provider vouched for the visitor.
    pub provider: Option<&'static str>,
    /// The account exists; the form only amends the profile.
    pub account_created: bool,
}

impl SignupView {
    fn from_draft(draft: &RegistrationDraft) -> Self {
        Self {
            is_broker: draft.user_type == UserType::Broker,
            data: draft.auth_data.clone(),
            provider: draft.auth_data.provider.as_ref().map(|p| p.provider.label()),
            account_created: draft.account_created(),
        }
    }

    fn from_fields(fields: &SignupFields, draft: Option<&RegistrationDraft>) -> Self {
        let mut view = draft.map(Self::from_draft).unwrap_or_default();
        view.is_broker = fields.user_type() == UserType::Broker;
        let provider = view.data.provider.take();
        view.data = AuthData {
            provider,
            ..fields.auth_data()
        };
        view
    }

    #[must_use]
    pub const fn needs_password(&self) -> bool {
        self.data.needs_password() && !self.account_created
    }

    #[must_use]
    pub fn states(&self) -> Vec<SelectOption> {
        state_options(&self.data.address.state)
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Sign-up form template.
#[derive(Template, WebTemplate)]
#[template(path = "registration/form.html")]
pub struct SignupTemplate {
    pub page: PageContext,
    pub form: SignupView,
    pub errors: ValidationErrors,
    pub error: Option<String>,
}

/// CRECI step template.
#[derive(Template, WebTemplate)]
#[template(path = "registration/creci.html")]
pub struct CreciTemplate {
    pub page: PageContext,
    pub upgrade: bool,
    pub creci: String,
    pub errors: ValidationErrors,
    pub error: Option<String>,
}

/// Completed sign-up template.
#[derive(Template, WebTemplate)]
#[template(path = "registration/complete.html")]
pub struct CompleteTemplate {
    pub page: PageContext,
    pub broker: bool,
}

// =============================================================================
// Helpers
// =============================================================================

fn registration(auth: &AuthSession) -> RegistrationService<SessionDraftStore> {
    RegistrationService::new(SessionDraftStore::new(auth.session().clone()))
}

async fn load_draft(service: &RegistrationService<SessionDraftStore>) -> Option<RegistrationDraft> {
    service.hydrate().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to read registration draft");
        None
    })
}

/// Decide the mode of the CRECI step, or where to send the visitor instead.
async fn resolve_creci_flow(
    auth: &AuthSession,
    service: &RegistrationService<SessionDraftStore>,
    htmx: bool,
) -> Result<CreciFlow, Response> {
    let draft = load_draft(service).await;
    let user = auth.current_user().await;
    let signed_in = auth.is_signed_in().await;
    let broker_or_pending = user.as_ref().is_some_and(|u| u.broker_or_pending());

    CreciFlow::resolve(draft, signed_in, broker_or_pending).map_err(|denied| match denied {
        CreciEntryDenied::NotSignedIn { has_draft } => {
            tracing::debug!(has_draft, "CRECI step without a session");
            login_redirect(RegistrationStep::CreciVerification.path(), htmx)
        }
        CreciEntryDenied::AlreadyBroker => Redirect::to("/perfil").into_response(),
    })
}

// =============================================================================
// Sign-up Form
// =============================================================================

/// Display the sign-up form. A stored draft fills every field.
#[instrument(skip_all)]
pub async fn form_page(auth: AuthSession, page: PageContext) -> impl IntoResponse {
    let draft = load_draft(&registration(&auth)).await;
    SignupTemplate {
        page,
        form: draft.as_ref().map(SignupView::from_draft).unwrap_or_default(),
        errors: ValidationErrors::new(),
        error: None,
    }
}

/// Save the draft as the visitor types (HTMX).
#[instrument(skip_all)]
pub async fn save_draft(
    auth: AuthSession,
    Form(fields): Form<SignupFields>,
) -> Result<StatusCode, AppError> {
    registration(&auth)
        .save_fields(fields.user_type(), fields.auth_data(), Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Submit the sign-up form.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthSession,
    page: PageContext,
    Form(fields): Form<SignupFields>,
) -> Response {
    let service = registration(&auth);
    let owner = auth
        .submit_owner()
        .or_else(|| Some(fields.email.trim().to_ascii_lowercase()).filter(|e| !e.is_empty()));

    let Ok(_ticket) = state.submit_guard().try_begin(SIGNUP_FORM, owner.as_deref()) else {
        let draft = load_draft(&service).await;
        return SignupTemplate {
            page,
            form: SignupView::from_fields(&fields, draft.as_ref()),
            errors: ValidationErrors::new(),
            error: Some(IN_FLIGHT_MESSAGE.to_string()),
        }
        .into_response();
    };

    let echoed = SignupFields {
        password: String::new(),
        password_confirm: String::new(),
        ..fields.clone()
    };

    match service
        .submit(state.api(), &auth, fields.into_signup(), Utc::now())
        .await
    {
        Ok(outcome) => {
            tracing::info!(?outcome, "Sign-up form accepted");
            Redirect::to(outcome.redirect_path()).into_response()
        }
        Err(err) => {
            if !matches!(err, SubmitError::Invalid(_)) {
                tracing::warn!(error = %err, "Sign-up failed");
            }
            let draft = load_draft(&service).await;
            SignupTemplate {
                page,
                form: SignupView::from_fields(&echoed, draft.as_ref()),
                error: Some(err.user_message()),
                errors: match err {
                    SubmitError::Invalid(errors) => errors,
                    _ => ValidationErrors::new(),
                },
            }
            .into_response()
        }
    }
}

/// Throw the draft away and start over.
#[instrument(skip_all)]
pub async fn discard(auth: AuthSession) -> Result<Redirect, AppError> {
    registration(&auth).discard().await?;
    Ok(Redirect::to(RegistrationStep::Form.path()))
}

// =============================================================================
// CRECI Step
// =============================================================================

/// Display the CRECI step.
#[instrument(skip_all)]
pub async fn creci_page(
    auth: AuthSession,
    page: PageContext,
    headers: HeaderMap,
) -> Response {
    let service = registration(&auth);
    let flow = match resolve_creci_flow(&auth, &service, is_htmx(&headers)).await
    {
        Ok(flow) => flow,
        Err(response) => return response,
    };

    let creci = match &flow {
        CreciFlow::Registration(draft) => draft.auth_data.creci.clone(),
        CreciFlow::Upgrade => String::new(),
    };
    CreciTemplate {
        page,
        upgrade: flow.is_upgrade(),
        creci,
        errors: ValidationErrors::new(),
        error: None,
    }
    .into_response()
}

/// Submit CRECI and the verification documents.
#[instrument(skip_all)]
pub async fn submit_creci(
    State(state): State<AppState>,
    auth: AuthSession,
    page: PageContext,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let service = registration(&auth);
    let flow = match resolve_creci_flow(&auth, &service, is_htmx(&headers)).await
    {
        Ok(flow) => flow,
        Err(response) => return Ok(response),
    };

    let mut form = MultipartForm::read(multipart).await?;
    let creci = form.text("creci").to_string();
    let render = |page, errors, error| CreciTemplate {
        page,
        upgrade: flow.is_upgrade(),
        creci: creci.clone(),
        errors,
        error,
    };

    let owner = auth.submit_owner();
    let Ok(_ticket) = state.submit_guard().try_begin(CRECI_FORM, owner.as_deref()) else {
        return Ok(render(
            page,
            ValidationErrors::new(),
            Some(IN_FLIGHT_MESSAGE.to_string()),
        )
        .into_response());
    };

    let documents = BrokerDocumentUpload {
        creci_front: form.take_file("creci_front"),
        creci_back: form.take_file("creci_back"),
        selfie: form.take_file("selfie"),
    };

    match service
        .submit_creci(state.api(), &auth, &flow, &creci, documents)
        .await
    {
        Ok(next) => Ok(Redirect::to(next).into_response()),
        Err(SubmitError::SignInRequired) => Ok(login_redirect(
            RegistrationStep::CreciVerification.path(),
            is_htmx(&headers),
        )),
        Err(err) => {
            if !matches!(err, SubmitError::Invalid(_)) {
                tracing::warn!(error = %err, "CRECI step failed");
            }
            let message = err.user_message();
            let errors = match err {
                SubmitError::Invalid(errors) => errors,
                _ => ValidationErrors::new(),
            };
            Ok(render(page, errors, Some(message)).into_response())
        }
    }
}

/// Display the completion page.
pub async fn complete(auth: AuthSession, page: PageContext) -> impl IntoResponse {
    let broker = auth
        .current_user()
        .await
        .is_some_and(|user| user.broker_or_pending());
    CompleteTemplate { page, broker }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use morada_core::{AuthProvider, ProviderLink};

    use super::*;

    fn fields() -> SignupFields {
        SignupFields {
            user_type: "broker".into(),
            name: "Ana Souza".into(),
            email: "ana@exemplo.com".into(),
            city: "Recife".into(),
            state: "pe".into(),
            password: "segredo123".into(),
            password_confirm: "segredo123".into(),
            ..SignupFields::default()
        }
    }

    #[test]
    fn test_fields_map_to_draft_data() {
        let form = fields().into_signup();
        assert_eq!(form.user_type, UserType::Broker);
        assert_eq!(form.auth_data.address.city, "Recife");
        assert!(form.auth_data.provider.is_none());
        assert_eq!(form.password, "segredo123");
    }

    #[test]
    fn test_unknown_user_type_is_client() {
        let fields = SignupFields {
            user_type: "admin".into(),
            ..SignupFields::default()
        };
        assert_eq!(fields.user_type(), UserType::Client);
    }

    #[test]
    fn test_view_keeps_provider_from_draft() {
        let draft = RegistrationDraft::from_provider(
            ProviderLink {
                provider: AuthProvider::Phone,
                id_token: "tok".into(),
            },
            None,
            None,
            Some("(11) 98765-4321".into()),
            Utc::now(),
        );
        let view = SignupView::from_fields(&fields(), Some(&draft));
        assert_eq!(view.provider, Some("telefone"));
        assert!(!view.needs_password());
        assert!(view.is_broker);
        assert_eq!(view.data.name, "Ana Souza");
        assert!(view.states().iter().any(|o| o.value == "PE" && o.selected));
    }

    #[test]
    fn test_view_without_draft_needs_password() {
        let view = SignupView::from_fields(&fields(), None);
        assert!(view.needs_password());
        assert!(view.provider.is_none());
    }
}
