//! Profile page: view and edit the signed-in account.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use morada_core::validation;
use morada_core::{Address, BrokerStatus, Phone, User, UserType, ValidationErrors};
use serde::Deserialize;
use tracing::instrument;

use crate::api::ProfileUpdate;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAuth, login_redirect};
use crate::models::CurrentUser;
use crate::page::{PageContext, SelectOption, state_options};
use crate::services::{AuthSession, IN_FLIGHT_MESSAGE};
use crate::state::AppState;

const PROFILE_FORM: &str = "perfil";

// =============================================================================
// Form Types
// =============================================================================

/// Profile form data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileFields {
    pub name: String,
    pub phone: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub bairro: String,
    pub city: String,
    pub state: String,
    pub cep: String,
}

impl ProfileFields {
    fn from_user(user: &User) -> Self {
        let address = &user.address;
        Self {
            name: user.name.clone(),
            phone: user.phone.clone().unwrap_or_default(),
            street: address.street.clone(),
            number: address.number.clone(),
            complement: address.complement.clone(),
            bairro: address.bairro.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            cep: address.cep.clone(),
        }
    }

    fn address(&self) -> Address {
        Address {
            street: self.street.clone(),
            number: self.number.clone(),
            complement: self.complement.clone(),
            bairro: self.bairro.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            cep: self.cep.clone(),
        }
    }

    /// Field errors; empty when the profile can be sent.
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validation::check_name(&self.name, &mut errors);
        validation::check_phone(&self.phone, &mut errors);
        validation::check_address(&self.address(), &mut errors);
        errors
    }

    #[must_use]
    pub fn states(&self) -> Vec<SelectOption> {
        state_options(&self.state)
    }
}

/// Notices passed back through the query string.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub upgrade: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile/show.html")]
pub struct ProfileTemplate {
    pub page: PageContext,
    pub email: String,
    pub form: ProfileFields,
    pub errors: ValidationErrors,
    pub error: Option<String>,
    pub notice: Option<&'static str>,
    /// `Corretor · Em verificação` and the like.
    pub account_kind: String,
    pub can_upgrade: bool,
}

fn account_kind(user_type: UserType, status: Option<BrokerStatus>) -> String {
    match (user_type, status) {
        (UserType::Broker, Some(status)) => format!("{} · {}", user_type.label(), status.label()),
        (UserType::Client, Some(BrokerStatus::PendingVerification)) => {
            format!("{} · upgrade para corretor em análise", user_type.label())
        }
        _ => user_type.label().to_string(),
    }
}

fn profile_template(page: PageContext, user: &CurrentUser, form: ProfileFields) -> ProfileTemplate {
    ProfileTemplate {
        page,
        email: user.email.clone(),
        form,
        errors: ValidationErrors::new(),
        error: None,
        notice: None,
        account_kind: account_kind(user.user_type, user.broker_status),
        can_upgrade: !user.broker_or_pending(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the profile.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    auth: AuthSession,
    RequireAuth(_current): RequireAuth,
    page: PageContext,
    Query(query): Query<ProfileQuery>,
) -> Result<Response, AppError> {
    let token = auth.require_token().await?;
    let user = match state.api().me(&token).await {
        Ok(user) => user,
        Err(e) if e.is_unauthorized() => {
            // Backend session expired: start over.
            auth.sign_out().await?;
            return Ok(login_redirect("/perfil", false));
        }
        Err(e) => return Err(e.into()),
    };
    let current = auth.refresh_user(&user).await?;

    let mut template = profile_template(page, &current, ProfileFields::from_user(&user));
    if query.upgrade.as_deref() == Some("pendente") {
        template.notice = Some(
            "Recebemos seu pedido para se tornar corretor. Avisaremos quando o CRECI for verificado.",
        );
    }
    Ok(template.into_response())
}

/// Save the profile.
///
/// The page is rendered from the session snapshot; only the save itself
/// reaches the backend.
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    auth: AuthSession,
    RequireAuth(current): RequireAuth,
    page: PageContext,
    Form(fields): Form<ProfileFields>,
) -> Result<Response, AppError> {
    let errors = fields.validate();
    if !errors.is_empty() {
        let mut template = profile_template(page, &current, fields);
        template.error = errors.first().map(str::to_string);
        template.errors = errors;
        return Ok(template.into_response());
    }

    let token = auth.require_token().await?;
    let owner = auth.submit_owner();
    let Ok(_ticket) = state.submit_guard().try_begin(PROFILE_FORM, owner.as_deref()) else {
        let mut template = profile_template(page, &current, fields);
        template.error = Some(IN_FLIGHT_MESSAGE.to_string());
        return Ok(template.into_response());
    };

    let phone = Phone::parse(&fields.phone).map_or_else(|_| fields.phone.clone(), |p| p.formatted());
    let address = validation::normalize_address(&fields.address());
    let update = ProfileUpdate {
        name: fields.name.trim(),
        phone: &phone,
        address: &address,
    };

    match state.api().update_profile(&token, &update).await {
        Ok(updated) => {
            auth.refresh_user(&updated).await?;
            auth.set_flash("Perfil atualizado.").await?;
            tracing::info!(user_id = %updated.id, "Profile updated");
            Ok(Redirect::to("/perfil").into_response())
        }
        Err(e) if e.is_unauthorized() => {
            auth.sign_out().await?;
            Ok(login_redirect("/perfil", false))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Profile update failed");
            let mut template = profile_template(page, &current, fields);
            template.error = Some(e.user_message());
            Ok(template.into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProfileFields {
        ProfileFields {
            name: "Ana Souza".into(),
            phone: "(11) 98765-4321".into(),
            city: "São Paulo".into(),
            state: "SP".into(),
            ..ProfileFields::default()
        }
    }

    #[test]
    fn test_empty_phone_blocks_submission() {
        let fields = ProfileFields {
            phone: String::new(),
            ..valid()
        };
        let errors = fields.validate();
        assert_eq!(errors.get("phone"), Some("Telefone válido é obrigatório"));
        assert_eq!(errors.iter().count(), 1);
    }

    #[test]
    fn test_valid_profile_and_bad_cep() {
        assert!(valid().validate().is_empty());

        let fields = ProfileFields {
            cep: "123".into(),
            ..valid()
        };
        assert_eq!(fields.validate().get("cep"), Some("CEP inválido"));
    }

    #[test]
    fn test_account_kind_labels() {
        assert_eq!(account_kind(UserType::Client, None), "Cliente");
        assert_eq!(
            account_kind(UserType::Broker, Some(BrokerStatus::PendingVerification)),
            "Corretor · Em verificação"
        );
        assert!(
            account_kind(UserType::Client, Some(BrokerStatus::PendingVerification))
                .contains("em análise")
        );
    }
}
