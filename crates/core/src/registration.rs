//! Sign-up draft and step machine.
//!
//! A registration moves through `form` → `creci-verification` → `complete`.
//! The CRECI step only happens for brokers who did not type their license
//! number on the form. The in-progress state is a [`RegistrationDraft`],
//! persisted under [`DRAFT_KEY`] after every edit and cleared on completion.
//!
//! `updated_at` is recorded on each write but never used to expire a draft.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Address, UserType};
use crate::validation::{self, ValidationErrors};

/// Storage key of the draft.
pub const DRAFT_KEY: &str = "registration_draft";

/// Where the sign-up currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationStep {
    #[default]
    Form,
    CreciVerification,
    Complete,
}

impl RegistrationStep {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::CreciVerification => "creci-verification",
            Self::Complete => "complete",
        }
    }

    /// Page the step is rendered on.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Form => "/cadastro",
            Self::CreciVerification => "/cadastro/creci",
            Self::Complete => "/cadastro/concluido",
        }
    }
}

/// Identity provider that vouched for the user before registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    Google,
    Phone,
}

impl AuthProvider {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Phone => "telefone",
        }
    }
}

/// Provider token kept so the account can be created without a password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLink {
    pub provider: AuthProvider,
    pub id_token: String,
}

impl fmt::Debug for ProviderLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderLink")
            .field("provider", &self.provider)
            .field("id_token", &"[REDACTED]")
            .finish()
    }
}

/// Fields collected by the sign-up form. Passwords are never part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
    pub creci: String,
    pub provider: Option<ProviderLink>,
}

impl AuthData {
    /// Validate the form fields for the chosen profile type.
    ///
    /// A broker may leave the CRECI blank (it is asked for in the next
    /// step) but a typed one must be well-formed.
    #[must_use]
    pub fn validate(&self, user_type: UserType) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validation::check_name(&self.name, &mut errors);
        validation::check_email(&self.email, &mut errors);
        validation::check_phone(&self.phone, &mut errors);
        validation::check_address(&self.address, &mut errors);
        if user_type == UserType::Broker && !self.creci.trim().is_empty() {
            validation::check_creci(&self.creci, &mut errors);
        }
        errors
    }

    /// Whether a password is required to create the account.
    #[must_use]
    pub const fn needs_password(&self) -> bool {
        self.provider.is_none()
    }
}

/// The persisted sign-up snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDraft {
    pub step: RegistrationStep,
    pub user_type: UserType,
    pub auth_data: AuthData,
    pub updated_at: DateTime<Utc>,
}

impl RegistrationDraft {
    #[must_use]
    pub fn new(user_type: UserType, auth_data: AuthData, now: DateTime<Utc>) -> Self {
        Self {
            step: RegistrationStep::Form,
            user_type,
            auth_data,
            updated_at: now,
        }
    }

    /// Draft seeded from an identity-provider sign-in that found no account.
    #[must_use]
    pub fn from_provider(
        link: ProviderLink,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let auth_data = AuthData {
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            phone: phone.unwrap_or_default(),
            provider: Some(link),
            ..AuthData::default()
        };
        Self::new(UserType::Client, auth_data, now)
    }

    /// Replace the form fields from an edit, keeping the step and the
    /// provider link.
    pub fn update_fields(&mut self, user_type: UserType, mut auth_data: AuthData, now: DateTime<Utc>) {
        if auth_data.provider.is_none() {
            auth_data.provider = self.auth_data.provider.take();
        }
        self.user_type = user_type;
        self.auth_data = auth_data;
        self.updated_at = now;
    }

    /// Brokers who left the CRECI blank detour through the CRECI step.
    #[must_use]
    pub fn needs_creci_step(&self) -> bool {
        self.user_type == UserType::Broker && self.auth_data.creci.trim().is_empty()
    }

    /// Step reached after the form is submitted successfully.
    #[must_use]
    pub fn step_after_form(&self) -> RegistrationStep {
        if self.needs_creci_step() {
            RegistrationStep::CreciVerification
        } else {
            RegistrationStep::Complete
        }
    }

    pub fn advance_to(&mut self, step: RegistrationStep, now: DateTime<Utc>) {
        self.step = step;
        self.updated_at = now;
    }

    /// Whether the account already exists and the form only amends it.
    #[must_use]
    pub fn account_created(&self) -> bool {
        self.step == RegistrationStep::CreciVerification
    }
}

/// Why the CRECI step cannot be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreciEntryDenied {
    /// No session. Carries whether an unfinished draft exists.
    NotSignedIn { has_draft: bool },
    /// The account is already a broker or has an upgrade under review.
    AlreadyBroker,
}

/// Mode of the CRECI step, decided once when the step is entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreciFlow {
    /// Finishing a fresh broker sign-up.
    Registration(RegistrationDraft),
    /// A signed-in client asking to become a broker.
    Upgrade,
}

impl CreciFlow {
    /// Resolve the mode from the stored draft and the session.
    ///
    /// # Errors
    ///
    /// Returns [`CreciEntryDenied`] when neither mode applies.
    pub fn resolve(
        draft: Option<RegistrationDraft>,
        signed_in: bool,
        broker_or_pending: bool,
    ) -> Result<Self, CreciEntryDenied> {
        let draft = draft.filter(RegistrationDraft::account_created);
        if !signed_in {
            return Err(CreciEntryDenied::NotSignedIn {
                has_draft: draft.is_some(),
            });
        }
        match draft {
            Some(draft) => Ok(Self::Registration(draft)),
            None if broker_or_pending => Err(CreciEntryDenied::AlreadyBroker),
            None => Ok(Self::Upgrade),
        }
    }

    #[must_use]
    pub const fn is_upgrade(&self) -> bool {
        matches!(self, Self::Upgrade)
    }

    /// Where to go once the CRECI and documents are accepted.
    #[must_use]
    pub const fn completion_path(&self) -> &'static str {
        match self {
            Self::Registration(_) => RegistrationStep::Complete.path(),
            Self::Upgrade => "/perfil?upgrade=pendente",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn filled() -> AuthData {
        AuthData {
            name: "Ana Souza".into(),
            email: "ana@exemplo.com".into(),
            phone: "(11) 98765-4321".into(),
            address: Address {
                city: "São Paulo".into(),
                state: "SP".into(),
                cep: "01310-100".into(),
                ..Address::default()
            },
            ..AuthData::default()
        }
    }

    #[test]
    fn test_draft_json_shape() {
        let draft = RegistrationDraft::new(UserType::Broker, filled(), now());
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["step"], "form");
        assert_eq!(json["userType"], "broker");
        assert_eq!(json["authData"]["name"], "Ana Souza");
        assert!(json["updatedAt"].is_string());

        let back: RegistrationDraft = serde_json::from_value(json).unwrap();
        assert_eq!(back, draft);
    }

    #[test]
    fn test_step_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&RegistrationStep::CreciVerification).unwrap(),
            "\"creci-verification\""
        );
        assert_eq!(RegistrationStep::CreciVerification.as_str(), "creci-verification");
    }

    #[test]
    fn test_broker_without_creci_detours() {
        let mut draft = RegistrationDraft::new(UserType::Broker, filled(), now());
        assert_eq!(draft.step_after_form(), RegistrationStep::CreciVerification);

        draft.auth_data.creci = "12345-F".into();
        assert_eq!(draft.step_after_form(), RegistrationStep::Complete);

        let client = RegistrationDraft::new(UserType::Client, filled(), now());
        assert_eq!(client.step_after_form(), RegistrationStep::Complete);
    }

    #[test]
    fn test_update_keeps_step_and_provider() {
        let link = ProviderLink {
            provider: AuthProvider::Google,
            id_token: "tok".into(),
        };
        let mut draft =
            RegistrationDraft::from_provider(link.clone(), Some("Ana".into()), None, None, now());
        draft.advance_to(RegistrationStep::CreciVerification, now());

        let later = now() + chrono::Duration::minutes(5);
        draft.update_fields(UserType::Broker, filled(), later);

        assert_eq!(draft.step, RegistrationStep::CreciVerification);
        assert_eq!(draft.auth_data.provider, Some(link));
        assert_eq!(draft.updated_at, later);
        assert!(!draft.auth_data.needs_password());
    }

    #[test]
    fn test_validate_form() {
        assert!(filled().validate(UserType::Client).is_empty());

        let mut data = filled();
        data.phone.clear();
        let errors = data.validate(UserType::Client);
        assert_eq!(errors.get("phone"), Some("Telefone válido é obrigatório"));

        let mut data = filled();
        data.creci = "???".into();
        assert!(data.validate(UserType::Client).is_empty());
        assert_eq!(
            data.validate(UserType::Broker).get("creci"),
            Some("CRECI inválido")
        );
    }

    #[test]
    fn test_provider_link_debug_redacts() {
        let link = ProviderLink {
            provider: AuthProvider::Phone,
            id_token: "secret-token".into(),
        };
        assert!(!format!("{link:?}").contains("secret-token"));
    }

    #[test]
    fn test_creci_flow_resolution() {
        let mut draft = RegistrationDraft::new(UserType::Broker, filled(), now());

        // A draft still on the form does not select the registration flow.
        assert_eq!(
            CreciFlow::resolve(Some(draft.clone()), true, false),
            Ok(CreciFlow::Upgrade)
        );

        draft.advance_to(RegistrationStep::CreciVerification, now());
        assert_eq!(
            CreciFlow::resolve(Some(draft.clone()), true, false),
            Ok(CreciFlow::Registration(draft.clone()))
        );
        assert_eq!(
            CreciFlow::resolve(Some(draft), false, false),
            Err(CreciEntryDenied::NotSignedIn { has_draft: true })
        );
        assert_eq!(
            CreciFlow::resolve(None, false, false),
            Err(CreciEntryDenied::NotSignedIn { has_draft: false })
        );
        assert_eq!(
            CreciFlow::resolve(None, true, true),
            Err(CreciEntryDenied::AlreadyBroker)
        );
        assert!(CreciFlow::Upgrade.is_upgrade());
        assert_eq!(CreciFlow::Upgrade.completion_path(), "/perfil?upgrade=pendente");
    }
}
