//! Sign-up orchestration.
//!
//! [`RegistrationService`] owns the in-progress sign-up for one visitor. It
//! reads and writes the draft through a [`DraftStore`], validates the form,
//! talks to the backend and advances the step machine from
//! `morada_core::registration`.

use chrono::{DateTime, Utc};
use morada_core::validation::{self, messages};
use morada_core::{
    AuthData, CreciFlow, RegistrationDraft, RegistrationStep, UserType, ValidationErrors,
};
use thiserror::Error;
use tracing::instrument;

use super::auth_session::{AuthSession, AuthSessionError};
use super::drafts::{DraftStore, DraftStoreError};
use crate::api::{ApiClient, ApiError, BrokerDocumentUpload, ProfileUpdate, RegisterRequest};
use crate::identity::IdentityProfile;

/// Why a sign-up step did not go through.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Field errors, shown inline.
    #[error("invalid form: {0}")]
    Invalid(ValidationErrors),

    /// The step needs a signed-in session.
    #[error("sign-in required")]
    SignInRequired,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Draft(#[from] DraftStoreError),

    #[error(transparent)]
    Session(AuthSessionError),
}

impl From<AuthSessionError> for SubmitError {
    fn from(err: AuthSessionError) -> Self {
        match err {
            AuthSessionError::NotSignedIn => Self::SignInRequired,
            AuthSessionError::Api(e) => Self::Api(e),
            other @ AuthSessionError::Session(_) => Self::Session(other),
        }
    }
}

impl SubmitError {
    /// Form-level message for the inline banner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(errors) => errors
                .first()
                .unwrap_or("Verifique os campos destacados.")
                .to_string(),
            Self::SignInRequired => "Entre na sua conta para continuar.".to_string(),
            Self::Api(e) => e.user_message(),
            Self::Draft(_) | Self::Session(_) => {
                "Não foi possível salvar seu progresso. Tente novamente.".to_string()
            }
        }
    }

    /// Field errors, if that is what went wrong.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Result of a successful form submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Account created, signed in and the draft cleared.
    Completed,
    /// Client account created for a broker; the CRECI step comes next.
    NeedsCreci,
    /// The account existed already; the profile was updated and the CRECI
    /// step, pre-filled with any CRECI typed on the form, comes next.
    Amended,
}

impl SubmitOutcome {
    /// Page to redirect to.
    #[must_use]
    pub const fn redirect_path(self) -> &'static str {
        match self {
            Self::Completed => RegistrationStep::Complete.path(),
            Self::NeedsCreci | Self::Amended => RegistrationStep::CreciVerification.path(),
        }
    }
}

/// The sign-up form as posted. Passwords never reach the draft.
#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub user_type: UserType,
    pub auth_data: AuthData,
    pub password: String,
    pub password_confirm: String,
}

/// Sign-up of one visitor.
pub struct RegistrationService<S> {
    store: S,
}

impl<S: DraftStore> RegistrationService<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The stored draft, to fill the form with. `None` means start empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft store is unreachable.
    pub async fn hydrate(&self) -> Result<Option<RegistrationDraft>, DraftStoreError> {
        self.store.load().await
    }

    /// Persist edited fields. The current step is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft cannot be written.
    pub async fn save_fields(
        &self,
        user_type: UserType,
        auth_data: AuthData,
        now: DateTime<Utc>,
    ) -> Result<RegistrationDraft, DraftStoreError> {
        let draft = match self.store.load().await? {
            Some(mut draft) => {
                draft.update_fields(user_type, auth_data, now);
                draft
            }
            None => RegistrationDraft::new(user_type, auth_data, now),
        };
        self.store.save(&draft).await?;
        Ok(draft)
    }

    /// Start a sign-up from an identity-provider sign-in with no account.
    ///
    /// Replaces any older draft.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft cannot be written.
    pub async fn begin_from_provider(
        &self,
        profile: &IdentityProfile,
        now: DateTime<Utc>,
    ) -> Result<RegistrationDraft, DraftStoreError> {
        let draft = RegistrationDraft::from_provider(
            profile.link(),
            profile.name.clone(),
            profile.email.clone(),
            profile.phone.clone(),
            now,
        );
        self.store.save(&draft).await?;
        Ok(draft)
    }

    /// Throw the draft away.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft store is unreachable.
    pub async fn discard(&self) -> Result<(), DraftStoreError> {
        self.store.clear().await
    }

    /// Submit the sign-up form.
    ///
    /// The typed fields are saved before anything else, so a failure never
    /// loses them.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Invalid`] for field errors, or the backend or
    /// storage failure.
    #[instrument(skip_all, fields(user_type = %form.user_type))]
    pub async fn submit(
        &self,
        api: &ApiClient,
        auth: &AuthSession,
        form: SignupForm,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, SubmitError> {
        let SignupForm {
            user_type,
            auth_data,
            password,
            password_confirm,
        } = form;
        let mut draft = self.save_fields(user_type, auth_data, now).await?;

        let mut errors = draft.auth_data.validate(draft.user_type);
        let account_created = draft.account_created();
        if !account_created && draft.auth_data.needs_password() {
            validation::check_password(&password, &password_confirm, &mut errors);
        }
        errors.into_result().map_err(SubmitError::Invalid)?;

        let data = &draft.auth_data;
        let phone = morada_core::Phone::parse(&data.phone)
            .map(|p| p.formatted())
            .unwrap_or_else(|_| data.phone.trim().to_string());
        let address = validation::normalize_address(&data.address);

        if account_created {
            let token = auth.require_token().await?;
            let user = api
                .update_profile(
                    &token,
                    &ProfileUpdate {
                        name: data.name.trim(),
                        phone: &phone,
                        address: &address,
                    },
                )
                .await?;
            auth.refresh_user(&user).await?;
            tracing::info!(user_id = %user.id, "Amended profile during sign-up");

            // The account exists as a client already.
            if draft.user_type == UserType::Client {
                self.store.clear().await?;
                return Ok(SubmitOutcome::Completed);
            }
            return Ok(SubmitOutcome::Amended);
        }

        let email = data.email.trim().to_ascii_lowercase();
        if api.email_exists(&email).await? {
            let mut errors = ValidationErrors::new();
            errors.add("email", messages::EMAIL_TAKEN);
            return Err(SubmitError::Invalid(errors));
        }

        let needs_creci = draft.needs_creci_step();
        let creci = (draft.user_type == UserType::Broker && !needs_creci)
            .then(|| data.creci.trim().to_ascii_uppercase());
        let request = RegisterRequest {
            name: data.name.trim(),
            email: &email,
            phone: &phone,
            address: &address,
            // Brokers without a CRECI start as clients and upgrade in the next step.
            user_type: if needs_creci {
                UserType::Client
            } else {
                draft.user_type
            },
            creci: creci.as_deref(),
            password: data.needs_password().then_some(password.as_str()),
            provider: data.provider.as_ref().map(|link| link.provider),
            id_token: data.provider.as_ref().map(|link| link.id_token.as_str()),
        };

        let response = api.register(&request).await?;
        auth.sign_in(api, response).await?;

        if needs_creci {
            draft.advance_to(RegistrationStep::CreciVerification, now);
            self.store.save(&draft).await?;
            Ok(SubmitOutcome::NeedsCreci)
        } else {
            self.store.clear().await?;
            Ok(SubmitOutcome::Completed)
        }
    }

    /// Submit the CRECI step: upload the documents, then request the upgrade.
    ///
    /// Returns the path to continue to.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Invalid`] for a bad CRECI or missing documents,
    /// or the backend failure.
    #[instrument(skip_all, fields(upgrade = flow.is_upgrade()))]
    pub async fn submit_creci(
        &self,
        api: &ApiClient,
        auth: &AuthSession,
        flow: &CreciFlow,
        creci: &str,
        documents: BrokerDocumentUpload,
    ) -> Result<&'static str, SubmitError> {
        let mut errors = ValidationErrors::new();
        let creci = validation::check_creci(creci, &mut errors);
        for (field, file) in [
            ("creci_front", &documents.creci_front),
            ("creci_back", &documents.creci_back),
            ("selfie", &documents.selfie),
        ] {
            if !file.is_present() {
                errors.add(field, messages::DOCUMENT_REQUIRED);
            } else if let Err(e) = file.check_document() {
                errors.add(field, e.user_message());
            }
        }
        errors.into_result().map_err(SubmitError::Invalid)?;
        let Some(creci) = creci else {
            return Err(SubmitError::Invalid(ValidationErrors::new()));
        };

        // Pending status reaches the session only after both calls succeed.
        let token = auth.require_token().await?;
        api.upload_broker_documents(&token, documents).await?;
        let user = api.request_broker_upgrade(&token, creci.as_str()).await?;
        auth.refresh_user(&user).await?;

        if let CreciFlow::Registration(_) = flow {
            self.store.clear().await?;
        }
        tracing::info!(user_id = %user.id, "Broker verification requested");
        Ok(flow.completion_path())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use morada_core::{Address, AuthProvider, ProviderLink};
    use tower_sessions::{MemoryStore, Session};

    use super::*;
    use crate::api::UploadFile;
    use crate::config::ApiConfig;
    use crate::models::{AuthToken, session_keys};
    use crate::services::drafts::MemoryDraftStore;

    fn unreachable_api() -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
        })
        .unwrap()
    }

    fn auth() -> AuthSession {
        AuthSession::new(Session::new(None, Arc::new(MemoryStore::default()), None))
    }

    fn filled() -> AuthData {
        AuthData {
            name: "Ana Souza".into(),
            email: "ana@exemplo.com".into(),
            phone: "(11) 98765-4321".into(),
            address: Address {
                city: "São Paulo".into(),
                state: "SP".into(),
                ..Address::default()
            },
            ..AuthData::default()
        }
    }

    fn empty_file() -> UploadFile {
        UploadFile {
            file_name: String::new(),
            content_type: "application/octet-stream".into(),
            bytes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_hydrate_returns_saved_fields() {
        let service = RegistrationService::new(MemoryDraftStore::new());
        assert!(service.hydrate().await.unwrap().is_none());

        service
            .save_fields(UserType::Broker, filled(), Utc::now())
            .await
            .unwrap();

        let draft = service.hydrate().await.unwrap().unwrap();
        assert_eq!(draft.user_type, UserType::Broker);
        assert_eq!(draft.auth_data, filled());
        assert_eq!(draft.step, RegistrationStep::Form);
    }

    #[tokio::test]
    async fn test_save_fields_keeps_step_and_provider() {
        let store = MemoryDraftStore::new();
        let service = RegistrationService::new(store.clone());

        let mut draft = RegistrationDraft::from_provider(
            ProviderLink {
                provider: AuthProvider::Google,
                id_token: "tok".into(),
            },
            Some("Ana".into()),
            None,
            None,
            Utc::now(),
        );
        draft.advance_to(RegistrationStep::CreciVerification, Utc::now());
        store.save(&draft).await.unwrap();

        let saved = service
            .save_fields(UserType::Broker, filled(), Utc::now())
            .await
            .unwrap();
        assert_eq!(saved.step, RegistrationStep::CreciVerification);
        assert_eq!(saved.auth_data.provider.unwrap().provider, AuthProvider::Google);
    }

    #[tokio::test]
    async fn test_invalid_submit_keeps_draft_and_skips_backend() {
        let store = MemoryDraftStore::new();
        let service = RegistrationService::new(store.clone());
        let form = SignupForm {
            user_type: UserType::Client,
            auth_data: AuthData {
                phone: String::new(),
                ..filled()
            },
            password: "curta".into(),
            password_confirm: "curta".into(),
        };

        let err = service
            .submit(&unreachable_api(), &auth(), form, Utc::now())
            .await
            .unwrap_err();
        let errors = err.field_errors().unwrap();
        assert_eq!(errors.get("phone"), Some(messages::PHONE_INVALID));
        assert_eq!(errors.get("password"), Some(messages::PASSWORD_TOO_SHORT));
        assert_eq!(store.load().await.unwrap().unwrap().auth_data.name, "Ana Souza");
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_draft() {
        let store = MemoryDraftStore::new();
        let service = RegistrationService::new(store.clone());
        let form = SignupForm {
            user_type: UserType::Client,
            auth_data: filled(),
            password: "segredo123".into(),
            password_confirm: "segredo123".into(),
        };

        let err = service
            .submit(&unreachable_api(), &auth(), form, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Api(ApiError::Network(_))));
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_amend_requires_session() {
        let store = MemoryDraftStore::new();
        let mut draft = RegistrationDraft::new(UserType::Broker, filled(), Utc::now());
        draft.advance_to(RegistrationStep::CreciVerification, Utc::now());
        store.save(&draft).await.unwrap();

        let service = RegistrationService::new(store);
        let form = SignupForm {
            user_type: UserType::Broker,
            auth_data: filled(),
            ..SignupForm::default()
        };
        let err = service
            .submit(&unreachable_api(), &auth(), form, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::SignInRequired));
    }

    #[tokio::test]
    async fn test_creci_step_requires_every_document() {
        let auth = auth();
        auth.session()
            .insert(session_keys::AUTH_TOKEN, AuthToken::new("jwt"))
            .await
            .unwrap();
        let service = RegistrationService::new(MemoryDraftStore::new());
        let documents = BrokerDocumentUpload {
            creci_front: UploadFile {
                file_name: "frente.jpg".into(),
                content_type: "image/jpeg".into(),
                bytes: vec![0xFF, 0xD8],
            },
            creci_back: empty_file(),
            selfie: UploadFile {
                file_name: "selfie.gif".into(),
                content_type: "image/gif".into(),
                bytes: vec![1],
            },
        };

        let err = service
            .submit_creci(&unreachable_api(), &auth, &CreciFlow::Upgrade, "", documents)
            .await
            .unwrap_err();
        let errors = err.field_errors().unwrap();
        assert_eq!(errors.get("creci"), Some(messages::CRECI_REQUIRED));
        assert_eq!(errors.get("creci_front"), None);
        assert_eq!(errors.get("creci_back"), Some(messages::DOCUMENT_REQUIRED));
        assert!(errors.get("selfie").is_some());
    }

    #[test]
    fn test_outcome_redirects() {
        assert_eq!(SubmitOutcome::Completed.redirect_path(), "/cadastro/concluido");
        assert_eq!(SubmitOutcome::NeedsCreci.redirect_path(), "/cadastro/creci");
        assert_eq!(SubmitOutcome::Amended.redirect_path(), "/cadastro/creci");
    }
}
