//! Account endpoints: sign-in, sign-up, profile and broker upgrade.

use std::fmt;

use morada_core::{Address, AuthProvider, BrokerDocuments, User, UserType};
use reqwest::Method;
use reqwest::multipart::Form;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::uploads::UploadFile;
use super::{ApiClient, ApiError};
use crate::models::AuthToken;

/// Successful sign-in or sign-up.
#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub token: AuthToken,
    pub user: User,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &"[REDACTED]")
            .field("user", &self.user.id)
            .finish()
    }
}

/// `POST /auth/register` body.
///
/// Exactly one of `password` and `id_token` is set.
#[derive(Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub address: &'a Address,
    pub user_type: UserType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creci: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<AuthProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<&'a str>,
}

/// `PUT /auth/profile` body.
#[derive(Debug, Serialize)]
pub struct ProfileUpdate<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub address: &'a Address,
}

/// The three documents a broker sends for CRECI verification.
#[derive(Debug)]
pub struct BrokerDocumentUpload {
    pub creci_front: UploadFile,
    pub creci_back: UploadFile,
    pub selfie: UploadFile,
}

impl BrokerDocumentUpload {
    fn into_form(self) -> Result<Form, ApiError> {
        Ok(Form::new()
            .part("creci_front", self.creci_front.into_part()?)
            .part("creci_back", self.creci_back.into_part()?)
            .part("selfie", self.selfie.into_part()?))
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ProviderLoginBody<'a> {
    provider: AuthProvider,
    id_token: &'a str,
}

#[derive(Serialize)]
struct EmailBody<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct UpgradeBody<'a> {
    creci: &'a str,
}

#[derive(Deserialize)]
struct EmailStatus {
    exists: bool,
}

impl ApiClient {
    /// Sign in with e-mail and password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for wrong credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.execute(
            self.request(Method::POST, "/auth/login", None)
                .json(&LoginBody { email, password }),
        )
        .await
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Api` with the server's message (e.g. e-mail taken).
    #[instrument(skip(self, request), fields(email = %request.email, user_type = %request.user_type))]
    pub async fn register(&self, request: &RegisterRequest<'_>) -> Result<AuthResponse, ApiError> {
        self.execute(self.request(Method::POST, "/auth/register", None).json(request))
            .await
    }

    /// Whether an account already uses this e-mail.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self))]
    pub async fn email_exists(&self, email: &str) -> Result<bool, ApiError> {
        let status: EmailStatus = self
            .execute(
                self.request(Method::GET, "/auth/email-status", None)
                    .query(&[("email", email)]),
            )
            .await?;
        Ok(status.exists)
    }

    /// Ask the backend to send a password reset e-mail.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        self.execute_empty(
            self.request(Method::POST, "/auth/forgot-password", None)
                .json(&EmailBody { email }),
        )
        .await
    }

    /// Exchange an identity-provider token for a backend session.
    ///
    /// Returns `Ok(None)` when the identity is valid but has no account yet.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, id_token))]
    pub async fn provider_login(
        &self,
        provider: AuthProvider,
        id_token: &str,
    ) -> Result<Option<AuthResponse>, ApiError> {
        let result = self
            .execute(
                self.request(Method::POST, "/auth/provider-login", None)
                    .json(&ProviderLoginBody { provider, id_token }),
            )
            .await;
        match result {
            Ok(response) => Ok(Some(response)),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The signed-in account.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for an expired token.
    #[instrument(skip(self, token))]
    pub async fn me(&self, token: &AuthToken) -> Result<User, ApiError> {
        self.execute(self.request(Method::GET, "/auth/me", Some(token)))
            .await
    }

    /// Update name, phone and address.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token, update))]
    pub async fn update_profile(
        &self,
        token: &AuthToken,
        update: &ProfileUpdate<'_>,
    ) -> Result<User, ApiError> {
        self.execute(
            self.request(Method::PUT, "/auth/profile", Some(token))
                .json(update),
        )
        .await
    }

    /// Request the broker upgrade of the signed-in account.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token))]
    pub async fn request_broker_upgrade(
        &self,
        token: &AuthToken,
        creci: &str,
    ) -> Result<User, ApiError> {
        self.execute(
            self.request(Method::POST, "/auth/broker-upgrade", Some(token))
                .json(&UpgradeBody { creci }),
        )
        .await
    }

    /// Upload the CRECI verification documents.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUpload` for rejected files, otherwise the
    /// normalized backend error.
    #[instrument(skip(self, token, documents))]
    pub async fn upload_broker_documents(
        &self,
        token: &AuthToken,
        documents: BrokerDocumentUpload,
    ) -> Result<BrokerDocuments, ApiError> {
        let form = documents.into_form()?;
        self.execute(
            self.request(Method::POST, "/auth/broker-documents", Some(token))
                .multipart(form),
        )
        .await
    }
}
