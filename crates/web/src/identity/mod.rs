//! Identity provider client (Google and phone sign-in).
//!
//! Talks to an Identity Toolkit style REST API:
//!
//! - `accounts:signInWithIdp` - exchange a Google credential for an ID token
//! - `accounts:sendVerificationCode` - text a code to a phone number
//! - `accounts:signInWithPhoneNumber` - confirm the code, get an ID token
//!
//! The resulting ID token is then exchanged with the listings backend, which
//! owns the account.

use std::fmt;
use std::sync::Arc;

use morada_core::{AuthProvider, Phone, ProviderLink};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::IdentityConfig;

/// Errors that can occur when talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No API key configured.
    #[error("identity provider is not configured")]
    Disabled,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request with an error code.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl IdentityError {
    /// Message shown on the sign-in page.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Disabled => "Este método de acesso não está disponível no momento.",
            Self::Http(_) | Self::Parse(_) => {
                "Não foi possível falar com o provedor de login. Tente novamente."
            }
            Self::Provider(code) => match code.split([' ', ':']).next().unwrap_or_default() {
                "INVALID_CODE" | "INVALID_VERIFICATION_CODE" => "Código de verificação inválido.",
                "SESSION_EXPIRED" | "INVALID_SESSION_INFO" => {
                    "O código expirou. Solicite um novo código."
                }
                "INVALID_PHONE_NUMBER" | "MISSING_PHONE_NUMBER" => "Telefone inválido.",
                "TOO_MANY_ATTEMPTS_TRY_LATER" | "QUOTA_EXCEEDED" => {
                    "Muitas tentativas. Aguarde alguns minutos e tente novamente."
                }
                "USER_DISABLED" => "Esta conta foi desativada.",
                _ => "Não foi possível confirmar sua identidade.",
            },
        }
    }
}

/// What the provider tells us about a verified identity.
#[derive(Clone)]
pub struct IdentityProfile {
    pub provider: AuthProvider,
    pub id_token: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl fmt::Debug for IdentityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProfile")
            .field("provider", &self.provider)
            .field("id_token", &"[REDACTED]")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl IdentityProfile {
    #[must_use]
    pub fn link(&self) -> ProviderLink {
        ProviderLink {
            provider: self.provider,
            id_token: self.id_token.clone(),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpResponse {
    id_token: String,
    email: Option<String>,
    display_name: Option<String>,
    full_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeRequest<'a> {
    phone_number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    recaptcha_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeResponse {
    session_info: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyCodeRequest<'a> {
    session_info: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyCodeResponse {
    id_token: String,
    phone_number: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// IdentityClient
// =============================================================================

/// Client for the identity provider.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<IdentityClientInner>,
}

struct IdentityClientInner {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    google_client_id: Option<String>,
    request_uri: String,
}

impl IdentityClient {
    /// Create a new identity client.
    ///
    /// `request_uri` is the portal's public URL, echoed to the provider.
    #[must_use]
    pub fn new(config: &IdentityConfig, request_uri: &str) -> Self {
        Self {
            inner: Arc::new(IdentityClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
                google_client_id: config.google_client_id.clone(),
                request_uri: request_uri.to_string(),
            }),
        }
    }

    /// Whether sign-in through the provider is available.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.api_key.is_some()
    }

    /// Client ID for the Google sign-in button, when Google sign-in is on.
    #[must_use]
    pub fn google_client_id(&self) -> Option<&str> {
        self.inner
            .google_client_id
            .as_deref()
            .filter(|_| self.is_enabled())
    }

    async fn call<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, IdentityError> {
        let key = self.inner.api_key.as_ref().ok_or(IdentityError::Disabled)?;
        let url = format!("{}/accounts:{method}", self.inner.base_url);

        let response = self
            .inner
            .client
            .post(url)
            .query(&[("key", key.expose_secret())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let code = serde_json::from_str::<ErrorEnvelope>(&text)
                .map_or_else(|_| format!("HTTP_{}", status.as_u16()), |e| e.error.message);
            tracing::warn!(method, status = %status, code = %code, "Identity provider rejected request");
            return Err(IdentityError::Provider(code));
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Verify a Google credential from the sign-in button.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Provider` if the credential is rejected.
    #[instrument(skip(self, credential))]
    pub async fn sign_in_with_google(
        &self,
        credential: &str,
    ) -> Result<IdentityProfile, IdentityError> {
        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", credential)
            .append_pair("providerId", "google.com")
            .finish();
        let request = SignInWithIdpRequest {
            post_body,
            request_uri: &self.inner.request_uri,
            return_secure_token: true,
            return_idp_credential: true,
        };
        let response: SignInWithIdpResponse = self.call("signInWithIdp", &request).await?;

        Ok(IdentityProfile {
            provider: AuthProvider::Google,
            id_token: response.id_token,
            email: response.email,
            name: response.display_name.or(response.full_name),
            phone: None,
        })
    }

    /// Text a verification code. Returns the session info to confirm it with.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Provider` for invalid numbers or quota errors.
    #[instrument(skip(self, recaptcha_token))]
    pub async fn send_verification_code(
        &self,
        phone: &Phone,
        recaptcha_token: Option<&str>,
    ) -> Result<String, IdentityError> {
        let e164 = phone.e164();
        let request = SendCodeRequest {
            phone_number: &e164,
            recaptcha_token,
        };
        let response: SendCodeResponse = self.call("sendVerificationCode", &request).await?;
        Ok(response.session_info)
    }

    /// Confirm a texted code.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Provider` for wrong or expired codes.
    #[instrument(skip(self, session_info, code))]
    pub async fn verify_phone_code(
        &self,
        session_info: &str,
        code: &str,
    ) -> Result<IdentityProfile, IdentityError> {
        let request = VerifyCodeRequest {
            session_info,
            code: code.trim(),
        };
        let response: VerifyCodeResponse = self.call("signInWithPhoneNumber", &request).await?;

        Ok(IdentityProfile {
            provider: AuthProvider::Phone,
            id_token: response.id_token,
            email: None,
            name: None,
            phone: response
                .phone_number
                .and_then(|p| Phone::parse(&p).ok())
                .map(|p| p.formatted()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_codes_map_to_messages() {
        let err = IdentityError::Provider("INVALID_CODE".to_string());
        assert_eq!(err.user_message(), "Código de verificação inválido.");

        let err = IdentityError::Provider("TOO_MANY_ATTEMPTS_TRY_LATER : wait".to_string());
        assert!(err.user_message().starts_with("Muitas tentativas"));

        let err = IdentityError::Provider("SOMETHING_NEW".to_string());
        assert_eq!(err.user_message(), "Não foi possível confirmar sua identidade.");
    }

    #[test]
    fn test_disabled_without_key() {
        let client = IdentityClient::new(
            &IdentityConfig {
                base_url: "http://localhost:9099/v1".to_string(),
                api_key: None,
                google_client_id: Some("abc".to_string()),
            },
            "http://localhost:3000",
        );
        assert!(!client.is_enabled());
        assert_eq!(client.google_client_id(), None);
    }

    #[test]
    fn test_profile_debug_redacts_token() {
        let profile = IdentityProfile {
            provider: AuthProvider::Google,
            id_token: "google-id-token".to_string(),
            email: Some("ana@exemplo.com".to_string()),
            name: None,
            phone: None,
        };
        assert!(!format!("{profile:?}").contains("google-id-token"));
        assert_eq!(profile.link().provider, AuthProvider::Google);
    }
}
