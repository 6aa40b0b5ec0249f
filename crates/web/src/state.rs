//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError, UploadClient};
use crate::config::PortalConfig;
use crate::identity::IdentityClient;
use crate::services::SubmitGuard;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PortalConfig,
    api: ApiClient,
    identity: IdentityClient,
    uploads: Option<UploadClient>,
    submit_guard: SubmitGuard,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: PortalConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api)?;
        let identity = IdentityClient::new(&config.identity, &config.base_url);
        let uploads = config.upload.as_ref().map(UploadClient::new).transpose()?;

        if !identity.is_enabled() {
            tracing::warn!("IDENTITY_API_KEY not set; Google and phone sign-in disabled");
        }
        if uploads.is_none() {
            tracing::warn!("UPLOAD_URL not set; listing photo upload disabled");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                identity,
                uploads,
                submit_guard: SubmitGuard::new(),
            }),
        })
    }

    /// Get a reference to the portal configuration.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    /// Get a reference to the listings backend client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the identity provider client.
    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.inner.identity
    }

    /// Image hosting client, when configured.
    #[must_use]
    pub fn uploads(&self) -> Option<&UploadClient> {
        self.inner.uploads.as_ref()
    }

    /// In-flight form submissions.
    #[must_use]
    pub fn submit_guard(&self) -> &SubmitGuard {
        &self.inner.submit_guard
    }
}
