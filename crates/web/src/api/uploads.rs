//! File uploads: broker documents and listing images.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::ApiError;
use crate::config::UploadConfig;

/// Largest accepted file.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];
const DOCUMENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "application/pdf"];

/// A file received from a multipart form, ready to forward.
#[derive(Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    /// Whether the browser sent an actual file for the field.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.bytes.is_empty()
    }

    /// Accept a photo of a document or a PDF.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUpload` with a user-facing message.
    pub fn check_document(&self) -> Result<(), ApiError> {
        self.check(DOCUMENT_TYPES, "Envie uma imagem (JPG, PNG ou WebP) ou PDF.")
    }

    /// Accept a listing photo.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUpload` with a user-facing message.
    pub fn check_image(&self) -> Result<(), ApiError> {
        self.check(IMAGE_TYPES, "Envie uma imagem JPG, PNG ou WebP.")
    }

    fn check(&self, allowed: &[&str], type_message: &str) -> Result<(), ApiError> {
        if !self.is_present() {
            return Err(ApiError::InvalidUpload(format!(
                "{} está vazio.",
                self.display_name()
            )));
        }
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::InvalidUpload(format!(
                "{} excede o limite de 10 MB.",
                self.display_name()
            )));
        }
        if !allowed.contains(&self.content_type.as_str()) {
            return Err(ApiError::InvalidUpload(type_message.to_string()));
        }
        Ok(())
    }

    fn display_name(&self) -> &str {
        if self.file_name.is_empty() {
            "O arquivo"
        } else {
            &self.file_name
        }
    }

    pub(super) fn into_part(self) -> Result<Part, ApiError> {
        self.check_document()?;
        let file_name = if self.file_name.is_empty() {
            "upload".to_string()
        } else {
            self.file_name
        };
        Part::bytes(self.bytes)
            .file_name(file_name)
            .mime_str(&self.content_type)
            .map_err(|_| ApiError::InvalidUpload("Tipo de arquivo inválido.".to_string()))
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

/// Client for the image hosting endpoint.
#[derive(Clone)]
pub struct UploadClient {
    inner: Arc<UploadClientInner>,
}

struct UploadClientInner {
    client: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
}

impl UploadClient {
    /// Create a new upload client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(config: &UploadConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            inner: Arc::new(UploadClientInner {
                client,
                url: config.url.clone(),
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Upload a listing photo and return its hosted URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUpload` for rejected files, otherwise the
    /// normalized transport or status error.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, len = file.bytes.len()))]
    pub async fn upload_image(&self, file: UploadFile) -> Result<String, ApiError> {
        file.check_image()?;
        let form = Form::new().part("file", file.into_part()?);

        let mut request = self.inner.client.post(&self.inner.url).multipart(form);
        if let Some(key) = &self.inner.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, "Image upload rejected");
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: "Não foi possível enviar a imagem.".to_string(),
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(body.url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn file(content_type: &str, len: usize) -> UploadFile {
        UploadFile {
            file_name: "frente.jpg".to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0; len],
        }
    }

    #[test]
    fn test_document_checks() {
        assert!(file("image/jpeg", 10).check_document().is_ok());
        assert!(file("application/pdf", 10).check_document().is_ok());
        assert!(matches!(
            file("text/plain", 10).check_document(),
            Err(ApiError::InvalidUpload(_))
        ));
        assert!(file("image/png", 0).check_document().is_err());
        assert!(file("image/png", MAX_UPLOAD_BYTES + 1).check_document().is_err());
    }

    #[test]
    fn test_pdf_is_not_a_listing_image() {
        assert!(file("application/pdf", 10).check_image().is_err());
        assert!(file("image/webp", 10).check_image().is_ok());
    }

    #[test]
    fn test_debug_hides_bytes() {
        let debug = format!("{:?}", file("image/png", 3));
        assert!(debug.contains("len: 3"));
    }
}
