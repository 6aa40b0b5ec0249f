//! Buffered multipart forms.
//!
//! Upload forms are small (a few fields and at most a handful of photos),
//! so the whole body is read into memory before validation.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;

use crate::api::UploadFile;
use crate::error::AppError;

/// Text fields and files of a multipart body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<UploadFile>>,
}

impl MultipartForm {
    /// Read every part. Parts with a file name are files, the rest text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed body.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(bad_body)?;
                    // Browsers send an empty part for an untouched file input.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.entry(name).or_default().push(UploadFile {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                None => {
                    let value = field.text().await.map_err(bad_body)?;
                    form.fields.entry(name).or_default().push(value);
                }
            }
        }
        Ok(form)
    }

    /// First value of a text field, empty when absent.
    #[must_use]
    pub fn text(&self, name: &str) -> &str {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map_or("", String::as_str)
    }

    /// Every value of a repeated text field (checkboxes).
    #[must_use]
    pub fn all(&self, name: &str) -> &[String] {
        self.fields.get(name).map_or(&[], Vec::as_slice)
    }

    /// Take the first file of a field. A missing file comes back empty.
    pub fn take_file(&mut self, name: &str) -> UploadFile {
        self.files
            .get_mut(name)
            .filter(|files| !files.is_empty())
            .map(|files| files.remove(0))
            .unwrap_or_else(|| UploadFile {
                file_name: String::new(),
                content_type: String::new(),
                bytes: Vec::new(),
            })
    }

    /// Take every file of a field.
    pub fn take_files(&mut self, name: &str) -> Vec<UploadFile> {
        self.files.remove(name).unwrap_or_default()
    }
}

fn bad_body(err: MultipartError) -> AppError {
    tracing::warn!(error = %err, "Malformed multipart body");
    AppError::BadRequest("Não foi possível ler o formulário enviado.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let mut form = MultipartForm::default();
        assert!(!form.take_file("selfie").is_present());
        assert_eq!(form.text("creci"), "");
        assert!(form.all("amenities").is_empty());
        assert!(form.take_files("photos").is_empty());
    }

    #[test]
    fn test_take_file_returns_first() {
        let mut form = MultipartForm::default();
        form.files.insert(
            "photos".to_string(),
            vec![
                UploadFile {
                    file_name: "a.jpg".to_string(),
                    content_type: "image/jpeg".to_string(),
                    bytes: vec![1],
                },
                UploadFile {
                    file_name: "b.jpg".to_string(),
                    content_type: "image/jpeg".to_string(),
                    bytes: vec![2],
                },
            ],
        );
        assert_eq!(form.take_file("photos").file_name, "a.jpg");
        assert_eq!(form.take_files("photos").len(), 1);
    }
}
