//! Per-page layout context.
//!
//! Every full-page template carries a [`PageContext`] for the shared layout:
//! the CSP nonce, the signed-in user for the header, and a one-shot flash
//! message.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tower_sessions::Session;

use crate::middleware::CspNonce;
use crate::models::{CurrentUser, session_keys};

/// Layout data for the base template.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub nonce: String,
    pub user: Option<CurrentUser>,
    pub flash: Option<String>,
    /// Path and query of the current page.
    pub path: String,
}

impl PageContext {
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Link target that returns here after signing in.
    #[must_use]
    pub fn login_href(&self) -> String {
        crate::middleware::login_url(&self.path)
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let nonce = CspNonce::of(&parts.extensions).to_string();
        let path = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);

        let (user, flash) = match parts.extensions.get::<Session>() {
            Some(session) => (
                session
                    .get::<CurrentUser>(session_keys::CURRENT_USER)
                    .await
                    .ok()
                    .flatten(),
                session
                    .remove::<String>(session_keys::FLASH)
                    .await
                    .ok()
                    .flatten(),
            ),
            None => (None, None),
        };

        Ok(Self {
            nonce,
            user,
            flash,
            path,
        })
    }
}

/// An `<option>` of a select box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    #[must_use]
    pub fn new(value: &str, label: &str, current: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            selected: value == current,
        }
    }

    /// Options built from `(value, label)` pairs, with a leading empty choice.
    #[must_use]
    pub fn list<'a>(
        placeholder: &str,
        choices: impl IntoIterator<Item = (&'a str, &'a str)>,
        current: &str,
    ) -> Vec<Self> {
        std::iter::once(Self::new("", placeholder, current))
            .chain(choices.into_iter().map(|(v, l)| Self::new(v, l, current)))
            .collect()
    }
}

/// The 27 UFs as select options.
#[must_use]
pub fn state_options(current: &str) -> Vec<SelectOption> {
    let current = current.trim().to_ascii_uppercase();
    SelectOption::list(
        "UF",
        morada_core::validation::STATES.iter().map(|uf| (*uf, *uf)),
        &current,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_options_mark_current() {
        let options = state_options("sp");
        assert_eq!(options.len(), 28);
        assert!(options.iter().any(|o| o.value == "SP" && o.selected));
        assert_eq!(options.iter().filter(|o| o.selected).count(), 1);
    }

    #[test]
    fn test_login_href_carries_path() {
        let page = PageContext {
            path: "/favoritos".to_string(),
            ..PageContext::default()
        };
        assert_eq!(page.login_href(), "/login?redirect=%2Ffavoritos");
    }
}
