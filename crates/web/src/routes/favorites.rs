//! Saved properties.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use morada_core::PropertyId;
use serde::Deserialize;
use tracing::instrument;

use super::properties::{FavoriteButton, PropertyCard};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAuth, is_htmx, login_redirect, safe_redirect};
use crate::page::PageContext;
use crate::services::{AuthSession, AuthSessionError};
use crate::state::AppState;

const FAVORITES_PATH: &str = "/favoritos";

// =============================================================================
// Form Types
// =============================================================================

/// Favorite toggle form.
#[derive(Debug, Default, Deserialize)]
pub struct FavoriteForm {
    #[serde(default)]
    pub return_to: Option<String>,
}

impl FavoriteForm {
    /// The page the toggle was pressed on, or the property page.
    fn return_to(&self, id: PropertyId) -> String {
        safe_redirect(self.return_to.as_deref())
            .map_or_else(|| format!("/imoveis/{id}"), str::to_string)
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Favorites page template.
#[derive(Template, WebTemplate)]
#[template(path = "favorites/index.html")]
pub struct FavoritesTemplate {
    pub page: PageContext,
    pub cards: Vec<PropertyCard>,
    pub error: Option<String>,
}

/// Favorite button fragment (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/favorite_button.html")]
pub struct FavoriteButtonTemplate {
    pub favorite: FavoriteButton,
}

// =============================================================================
// Handlers
// =============================================================================

/// List saved properties.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    auth: AuthSession,
    RequireAuth(_current): RequireAuth,
    page: PageContext,
) -> Result<Response, AppError> {
    let token = auth.require_token().await?;
    let favorites = auth.favorites().await;

    let (cards, error) = match state.api().list_favorites(&token).await {
        Ok(properties) => (
            properties
                .iter()
                .map(|p| {
                    // The backend list is authoritative for what is shown here.
                    let mut card = PropertyCard::new(p, &favorites, FAVORITES_PATH);
                    card.mark_favorite();
                    card
                })
                .collect(),
            None,
        ),
        Err(e) if e.is_unauthorized() => {
            auth.sign_out().await?;
            return Ok(login_redirect(FAVORITES_PATH, false));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list favorites");
            (Vec::new(), Some(e.user_message()))
        }
    };

    Ok(FavoritesTemplate { page, cards, error }.into_response())
}

/// Toggle a property in or out of the favorites.
///
/// Anonymous visitors are sent to sign in without any backend call. HTMX
/// requests get the updated button back; plain posts return to the page.
#[instrument(skip(state, auth, headers, form))]
pub async fn toggle(
    State(state): State<AppState>,
    auth: AuthSession,
    headers: HeaderMap,
    Path(id): Path<PropertyId>,
    Form(form): Form<FavoriteForm>,
) -> Result<Response, AppError> {
    let htmx = is_htmx(&headers);
    let return_to = form.return_to(id);

    if !auth.is_signed_in().await {
        return Ok(login_redirect(&return_to, htmx));
    }

    let favorite = match auth.toggle_favorite(state.api(), id).await {
        Ok(favorite) => favorite,
        Err(AuthSessionError::NotSignedIn) => return Ok(login_redirect(&return_to, htmx)),
        Err(AuthSessionError::Api(e)) if e.is_unauthorized() => {
            auth.sign_out().await?;
            return Ok(login_redirect(&return_to, htmx));
        }
        Err(AuthSessionError::Api(e)) => {
            // The local set is already rolled back.
            tracing::warn!(property_id = %id, error = %e, "Favorite toggle failed");
            if !htmx {
                auth.set_flash(&e.user_message()).await?;
            }
            let favorite = auth.is_favorite(id).await;
            return Ok(toggled(id, favorite, return_to, htmx));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(property_id = %id, favorite, "Favorite toggled");

    Ok(toggled(id, favorite, return_to, htmx))
}

/// The button in its current state for HTMX, otherwise back to the page.
fn toggled(id: PropertyId, favorite: bool, return_to: String, htmx: bool) -> Response {
    if htmx {
        FavoriteButtonTemplate {
            favorite: FavoriteButton {
                property_id: id,
                favorite,
                return_to,
            },
        }
        .into_response()
    } else {
        Redirect::to(&return_to).into_response()
    }
}
