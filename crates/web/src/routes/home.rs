//! Home page route handler.

use std::collections::BTreeSet;

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use morada_core::{PropertyFilters, PropertyId, PropertyPurpose, PropertyType, SortOrder};
use tracing::instrument;

use super::properties::PropertyCard;
use crate::api::PropertyQuery;
use crate::filters;
use crate::page::{PageContext, SelectOption};
use crate::services::AuthSession;
use crate::state::AppState;

/// Number of listings per home page section.
const LISTINGS_PER_SECTION: u32 = 6;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    /// Newest listings for sale.
    pub for_sale: Vec<PropertyCard>,
    /// Newest rentals.
    pub for_rent: Vec<PropertyCard>,
    /// Property type choices of the search box.
    pub types: Vec<SelectOption>,
}

async fn latest(
    state: &AppState,
    purpose: PropertyPurpose,
    favorites: &BTreeSet<PropertyId>,
) -> Vec<PropertyCard> {
    let by_purpose = PropertyFilters {
        purpose: Some(purpose),
        ..PropertyFilters::default()
    };
    let query = PropertyQuery {
        limit: LISTINGS_PER_SECTION,
        ..PropertyQuery::public(by_purpose, SortOrder::Newest, 1)
    };

    state.api().list_properties(&query, None).await.map_or_else(
        |e| {
            tracing::error!(purpose = %purpose, error = %e, "Failed to fetch latest listings");
            Vec::new()
        },
        |page| {
            page.items
                .iter()
                .map(|p| PropertyCard::new(p, favorites, "/"))
                .collect()
        },
    )
}

/// Display the home page.
#[instrument(skip(state, auth, page))]
pub async fn home(
    State(state): State<AppState>,
    auth: AuthSession,
    page: PageContext,
) -> impl IntoResponse {
    let favorites = auth.favorites().await;
    let (for_sale, for_rent) = tokio::join!(
        latest(&state, PropertyPurpose::Sale, &favorites),
        latest(&state, PropertyPurpose::Rent, &favorites),
    );

    HomeTemplate {
        page,
        for_sale,
        for_rent,
        types: SelectOption::list(
            "Todos os tipos",
            PropertyType::ALL.iter().map(|t| (t.as_str(), t.label())),
            "",
        ),
    }
}
