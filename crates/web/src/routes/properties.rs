//! Property listing and detail handlers.
//!
//! The listing page is driven entirely by its query string: filters, sort
//! and page. The filter sidebar submits to `/imoveis/filtrar`, which
//! redirects to the canonical listing URL.

use std::collections::BTreeSet;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use morada_core::search::LISTING_PATH;
use morada_core::{
    Amenity, Broker, BrokerStatus, ListingQuery, Property, PropertyFilters, PropertyId,
    PropertyPurpose, PropertyType, SortOrder,
};
use serde::Deserialize;
use tracing::instrument;

use crate::api::{ApiError, PropertyQuery};
use crate::filters;
use crate::page::{PageContext, SelectOption};
use crate::services::AuthSession;
use crate::state::AppState;

// =============================================================================
// View Models
// =============================================================================

/// Which way the carousel moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Next,
    Prev,
}

/// Index of the neighbouring image, wrapping around at both ends.
#[must_use]
pub const fn step_image(index: usize, len: usize, direction: Direction) -> usize {
    if len == 0 {
        return 0;
    }
    let index = index % len;
    match direction {
        Direction::Next => (index + 1) % len,
        Direction::Prev => (index + len - 1) % len,
    }
}

/// Image carousel of a card or detail page.
#[derive(Debug, Clone)]
pub struct Carousel {
    pub property_id: PropertyId,
    pub images: Vec<String>,
    pub index: usize,
    pub alt: String,
}

impl Carousel {
    #[must_use]
    pub fn new(property: &Property, index: usize) -> Self {
        let len = property.images.len();
        Self {
            property_id: property.id,
            images: property.images.clone(),
            index: if len == 0 { 0 } else { index % len },
            alt: property.title.clone(),
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.images.get(self.index).map(String::as_str)
    }

    #[must_use]
    pub fn has_many(&self) -> bool {
        self.images.len() > 1
    }

    /// `2/5`
    #[must_use]
    pub fn position(&self) -> String {
        format!("{}/{}", self.index + 1, self.images.len())
    }

    fn href(&self, direction: &str) -> String {
        format!(
            "/imoveis/{}/imagem?index={}&dir={direction}",
            self.property_id, self.index
        )
    }

    #[must_use]
    pub fn next_href(&self) -> String {
        self.href("next")
    }

    #[must_use]
    pub fn prev_href(&self) -> String {
        self.href("prev")
    }
}

/// Favorite toggle of one property.
#[derive(Debug, Clone)]
pub struct FavoriteButton {
    pub property_id: PropertyId,
    pub favorite: bool,
    /// Page to come back to, also used as the sign-in return path.
    pub return_to: String,
}

impl FavoriteButton {
    #[must_use]
    pub fn action(&self) -> String {
        format!("/favoritos/{}", self.property_id)
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        if self.favorite {
            "Remover dos favoritos"
        } else {
            "Salvar nos favoritos"
        }
    }
}

/// Property card for grids.
#[derive(Debug, Clone)]
pub struct PropertyCard {
    pub id: PropertyId,
    pub href: String,
    pub title: String,
    pub price: String,
    pub location: String,
    /// `Apartamento · Aluguel`
    pub kind: String,
    pub features: Vec<String>,
    pub status: String,
    pub available: bool,
    carousel: Carousel,
    favorite: FavoriteButton,
}

impl PropertyCard {
    #[must_use]
    pub fn new(property: &Property, favorites: &BTreeSet<PropertyId>, return_to: &str) -> Self {
        Self {
            id: property.id,
            href: format!("/imoveis/{}", property.id),
            title: property.title.clone(),
            price: property.price_label(),
            location: property.address.neighbourhood(),
            kind: format!(
                "{} · {}",
                property.property_type.label(),
                property.purpose.label()
            ),
            features: features(property),
            status: property.status.label().to_string(),
            available: property.status.is_available(),
            carousel: Carousel::new(property, 0),
            favorite: FavoriteButton {
                property_id: property.id,
                favorite: favorites.contains(&property.id),
                return_to: return_to.to_string(),
            },
        }
    }

    #[must_use]
    pub const fn carousel(&self) -> &Carousel {
        &self.carousel
    }

    #[must_use]
    pub const fn favorite_button(&self) -> &FavoriteButton {
        &self.favorite
    }

    /// Show the card as saved regardless of the session's favorite set.
    pub const fn mark_favorite(&mut self) {
        self.favorite.favorite = true;
    }
}

fn count_label(n: u8, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("1 {singular}")
    } else {
        format!("{n} {plural}")
    }
}

fn features(property: &Property) -> Vec<String> {
    let mut features = Vec::new();
    if property.bedrooms > 0 {
        features.push(count_label(property.bedrooms, "quarto", "quartos"));
    }
    if property.bathrooms > 0 {
        features.push(count_label(property.bathrooms, "banheiro", "banheiros"));
    }
    if property.parking_spots > 0 {
        features.push(count_label(property.parking_spots, "vaga", "vagas"));
    }
    if let Some(area) = property.area.filter(|a| *a > 0) {
        features.push(format!("{area} m²"));
    }
    features
}

/// A checkbox of the amenity filter.
#[derive(Debug, Clone)]
pub struct AmenityOption {
    pub value: &'static str,
    pub label: &'static str,
    pub checked: bool,
}

/// Filter sidebar state.
#[derive(Debug, Clone)]
pub struct FilterForm {
    pub search: String,
    pub city: String,
    pub bairro: String,
    pub min_price: String,
    pub max_price: String,
    pub types: Vec<SelectOption>,
    pub purposes: Vec<SelectOption>,
    pub bedrooms: Vec<SelectOption>,
    pub bathrooms: Vec<SelectOption>,
    pub amenities: Vec<AmenityOption>,
    pub active_count: usize,
}

fn count_options(current: Option<u8>) -> Vec<SelectOption> {
    let current = current.map(|n| n.to_string()).unwrap_or_default();
    let choices = [("1", "1+"), ("2", "2+"), ("3", "3+"), ("4", "4+")];
    SelectOption::list("Qualquer", choices, &current)
}

pub(super) fn price_input(value: Option<morada_core::Price>) -> String {
    value
        .map(|p| p.amount().normalize().to_string().replace('.', ","))
        .unwrap_or_default()
}

impl From<&PropertyFilters> for FilterForm {
    fn from(filters: &PropertyFilters) -> Self {
        let current_type = filters.property_type.map(PropertyType::as_str).unwrap_or_default();
        let current_purpose = filters.purpose.map(PropertyPurpose::as_str).unwrap_or_default();
        Self {
            search: filters.search.clone(),
            city: filters.city.clone(),
            bairro: filters.bairro.clone(),
            min_price: price_input(filters.min_price),
            max_price: price_input(filters.max_price),
            types: SelectOption::list(
                "Todos os tipos",
                PropertyType::ALL.iter().map(|t| (t.as_str(), t.label())),
                current_type,
            ),
            purposes: SelectOption::list(
                "Comprar ou alugar",
                PropertyPurpose::ALL.iter().map(|p| (p.as_str(), p.label())),
                current_purpose,
            ),
            bedrooms: count_options(filters.bedrooms),
            bathrooms: count_options(filters.bathrooms),
            amenities: Amenity::ALL
                .iter()
                .map(|a| AmenityOption {
                    value: a.as_str(),
                    label: a.label(),
                    checked: filters.has_amenity(a),
                })
                .collect(),
            active_count: filters.active_count(),
        }
    }
}

/// A sort link above the results.
#[derive(Debug, Clone)]
pub struct SortLink {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

/// Pagination below the results.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub current: u32,
    pub total_pages: u32,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

/// Broker box on the detail page.
#[derive(Debug, Clone)]
pub struct BrokerCard {
    pub name: String,
    pub creci: String,
    pub phone: Option<String>,
    pub verified: bool,
    pub listings: Option<String>,
}

impl BrokerCard {
    fn from_broker(broker: &Broker) -> Self {
        Self {
            name: broker.user.name.clone(),
            creci: broker.creci().to_string(),
            phone: broker.user.phone.clone().filter(|p| !p.is_empty()),
            verified: broker.status() == BrokerStatus::Approved,
            listings: (broker.listings_count > 0)
                .then(|| format!("{} imóveis anunciados", broker.listings_count)),
        }
    }

    /// Fallback from the reference fields carried on the listing.
    fn from_listing(property: &Property) -> Option<Self> {
        let name = property.broker_name.clone().filter(|n| !n.is_empty())?;
        Some(Self {
            name,
            creci: property.broker_creci.clone().unwrap_or_default(),
            phone: property.broker_phone.clone().filter(|p| !p.is_empty()),
            verified: false,
            listings: None,
        })
    }
}

/// A labelled price line on the detail page.
#[derive(Debug, Clone)]
pub struct PriceLine {
    pub label: &'static str,
    pub value: String,
}

fn price_lines(property: &Property) -> Vec<PriceLine> {
    [
        ("Venda", property.sale_price),
        ("Aluguel", property.rent_price),
        ("Condomínio", property.condo_fee),
        ("IPTU", property.iptu),
    ]
    .into_iter()
    .filter_map(|(label, price)| {
        price.filter(|p| !p.is_zero()).map(|p| PriceLine {
            label,
            value: p.display(),
        })
    })
    .collect()
}

// =============================================================================
// Templates
// =============================================================================

/// Listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "properties/index.html")]
pub struct PropertiesIndexTemplate {
    pub page: PageContext,
    pub cards: Vec<PropertyCard>,
    pub total: u64,
    pub filter_form: FilterForm,
    pub sorts: Vec<SortLink>,
    pub pagination: Pagination,
    pub error: Option<String>,
}

/// Property detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "properties/show.html")]
pub struct PropertyShowTemplate {
    pub page: PageContext,
    pub card: PropertyCard,
    pub description: String,
    pub address: String,
    pub prices: Vec<PriceLine>,
    pub amenities: Vec<&'static str>,
    pub broker: Option<BrokerCard>,
}

/// Missing property page template. With `error`, the listing exists but
/// could not be loaded.
#[derive(Template, WebTemplate)]
#[template(path = "properties/not_found.html")]
pub struct PropertyNotFoundTemplate {
    pub page: PageContext,
    pub error: Option<String>,
}

/// Carousel fragment (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/carousel.html")]
pub struct CarouselTemplate {
    pub carousel: Carousel,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the listing page.
#[instrument(skip(state, auth, page))]
pub async fn index(
    State(state): State<AppState>,
    auth: AuthSession,
    page: PageContext,
    RawQuery(raw): RawQuery,
) -> impl IntoResponse {
    let listing = ListingQuery::from_query(raw.as_deref().unwrap_or_default());
    let query = PropertyQuery::public(listing.filters.clone(), listing.sort, listing.page);
    let favorites = auth.favorites().await;

    let (cards, total, total_pages, error) =
        match state.api().list_properties(&query, None).await {
            Ok(result) => (
                result
                    .items
                    .iter()
                    .map(|p| PropertyCard::new(p, &favorites, &page.path))
                    .collect(),
                result.total,
                result.total_pages(),
                None,
            ),
            Err(e) => {
                tracing::error!(error = %e, "Failed to list properties");
                (Vec::new(), 0, 1, Some(e.user_message()))
            }
        };

    let current = listing.page.min(total_pages);
    let pagination = Pagination {
        current,
        total_pages,
        prev_href: (current > 1).then(|| listing.page_href(current - 1)),
        next_href: (current < total_pages).then(|| listing.page_href(current + 1)),
    };
    let sorts = SortOrder::ALL
        .iter()
        .map(|sort| SortLink {
            label: sort.label(),
            href: listing.sort_href(*sort),
            active: *sort == listing.sort,
        })
        .collect();

    PropertiesIndexTemplate {
        filter_form: FilterForm::from(&listing.filters),
        page,
        cards,
        total,
        sorts,
        pagination,
        error,
    }
}

/// Apply the sidebar: redirect to the canonical listing URL.
///
/// Sort and page are dropped so the new result set starts at page one.
pub async fn apply_filters(RawQuery(raw): RawQuery) -> Redirect {
    let filters = PropertyFilters::from_query(raw.as_deref().unwrap_or_default());
    Redirect::to(&filters.apply_href())
}

/// Clear every filter.
pub async fn clear_filters() -> Redirect {
    Redirect::to(LISTING_PATH)
}

fn not_found(page: PageContext) -> Response {
    (StatusCode::NOT_FOUND, PropertyNotFoundTemplate { page, error: None }).into_response()
}

fn unavailable(page: PageContext, e: &ApiError) -> Response {
    let error = Some(e.user_message());
    (StatusCode::BAD_GATEWAY, PropertyNotFoundTemplate { page, error }).into_response()
}

/// Display a property.
#[instrument(skip(state, auth, page))]
pub async fn show(
    State(state): State<AppState>,
    auth: AuthSession,
    page: PageContext,
    Path(raw_id): Path<String>,
) -> Response {
    let Ok(id) = raw_id.parse::<PropertyId>() else {
        return not_found(page);
    };

    let property = match state.api().get_property(id).await {
        Ok(property) => property,
        Err(e) if e.is_not_found() => return not_found(page),
        Err(e) => {
            tracing::error!(property_id = %id, error = %e, "Failed to load property");
            return unavailable(page, &e);
        }
    };

    let broker = match property.broker_id {
        Some(broker_id) => match state.api().get_broker(broker_id).await {
            Ok(broker) => Some(BrokerCard::from_broker(&broker)),
            Err(e) => {
                tracing::warn!(broker_id = %broker_id, error = %e, "Failed to load broker");
                BrokerCard::from_listing(&property)
            }
        },
        None => BrokerCard::from_listing(&property),
    };

    let favorites = auth.favorites().await;
    let card = PropertyCard::new(&property, &favorites, &page.path);

    PropertyShowTemplate {
        description: property.description.clone(),
        address: property.address.one_line(),
        prices: price_lines(&property),
        amenities: property
            .amenities
            .enabled()
            .into_iter()
            .map(Amenity::label)
            .collect(),
        broker,
        card,
        page,
    }
    .into_response()
}

/// Carousel query parameters.
#[derive(Debug, Deserialize)]
pub struct CarouselQuery {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub dir: Direction,
}

/// Step a card's carousel (HTMX fragment).
///
/// When the listing cannot be loaded the response is empty and the card
/// keeps the image it shows.
#[instrument(skip(state))]
pub async fn carousel(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
    Query(query): Query<CarouselQuery>,
) -> Response {
    let property = match state.api().get_property(id).await {
        Ok(property) => property,
        Err(e) => {
            tracing::warn!(property_id = %id, error = %e, "Failed to load carousel images");
            return StatusCode::NO_CONTENT.into_response();
        }
    };
    let index = step_image(query.index, property.images.len(), query.dir);
    CarouselTemplate {
        carousel: Carousel::new(&property, index),
    }
    .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn property(images: &[&str]) -> Property {
        serde_json::from_value(serde_json::json!({
            "id": 4,
            "title": "Casa com quintal",
            "property_type": "house",
            "purpose": "sale",
            "sale_price": "650000",
            "bedrooms": 3,
            "bathrooms": 1,
            "area": 140,
            "images": images,
            "status": "approved",
            "created_at": "2026-01-10T12:00:00Z",
            "updated_at": "2026-01-10T12:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_next_cycles_two_images() {
        let p = property(&["img1", "img2"]);
        let mut carousel = Carousel::new(&p, 0);
        assert_eq!(carousel.current(), Some("img1"));

        carousel = Carousel::new(&p, step_image(carousel.index, 2, Direction::Next));
        assert_eq!(carousel.current(), Some("img2"));

        carousel = Carousel::new(&p, step_image(carousel.index, 2, Direction::Next));
        assert_eq!(carousel.current(), Some("img1"));
    }

    #[test]
    fn test_step_image_edges() {
        assert_eq!(step_image(0, 3, Direction::Prev), 2);
        assert_eq!(step_image(7, 3, Direction::Next), 2);
        assert_eq!(step_image(0, 0, Direction::Next), 0);
        assert_eq!(step_image(0, 1, Direction::Next), 0);
    }

    #[test]
    fn test_carousel_links_and_position() {
        let carousel = Carousel::new(&property(&["a", "b", "c"]), 1);
        assert_eq!(carousel.position(), "2/3");
        assert_eq!(carousel.next_href(), "/imoveis/4/imagem?index=1&dir=next");
        assert!(Carousel::new(&property(&[]), 5).current().is_none());
    }

    #[test]
    fn test_card_features_and_favorite() {
        let p = property(&["a"]);
        let favorites: BTreeSet<_> = [PropertyId::new(4)].into_iter().collect();
        let card = PropertyCard::new(&p, &favorites, "/imoveis");
        assert_eq!(card.features, vec!["3 quartos", "1 banheiro", "140 m²"]);
        assert_eq!(card.kind, "Casa · Venda");
        assert_eq!(card.price, "R$ 650.000");
        assert!(card.favorite_button().favorite);
        assert_eq!(card.favorite_button().action(), "/favoritos/4");
    }

    #[test]
    fn test_filter_form_marks_selection() {
        let filters = PropertyFilters::from_query("type=land&bedrooms=2&amenities=gym&max_price=1.500,5");
        let form = FilterForm::from(&filters);
        assert!(form.types.iter().any(|o| o.value == "land" && o.selected));
        assert!(form.bedrooms.iter().any(|o| o.value == "2" && o.selected));
        assert!(form.amenities.iter().any(|a| a.value == "gym" && a.checked));
        assert_eq!(form.max_price, "1500,5");
        assert_eq!(form.active_count, 4);
    }
}
