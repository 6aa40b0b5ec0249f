//! Broker listing management: list, create and edit own listings.
//!
//! Only verified brokers get here (`RequireBroker`). The forms are
//! multipart because new photos travel with the listing fields; photos are
//! pushed to the image host first and the listing is saved with the
//! returned URLs.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use morada_core::validation::{self, messages};
use morada_core::{
    Address, Amenities, Amenity, BrokerId, Price, Property, PropertyId, PropertyInput,
    PropertyPurpose, PropertyStatus, PropertyType, ValidationErrors,
};
use tracing::instrument;

use super::multipart::MultipartForm;
use super::properties::{AmenityOption, price_input};
use crate::api::{PropertyQuery, UploadFile};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireBroker, login_redirect};
use crate::models::{AuthToken, CurrentUser};
use crate::page::{PageContext, SelectOption, state_options};
use crate::services::{AuthSession, IN_FLIGHT_MESSAGE};
use crate::state::AppState;

const LISTINGS_PATH: &str = "/anuncios";

/// Most photos accepted in one submission.
const MAX_PHOTOS: usize = 20;

// =============================================================================
// Form Types
// =============================================================================

/// Listing form as typed, before validation.
#[derive(Debug, Clone, Default)]
pub struct ListingFields {
    pub title: String,
    pub description: String,
    pub property_type: String,
    pub purpose: String,
    pub sale_price: String,
    pub rent_price: String,
    pub condo_fee: String,
    pub iptu: String,
    pub address: Address,
    pub bedrooms: String,
    pub bathrooms: String,
    pub parking_spots: String,
    pub area: String,
    pub amenities: Amenities,
    /// Photos already hosted, kept unless unchecked.
    pub images: Vec<String>,
}

impl ListingFields {
    fn from_form(form: &MultipartForm) -> Self {
        Self {
            title: form.text("title").to_string(),
            description: form.text("description").to_string(),
            property_type: form.text("property_type").to_string(),
            purpose: form.text("purpose").to_string(),
            sale_price: form.text("sale_price").to_string(),
            rent_price: form.text("rent_price").to_string(),
            condo_fee: form.text("condo_fee").to_string(),
            iptu: form.text("iptu").to_string(),
            address: Address {
                street: form.text("street").to_string(),
                number: form.text("number").to_string(),
                complement: form.text("complement").to_string(),
                bairro: form.text("bairro").to_string(),
                city: form.text("city").to_string(),
                state: form.text("state").to_string(),
                cep: form.text("cep").to_string(),
            },
            bedrooms: form.text("bedrooms").to_string(),
            bathrooms: form.text("bathrooms").to_string(),
            parking_spots: form.text("parking_spots").to_string(),
            area: form.text("area").to_string(),
            amenities: form
                .all("amenities")
                .iter()
                .filter_map(|slug| Amenity::parse(slug))
                .collect(),
            images: form
                .all("images")
                .iter()
                .filter(|url| !url.trim().is_empty())
                .cloned()
                .collect(),
        }
    }

    fn from_property(property: &Property) -> Self {
        let count = |n: u8| if n == 0 { String::new() } else { n.to_string() };
        Self {
            title: property.title.clone(),
            description: property.description.clone(),
            property_type: property.property_type.as_str().to_string(),
            purpose: property.purpose.as_str().to_string(),
            sale_price: price_input(property.sale_price),
            rent_price: price_input(property.rent_price),
            condo_fee: price_input(property.condo_fee),
            iptu: price_input(property.iptu),
            address: property.address.clone(),
            bedrooms: count(property.bedrooms),
            bathrooms: count(property.bathrooms),
            parking_spots: count(property.parking_spots),
            area: property.area.map(|a| a.to_string()).unwrap_or_default(),
            amenities: property.amenities,
            images: property.images.clone(),
        }
    }

    /// Validate and build the backend payload, adding `photos` after the
    /// images already kept.
    fn to_input(&self, photos: Vec<String>) -> Result<PropertyInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.add("title", messages::TITLE_REQUIRED);
        }
        let property_type = self.property_type.parse::<PropertyType>().ok();
        if property_type.is_none() {
            errors.add("property_type", messages::TYPE_REQUIRED);
        }
        let purpose = self.purpose.parse::<PropertyPurpose>().ok();
        if purpose.is_none() {
            errors.add("purpose", messages::PURPOSE_REQUIRED);
        }

        let sale_price = Price::parse_brl(&self.sale_price);
        let rent_price = Price::parse_brl(&self.rent_price);
        match purpose {
            Some(PropertyPurpose::Sale) if sale_price.is_none_or(|p| p.is_zero()) => {
                errors.add("sale_price", messages::PRICE_REQUIRED);
            }
            Some(PropertyPurpose::Rent) if rent_price.is_none_or(|p| p.is_zero()) => {
                errors.add("rent_price", messages::PRICE_REQUIRED);
            }
            _ => {}
        }

        validation::check_address(&self.address, &mut errors);

        let (Some(property_type), Some(purpose)) = (property_type, purpose) else {
            return Err(errors);
        };
        errors.into_result()?;

        let mut images = self.images.clone();
        images.extend(photos);

        Ok(PropertyInput {
            title: title.to_string(),
            description: self.description.trim().to_string(),
            property_type,
            purpose,
            sale_price,
            rent_price,
            condo_fee: Price::parse_brl(&self.condo_fee),
            iptu: Price::parse_brl(&self.iptu),
            address: validation::normalize_address(&self.address),
            bedrooms: parse_count(&self.bedrooms),
            bathrooms: parse_count(&self.bathrooms),
            parking_spots: parse_count(&self.parking_spots),
            area: self.area.trim().parse().ok().filter(|a| *a > 0),
            amenities: self.amenities,
            images,
        })
    }

    #[must_use]
    pub fn types(&self) -> Vec<SelectOption> {
        SelectOption::list(
            "Selecione",
            PropertyType::ALL.iter().map(|t| (t.as_str(), t.label())),
            &self.property_type,
        )
    }

    #[must_use]
    pub fn purposes(&self) -> Vec<SelectOption> {
        SelectOption::list(
            "Selecione",
            PropertyPurpose::ALL.iter().map(|p| (p.as_str(), p.label())),
            &self.purpose,
        )
    }

    #[must_use]
    pub fn states(&self) -> Vec<SelectOption> {
        state_options(&self.address.state)
    }

    #[must_use]
    pub fn amenity_options(&self) -> Vec<AmenityOption> {
        Amenity::ALL
            .iter()
            .map(|a| AmenityOption {
                value: a.as_str(),
                label: a.label(),
                checked: self.amenities.has(*a),
            })
            .collect()
    }
}

/// Empty or unparseable counts are zero.
fn parse_count(value: &str) -> u8 {
    value.trim().parse().unwrap_or(0)
}

/// Brokers are filed under their user id.
const fn broker_id(user: &CurrentUser) -> BrokerId {
    BrokerId::new(user.id.as_i64())
}

// =============================================================================
// Templates
// =============================================================================

/// A row of the broker's listing table.
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub id: PropertyId,
    pub title: String,
    pub price: String,
    pub status: &'static str,
    pub status_slug: &'static str,
    pub public: bool,
}

impl From<&Property> for ListingRow {
    fn from(property: &Property) -> Self {
        Self {
            id: property.id,
            title: property.title.clone(),
            price: property.price_label(),
            status: property.status.label(),
            status_slug: property.status.as_str(),
            public: property.status == PropertyStatus::Approved,
        }
    }
}

/// Broker listings page template.
#[derive(Template, WebTemplate)]
#[template(path = "listings/index.html")]
pub struct ListingsTemplate {
    pub page: PageContext,
    pub rows: Vec<ListingRow>,
    pub error: Option<String>,
}

/// Create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "listings/form.html")]
pub struct ListingFormTemplate {
    pub page: PageContext,
    pub heading: &'static str,
    pub action: String,
    pub form: ListingFields,
    pub errors: ValidationErrors,
    pub error: Option<String>,
    pub uploads_enabled: bool,
}

impl ListingFormTemplate {
    fn new(state: &AppState, page: PageContext, target: FormTarget, form: ListingFields) -> Self {
        Self {
            page,
            heading: target.heading(),
            action: target.action(),
            form,
            errors: ValidationErrors::new(),
            error: None,
            uploads_enabled: state.uploads().is_some(),
        }
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Whether the form creates a listing or edits one.
#[derive(Debug, Clone, Copy)]
enum FormTarget {
    New,
    Edit(PropertyId),
}

impl FormTarget {
    const fn heading(self) -> &'static str {
        match self {
            Self::New => "Novo anúncio",
            Self::Edit(_) => "Editar anúncio",
        }
    }

    fn action(self) -> String {
        match self {
            Self::New => format!("{LISTINGS_PATH}/novo"),
            Self::Edit(id) => format!("{LISTINGS_PATH}/{id}/editar"),
        }
    }

    fn guard_key(self) -> String {
        match self {
            Self::New => "anuncio-novo".to_string(),
            Self::Edit(id) => format!("anuncio-{id}"),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Push new photos to the image host, in order.
async fn upload_photos(state: &AppState, photos: Vec<UploadFile>) -> Result<Vec<String>, String> {
    if photos.is_empty() {
        return Ok(Vec::new());
    }
    if photos.len() > MAX_PHOTOS {
        return Err(format!("Envie no máximo {MAX_PHOTOS} fotos por vez."));
    }
    let Some(uploads) = state.uploads() else {
        return Err("O envio de fotos está indisponível no momento.".to_string());
    };
    for photo in &photos {
        photo.check_image().map_err(|e| e.user_message())?;
    }

    let mut urls = Vec::with_capacity(photos.len());
    for photo in photos {
        let url = uploads.upload_image(photo).await.map_err(|e| {
            tracing::warn!(error = %e, "Photo upload failed");
            e.user_message()
        })?;
        urls.push(url);
    }
    Ok(urls)
}

/// Load one of the broker's own listings; another broker's is not found.
async fn own_listing(
    state: &AppState,
    token: &AuthToken,
    user: &CurrentUser,
    id: PropertyId,
) -> Result<Property, AppError> {
    let property = state.api().get_own_property(token, id).await?;
    if property.broker_id != Some(broker_id(user)) {
        tracing::warn!(property_id = %id, user_id = %user.id, "Edit of another broker's listing");
        return Err(AppError::NotFound(format!("listing {id}")));
    }
    Ok(property)
}

/// Validate, upload photos and save. Re-renders the form on any failure.
async fn save_listing(
    state: &AppState,
    auth: &AuthSession,
    page: PageContext,
    target: FormTarget,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = MultipartForm::read(multipart).await?;
    let photos = form.take_files("photos");
    let fields = ListingFields::from_form(&form);

    // Validate before touching the image host.
    if let Err(errors) = fields.to_input(Vec::new()) {
        let mut template = ListingFormTemplate::new(state, page, target, fields);
        template.error = errors.first().map(str::to_string);
        template.errors = errors;
        return Ok(template.into_response());
    }

    let owner = auth.submit_owner();
    let Ok(_ticket) = state.submit_guard().try_begin(&target.guard_key(), owner.as_deref()) else {
        return Ok(ListingFormTemplate::new(state, page, target, fields)
            .with_error(IN_FLIGHT_MESSAGE)
            .into_response());
    };

    let token = auth.require_token().await?;
    let urls = match upload_photos(state, photos).await {
        Ok(urls) => urls,
        Err(message) => {
            return Ok(ListingFormTemplate::new(state, page, target, fields)
                .with_error(message)
                .into_response());
        }
    };
    let input = match fields.to_input(urls) {
        Ok(input) => input,
        Err(errors) => {
            let mut template = ListingFormTemplate::new(state, page, target, fields);
            template.errors = errors;
            return Ok(template.into_response());
        }
    };

    let result = match target {
        FormTarget::New => state.api().create_property(&token, &input).await,
        FormTarget::Edit(id) => state.api().update_property(&token, id, &input).await,
    };

    match result {
        Ok(property) => {
            tracing::info!(property_id = %property.id, "Listing saved");
            let message = match target {
                FormTarget::New => "Anúncio enviado para análise.",
                FormTarget::Edit(_) => "Anúncio atualizado.",
            };
            auth.set_flash(message).await?;
            Ok(Redirect::to(LISTINGS_PATH).into_response())
        }
        Err(e) if e.is_unauthorized() => {
            auth.sign_out().await?;
            Ok(login_redirect(&target.action(), false))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Listing save failed");
            // Hosted photos stay attached so they are not uploaded twice.
            let fields = ListingFields {
                images: input.images,
                ..fields
            };
            Ok(ListingFormTemplate::new(state, page, target, fields)
                .with_error(e.user_message())
                .into_response())
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List the broker's own listings, whatever their status.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    auth: AuthSession,
    RequireBroker(user): RequireBroker,
    page: PageContext,
) -> Result<Response, AppError> {
    let token = auth.require_token().await?;
    let query = PropertyQuery::for_broker(broker_id(&user));

    let (rows, error) = match state.api().list_properties(&query, Some(&token)).await {
        Ok(result) => (result.items.iter().map(ListingRow::from).collect(), None),
        Err(e) if e.is_unauthorized() => {
            auth.sign_out().await?;
            return Ok(login_redirect(LISTINGS_PATH, false));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list broker listings");
            (Vec::new(), Some(e.user_message()))
        }
    };

    Ok(ListingsTemplate { page, rows, error }.into_response())
}

/// Empty listing form.
#[instrument(skip_all)]
pub async fn new_page(
    State(state): State<AppState>,
    RequireBroker(_user): RequireBroker,
    page: PageContext,
) -> ListingFormTemplate {
    ListingFormTemplate::new(&state, page, FormTarget::New, ListingFields::default())
}

/// Create a listing.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    auth: AuthSession,
    RequireBroker(_user): RequireBroker,
    page: PageContext,
    multipart: Multipart,
) -> Result<Response, AppError> {
    save_listing(&state, &auth, page, FormTarget::New, multipart).await
}

/// Edit form of an own listing.
#[instrument(skip(state, auth, user, page))]
pub async fn edit_page(
    State(state): State<AppState>,
    auth: AuthSession,
    RequireBroker(user): RequireBroker,
    page: PageContext,
    Path(id): Path<PropertyId>,
) -> Result<Response, AppError> {
    let token = auth.require_token().await?;
    let property = own_listing(&state, &token, &user, id).await?;
    Ok(ListingFormTemplate::new(
        &state,
        page,
        FormTarget::Edit(id),
        ListingFields::from_property(&property),
    )
    .into_response())
}

/// Save an own listing.
#[instrument(skip(state, auth, user, page, multipart))]
pub async fn update(
    State(state): State<AppState>,
    auth: AuthSession,
    RequireBroker(user): RequireBroker,
    page: PageContext,
    Path(id): Path<PropertyId>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let token = auth.require_token().await?;
    own_listing(&state, &token, &user, id).await?;
    save_listing(&state, &auth, page, FormTarget::Edit(id), multipart).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid() -> ListingFields {
        ListingFields {
            title: "Apartamento com varanda".to_string(),
            property_type: "apartment".to_string(),
            purpose: "rent".to_string(),
            rent_price: "2.500,00".to_string(),
            address: Address {
                city: "Campinas".to_string(),
                state: "sp".to_string(),
                ..Address::default()
            },
            bedrooms: "2".to_string(),
            amenities: [Amenity::Balcony].into_iter().collect(),
            images: vec!["https://img.example/1.jpg".to_string()],
            ..ListingFields::default()
        }
    }

    #[test]
    fn test_valid_listing_builds_input() {
        let input = valid()
            .to_input(vec!["https://img.example/2.jpg".to_string()])
            .unwrap();
        assert_eq!(input.property_type, PropertyType::Apartment);
        assert_eq!(input.purpose, PropertyPurpose::Rent);
        assert_eq!(input.rent_price, Price::parse_brl("2500"));
        assert_eq!(input.sale_price, None);
        assert_eq!(input.bedrooms, 2);
        assert_eq!(input.bathrooms, 0);
        assert_eq!(input.address.state, "SP");
        assert!(input.amenities.balcony);
        assert_eq!(input.images.len(), 2);
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let errors = ListingFields::default().to_input(Vec::new()).unwrap_err();
        assert_eq!(errors.get("title"), Some(messages::TITLE_REQUIRED));
        assert_eq!(errors.get("property_type"), Some(messages::TYPE_REQUIRED));
        assert_eq!(errors.get("purpose"), Some(messages::PURPOSE_REQUIRED));
        assert_eq!(errors.get("city"), Some(messages::CITY_REQUIRED));
    }

    #[test]
    fn test_price_must_match_purpose() {
        let fields = ListingFields {
            purpose: "sale".to_string(),
            ..valid()
        };
        let errors = fields.to_input(Vec::new()).unwrap_err();
        assert_eq!(errors.get("sale_price"), Some(messages::PRICE_REQUIRED));
        assert_eq!(errors.get("rent_price"), None);
    }

    #[test]
    fn test_form_targets() {
        let id = PropertyId::new(9);
        assert_eq!(FormTarget::New.action(), "/anuncios/novo");
        assert_eq!(FormTarget::Edit(id).action(), "/anuncios/9/editar");
        assert_ne!(FormTarget::New.guard_key(), FormTarget::Edit(id).guard_key());
    }
}
