//! Property and broker endpoints.

use morada_core::{
    Broker, BrokerId, Page, Property, PropertyFilters, PropertyId, PropertyInput, PropertyStatus,
    SortOrder,
};
use reqwest::Method;
use tracing::{debug, instrument};
use url::form_urlencoded;

use super::cache::{CacheKey, CacheValue};
use super::{ApiClient, ApiError};
use crate::models::AuthToken;

/// Default page size of the listing grid.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// A `GET /properties` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyQuery {
    pub filters: PropertyFilters,
    pub sort: SortOrder,
    pub page: u32,
    pub limit: u32,
    pub status: Option<PropertyStatus>,
    pub broker_id: Option<BrokerId>,
}

impl Default for PropertyQuery {
    fn default() -> Self {
        Self {
            filters: PropertyFilters::default(),
            sort: SortOrder::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            status: Some(PropertyStatus::Approved),
            broker_id: None,
        }
    }
}

impl PropertyQuery {
    /// Published listings matching the sidebar filters.
    #[must_use]
    pub fn public(filters: PropertyFilters, sort: SortOrder, page: u32) -> Self {
        Self {
            filters,
            sort,
            page: page.max(1),
            ..Self::default()
        }
    }

    /// Every listing of one broker, whatever its status.
    #[must_use]
    pub fn for_broker(broker_id: BrokerId) -> Self {
        Self {
            status: None,
            broker_id: Some(broker_id),
            limit: 50,
            ..Self::default()
        }
    }

    /// Backend query parameters. Amenities become `<amenity>=true` flags.
    #[must_use]
    pub fn to_backend_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        for (key, value) in self.filters.to_pairs() {
            match key {
                "amenities" | "min_price" | "max_price" => {}
                _ => pairs.push((key, value)),
            }
        }
        for (key, price) in [
            ("min_price", self.filters.min_price),
            ("max_price", self.filters.max_price),
        ] {
            if let Some(price) = price.filter(|p| !p.is_zero()) {
                pairs.push((key, price.amount().normalize().to_string()));
            }
        }
        for amenity in &self.filters.amenities {
            pairs.push((amenity.as_str(), "true".to_string()));
        }
        pairs.push(("sort", self.sort.as_str().to_string()));
        pairs.push(("page", self.page.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        if let Some(broker_id) = self.broker_id {
            pairs.push(("broker_id", broker_id.to_string()));
        }
        pairs
    }

    fn encoded(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.to_backend_pairs() {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }

    /// Only anonymous reads of published listings are shared between users.
    fn is_cacheable(&self) -> bool {
        self.status == Some(PropertyStatus::Approved) && self.broker_id.is_none()
    }
}

impl ApiClient {
    /// List properties.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token), fields(page = query.page))]
    pub async fn list_properties(
        &self,
        query: &PropertyQuery,
        token: Option<&AuthToken>,
    ) -> Result<Page<Property>, ApiError> {
        let encoded = query.encoded();
        let key = CacheKey::Properties(encoded.clone());
        if query.is_cacheable()
            && let Some(CacheValue::Properties(page)) = self.inner.cache.get(&key).await
        {
            debug!("Cache hit for property list");
            return Ok(page);
        }

        let path = format!("/properties?{encoded}");
        let page: Page<Property> = self.execute(self.request(Method::GET, &path, token)).await?;

        if query.is_cacheable() {
            self.inner
                .cache
                .insert(key, CacheValue::Properties(page.clone()))
                .await;
        }
        Ok(page)
    }

    /// Get a property by id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for unknown ids.
    #[instrument(skip(self))]
    pub async fn get_property(&self, id: PropertyId) -> Result<Property, ApiError> {
        let key = CacheKey::Property(id);
        if let Some(CacheValue::Property(property)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for property");
            return Ok(*property);
        }

        let property: Property = self
            .execute(self.request(Method::GET, &format!("/properties/{id}"), None))
            .await?;
        self.inner
            .cache
            .insert(key, CacheValue::Property(Box::new(property.clone())))
            .await;
        Ok(property)
    }

    /// Get a property with the owner's token, bypassing the cache so
    /// unpublished listings are visible to their broker.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token))]
    pub async fn get_own_property(
        &self,
        token: &AuthToken,
        id: PropertyId,
    ) -> Result<Property, ApiError> {
        self.execute(self.request(Method::GET, &format!("/properties/{id}"), Some(token)))
            .await
    }

    /// Create a listing. New listings start pending review.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token, input), fields(title = %input.title))]
    pub async fn create_property(
        &self,
        token: &AuthToken,
        input: &PropertyInput,
    ) -> Result<Property, ApiError> {
        let property: Property = self
            .execute(
                self.request(Method::POST, "/properties", Some(token))
                    .json(input),
            )
            .await?;
        self.invalidate_listings();
        Ok(property)
    }

    /// Update a listing.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error.
    #[instrument(skip(self, token, input))]
    pub async fn update_property(
        &self,
        token: &AuthToken,
        id: PropertyId,
        input: &PropertyInput,
    ) -> Result<Property, ApiError> {
        let property: Property = self
            .execute(
                self.request(Method::PUT, &format!("/properties/{id}"), Some(token))
                    .json(input),
            )
            .await?;
        self.inner.cache.invalidate(&CacheKey::Property(id)).await;
        self.invalidate_listings();
        Ok(property)
    }

    /// Get a broker's public profile.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for unknown ids.
    #[instrument(skip(self))]
    pub async fn get_broker(&self, id: BrokerId) -> Result<Broker, ApiError> {
        let key = CacheKey::Broker(id);
        if let Some(CacheValue::Broker(broker)) = self.inner.cache.get(&key).await {
            return Ok(*broker);
        }

        let broker: Broker = self
            .execute(self.request(Method::GET, &format!("/brokers/{id}"), None))
            .await?;
        self.inner
            .cache
            .insert(key, CacheValue::Broker(Box::new(broker.clone())))
            .await;
        Ok(broker)
    }

    fn invalidate_listings(&self) {
        // Listing pages are keyed by query string, so drop them all.
        if let Err(e) = self
            .inner
            .cache
            .invalidate_entries_if(|key, _| matches!(key, CacheKey::Properties(_)))
        {
            tracing::warn!(error = %e, "Failed to invalidate cached listings");
        }
    }
}

#[cfg(test)]
mod tests {
    use morada_core::{Amenity, PropertyPurpose};

    use super::*;

    #[test]
    fn test_backend_pairs_flag_amenities() {
        let filters = PropertyFilters {
            city: "Florianópolis".into(),
            purpose: Some(PropertyPurpose::Rent),
            amenities: [Amenity::PetFriendly, Amenity::Pool].into_iter().collect(),
            ..PropertyFilters::default()
        };
        let query = PropertyQuery::public(filters, SortOrder::PriceAsc, 2);
        let pairs = query.to_backend_pairs();
        let keys: Vec<_> = pairs.iter().map(|(k, _)| *k).collect();

        assert_eq!(
            keys,
            vec!["status", "purpose", "city", "pool", "pet_friendly", "sort", "page", "limit"]
        );
        assert!(pairs.contains(&("status", "approved".to_string())));
        assert!(pairs.contains(&("pet_friendly", "true".to_string())));
        assert!(pairs.contains(&("sort", "price_asc".to_string())));
        assert!(!keys.contains(&"amenities"));
    }

    #[test]
    fn test_backend_prices_use_decimal_point() {
        let filters = PropertyFilters::from_query("min_price=1.500,5");
        let pairs = PropertyQuery::public(filters, SortOrder::Newest, 1).to_backend_pairs();
        assert!(pairs.contains(&("min_price", "1500.5".to_string())));
    }

    #[test]
    fn test_public_query_page_floor_and_caching() {
        let query = PropertyQuery::public(PropertyFilters::default(), SortOrder::Newest, 0);
        assert_eq!(query.page, 1);
        assert!(query.is_cacheable());

        let broker = PropertyQuery::for_broker(BrokerId::new(3));
        assert!(!broker.is_cacheable());
        assert!(broker.encoded().contains("broker_id=3"));
        assert!(!broker.encoded().contains("status="));
    }
}
