//! Listing filters and their URL representation.
//!
//! The filter sidebar is bound to the query string of `/imoveis`. Parsing is
//! lenient (unknown keys and malformed values are dropped) and serializing
//! is canonical: only fields holding a real constraint are written, always
//! in the same key order, so equal filters always produce equal URLs.

use std::collections::BTreeSet;

use url::form_urlencoded;

use crate::types::{Amenity, Price, PropertyPurpose, PropertyType};

/// Path of the listing page.
pub const LISTING_PATH: &str = "/imoveis";

/// Query keys a filter URL may carry.
pub const FILTER_KEYS: &[&str] = &[
    "search",
    "type",
    "purpose",
    "city",
    "bairro",
    "bedrooms",
    "bathrooms",
    "min_price",
    "max_price",
    "amenities",
];

/// Search constraints chosen in the filter sidebar.
///
/// `None`, zero and blank values all mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFilters {
    pub search: String,
    pub property_type: Option<PropertyType>,
    pub purpose: Option<PropertyPurpose>,
    pub city: String,
    pub bairro: String,
    /// Minimum number of bedrooms.
    pub bedrooms: Option<u8>,
    /// Minimum number of bathrooms.
    pub bathrooms: Option<u8>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub amenities: BTreeSet<Amenity>,
}

impl PropertyFilters {
    /// Parse filters from a raw query string (without the leading `?`).
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut filters = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            filters.apply_pair(&key, &value);
        }
        filters
    }

    fn apply_pair(&mut self, key: &str, value: &str) {
        let value = value.trim();
        match key {
            "search" => value.clone_into(&mut self.search),
            "type" => self.property_type = value.parse().ok(),
            "purpose" => self.purpose = value.parse().ok(),
            "city" => value.clone_into(&mut self.city),
            "bairro" => value.clone_into(&mut self.bairro),
            "bedrooms" => self.bedrooms = parse_count(value),
            "bathrooms" => self.bathrooms = parse_count(value),
            "min_price" => self.min_price = parse_price(value),
            "max_price" => self.max_price = parse_price(value),
            // Accepts both `amenities=pool,gym` and repeated checkbox keys.
            "amenities" => self
                .amenities
                .extend(value.split(',').filter_map(Amenity::parse)),
            _ => {}
        }
    }

    /// Key/value pairs of every active filter, in canonical order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_text(&mut pairs, "search", &self.search);
        if let Some(property_type) = self.property_type {
            pairs.push(("type", property_type.as_str().to_string()));
        }
        if let Some(purpose) = self.purpose {
            pairs.push(("purpose", purpose.as_str().to_string()));
        }
        push_text(&mut pairs, "city", &self.city);
        push_text(&mut pairs, "bairro", &self.bairro);
        push_count(&mut pairs, "bedrooms", self.bedrooms);
        push_count(&mut pairs, "bathrooms", self.bathrooms);
        push_price(&mut pairs, "min_price", self.min_price);
        push_price(&mut pairs, "max_price", self.max_price);
        if !self.amenities.is_empty() {
            let joined = self
                .amenities
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("amenities", joined));
        }
        pairs
    }

    /// URL-encoded query of the active filters; empty when none are set.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.to_pairs() {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }

    /// Where the "apply" action navigates.
    #[must_use]
    pub fn apply_href(&self) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            LISTING_PATH.to_string()
        } else {
            format!("{LISTING_PATH}?{query}")
        }
    }

    /// Where the "clear" action navigates.
    #[must_use]
    pub const fn clear_href() -> &'static str {
        LISTING_PATH
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_pairs().is_empty()
    }

    /// Number of active filters, for the sidebar badge.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.to_pairs().len() + self.amenities.len().saturating_sub(1)
    }

    #[must_use]
    pub fn has_amenity(&self, amenity: &Amenity) -> bool {
        self.amenities.contains(amenity)
    }
}

fn parse_count(value: &str) -> Option<u8> {
    value
        .trim_end_matches('+')
        .parse::<u8>()
        .ok()
        .filter(|n| *n > 0)
}

fn parse_price(value: &str) -> Option<Price> {
    Price::parse_brl(value).filter(|p| !p.is_zero())
}

fn push_text(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        pairs.push((key, value.to_string()));
    }
}

fn push_count(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<u8>) {
    if let Some(n) = value.filter(|n| *n > 0) {
        pairs.push((key, n.to_string()));
    }
}

fn push_price(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<Price>) {
    // Comma decimal mark, so the value parses back with `Price::parse_brl`.
    if let Some(price) = value.filter(|p| !p.is_zero()) {
        pairs.push((key, price.amount().normalize().to_string().replace('.', ",")));
    }
}

/// Ordering of the listing page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

impl SortOrder {
    pub const ALL: &'static [Self] = &[Self::Newest, Self::PriceAsc, Self::PriceDesc];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "recent",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Mais recentes",
            Self::PriceAsc => "Menor preço",
            Self::PriceDesc => "Maior preço",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|o| o.as_str() == s.trim())
    }
}

/// Everything the listing page reads from its URL: the filters plus the
/// view parameters that live outside the filter set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingQuery {
    pub filters: PropertyFilters,
    pub sort: SortOrder,
    pub page: u32,
}

impl ListingQuery {
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut sort = SortOrder::default();
        let mut page = 1;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "sort" => sort = SortOrder::parse(&value).unwrap_or_default(),
                "page" => page = value.trim().parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(1),
                _ => {}
            }
        }
        Self {
            filters: PropertyFilters::from_query(query),
            sort,
            page,
        }
    }

    /// Link to another page of the same result set.
    #[must_use]
    pub fn page_href(&self, page: u32) -> String {
        self.href_with(self.sort, page)
    }

    /// Link to the first page under a different ordering.
    #[must_use]
    pub fn sort_href(&self, sort: SortOrder) -> String {
        self.href_with(sort, 1)
    }

    fn href_with(&self, sort: SortOrder, page: u32) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.filters.to_pairs() {
            serializer.append_pair(key, &value);
        }
        if sort != SortOrder::default() {
            serializer.append_pair("sort", sort.as_str());
        }
        if page > 1 {
            serializer.append_pair("page", &page.to_string());
        }
        let query = serializer.finish();
        if query.is_empty() {
            LISTING_PATH.to_string()
        } else {
            format!("{LISTING_PATH}?{query}")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn keys_of(href: &str) -> Vec<String> {
        let query = href.split_once('?').map_or("", |(_, q)| q);
        form_urlencoded::parse(query.as_bytes())
            .map(|(k, _)| k.into_owned())
            .collect()
    }

    #[test]
    fn test_parse_full_query() {
        let filters = PropertyFilters::from_query(
            "search=vista+mar&type=apartment&purpose=sale&city=Santos&bairro=Gonzaga\
             &bedrooms=2&bathrooms=1&min_price=300.000&max_price=900000&amenities=pool,gym",
        );
        assert_eq!(filters.search, "vista mar");
        assert_eq!(filters.property_type, Some(PropertyType::Apartment));
        assert_eq!(filters.purpose, Some(PropertyPurpose::Sale));
        assert_eq!(filters.city, "Santos");
        assert_eq!(filters.bedrooms, Some(2));
        assert_eq!(filters.min_price, Price::parse_brl("300000"));
        assert!(filters.has_amenity(&Amenity::Pool));
        assert!(filters.has_amenity(&Amenity::Gym));
    }

    #[test]
    fn test_lenient_parsing_drops_bad_values() {
        let filters = PropertyFilters::from_query(
            "type=castle&bedrooms=abc&bathrooms=0&min_price=0&amenities=pool&amenities=spaceport&page=3",
        );
        assert_eq!(filters.property_type, None);
        assert_eq!(filters.bedrooms, None);
        assert_eq!(filters.bathrooms, None);
        assert_eq!(filters.min_price, None);
        assert_eq!(filters.amenities.len(), 1);
    }

    #[test]
    fn test_apply_omits_empty_fields() {
        let filters = PropertyFilters {
            search: "  ".into(),
            city: "Campinas".into(),
            bedrooms: Some(0),
            purpose: Some(PropertyPurpose::Rent),
            ..PropertyFilters::default()
        };
        assert_eq!(filters.apply_href(), "/imoveis?purpose=rent&city=Campinas");
    }

    #[test]
    fn test_apply_keys_are_a_subset() {
        let inputs = [
            "",
            "search=casa",
            "amenities=garage,pool&max_price=1.000.000&sort=price_asc",
            "type=farm&bairro=Centro&bathrooms=2&page=4&utm_source=x",
        ];
        for input in inputs {
            let href = PropertyFilters::from_query(input).apply_href();
            for key in keys_of(&href) {
                assert!(FILTER_KEYS.contains(&key.as_str()), "unexpected key {key} in {href}");
            }
        }
    }

    #[test]
    fn test_apply_is_canonical() {
        let a = PropertyFilters::from_query("amenities=pool&city=Recife&amenities=garage");
        let b = PropertyFilters::from_query("city=Recife&amenities=garage,pool");
        assert_eq!(a.apply_href(), b.apply_href());
        assert_eq!(a.apply_href(), "/imoveis?city=Recife&amenities=pool%2Cgarage");
        assert_eq!(PropertyFilters::from_query(&a.to_query_string()), a);
    }

    #[test]
    fn test_clear_is_bare_listing_path() {
        assert_eq!(PropertyFilters::clear_href(), "/imoveis");
        assert_eq!(PropertyFilters::default().apply_href(), "/imoveis");
        assert!(PropertyFilters::default().is_empty());
    }

    #[test]
    fn test_listing_query_view_params() {
        let query = ListingQuery::from_query("city=Natal&sort=price_desc&page=2");
        assert_eq!(query.sort, SortOrder::PriceDesc);
        assert_eq!(query.page, 2);
        assert_eq!(query.page_href(3), "/imoveis?city=Natal&sort=price_desc&page=3");
        assert_eq!(query.sort_href(SortOrder::Newest), "/imoveis?city=Natal");
        assert_eq!(query.filters.apply_href(), "/imoveis?city=Natal");

        let fallback = ListingQuery::from_query("page=0&sort=sideways");
        assert_eq!(fallback.page, 1);
        assert_eq!(fallback.sort, SortOrder::Newest);
    }

    #[test]
    fn test_active_count_counts_each_amenity() {
        let filters = PropertyFilters::from_query("city=Natal&amenities=pool,gym,garage");
        assert_eq!(filters.active_count(), 4);
    }

    #[test]
    fn test_fractional_price_survives_the_url() {
        let filters = PropertyFilters::from_query("max_price=1.500,50");
        assert_eq!(filters.apply_href(), "/imoveis?max_price=1500%2C5");
        assert_eq!(PropertyFilters::from_query(&filters.to_query_string()), filters);
    }
}
