//! Property listings as the backend returns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BrokerId, Price, PropertyId, PropertyPurpose, PropertyStatus, PropertyType};

/// Postal address shared by listings and user profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: String,
    pub bairro: String,
    pub city: String,
    /// Two-letter state code (UF).
    pub state: String,
    pub cep: String,
}

impl Address {
    /// `Rua X, 123 - Bairro, Cidade/UF`, skipping missing parts.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut street = self.street.trim().to_string();
        if !self.number.trim().is_empty() {
            street = format!("{street}, {}", self.number.trim());
        }
        let locality = match (self.city.trim(), self.state.trim()) {
            ("", "") => String::new(),
            (city, "") => city.to_string(),
            ("", state) => state.to_string(),
            (city, state) => format!("{city}/{state}"),
        };
        [street.as_str(), self.bairro.trim(), locality.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" - ")
    }

    /// `Bairro, Cidade` for cards.
    #[must_use]
    pub fn neighbourhood(&self) -> String {
        [self.bairro.trim(), self.city.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A filterable amenity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    Pool,
    Garage,
    Furnished,
    PetFriendly,
    Elevator,
    Gym,
    Balcony,
    Barbecue,
}

impl Amenity {
    pub const ALL: &'static [Self] = &[
        Self::Pool,
        Self::Garage,
        Self::Furnished,
        Self::PetFriendly,
        Self::Elevator,
        Self::Gym,
        Self::Balcony,
        Self::Barbecue,
    ];

    /// Slug used in URLs and as the backend query flag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pool => "pool",
            Self::Garage => "garage",
            Self::Furnished => "furnished",
            Self::PetFriendly => "pet_friendly",
            Self::Elevator => "elevator",
            Self::Gym => "gym",
            Self::Balcony => "balcony",
            Self::Barbecue => "barbecue",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pool => "Piscina",
            Self::Garage => "Garagem",
            Self::Furnished => "Mobiliado",
            Self::PetFriendly => "Aceita pets",
            Self::Elevator => "Elevador",
            Self::Gym => "Academia",
            Self::Balcony => "Varanda",
            Self::Barbecue => "Churrasqueira",
        }
    }

    /// Look up an amenity by slug.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.iter().copied().find(|a| a.as_str() == s)
    }
}

/// Amenity flags of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Amenities {
    pub pool: bool,
    pub garage: bool,
    pub furnished: bool,
    pub pet_friendly: bool,
    pub elevator: bool,
    pub gym: bool,
    pub balcony: bool,
    pub barbecue: bool,
}

impl Amenities {
    #[must_use]
    pub const fn has(&self, amenity: Amenity) -> bool {
        match amenity {
            Amenity::Pool => self.pool,
            Amenity::Garage => self.garage,
            Amenity::Furnished => self.furnished,
            Amenity::PetFriendly => self.pet_friendly,
            Amenity::Elevator => self.elevator,
            Amenity::Gym => self.gym,
            Amenity::Balcony => self.balcony,
            Amenity::Barbecue => self.barbecue,
        }
    }

    pub const fn set(&mut self, amenity: Amenity, value: bool) {
        match amenity {
            Amenity::Pool => self.pool = value,
            Amenity::Garage => self.garage = value,
            Amenity::Furnished => self.furnished = value,
            Amenity::PetFriendly => self.pet_friendly = value,
            Amenity::Elevator => self.elevator = value,
            Amenity::Gym => self.gym = value,
            Amenity::Balcony => self.balcony = value,
            Amenity::Barbecue => self.barbecue = value,
        }
    }

    /// Enabled amenities in display order.
    #[must_use]
    pub fn enabled(&self) -> Vec<Amenity> {
        Amenity::ALL
            .iter()
            .copied()
            .filter(|a| self.has(*a))
            .collect()
    }
}

impl FromIterator<Amenity> for Amenities {
    fn from_iter<I: IntoIterator<Item = Amenity>>(iter: I) -> Self {
        let mut amenities = Self::default();
        for amenity in iter {
            amenities.set(amenity, true);
        }
        amenities
    }
}

/// A property listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub property_type: PropertyType,
    pub purpose: PropertyPurpose,
    #[serde(default)]
    pub sale_price: Option<Price>,
    #[serde(default)]
    pub rent_price: Option<Price>,
    #[serde(default)]
    pub condo_fee: Option<Price>,
    #[serde(default)]
    pub iptu: Option<Price>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub bedrooms: u8,
    #[serde(default)]
    pub bathrooms: u8,
    #[serde(default)]
    pub parking_spots: u8,
    #[serde(default)]
    pub area: Option<u32>,
    #[serde(default)]
    pub amenities: Amenities,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub broker_id: Option<BrokerId>,
    #[serde(default)]
    pub broker_name: Option<String>,
    #[serde(default)]
    pub broker_phone: Option<String>,
    #[serde(default)]
    pub broker_creci: Option<String>,
    #[serde(default)]
    pub status: PropertyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// The price matching the listing's purpose.
    #[must_use]
    pub const fn headline_price(&self) -> Option<Price> {
        match self.purpose {
            PropertyPurpose::Sale => self.sale_price,
            PropertyPurpose::Rent => self.rent_price,
        }
    }

    /// `R$ 450.000`, `R$ 2.500/mês` or `Preço sob consulta`.
    #[must_use]
    pub fn price_label(&self) -> String {
        match self.headline_price() {
            Some(price) if !price.is_zero() => match self.purpose {
                PropertyPurpose::Sale => price.display(),
                PropertyPurpose::Rent => format!("{}/mês", price.display()),
            },
            _ => "Preço sob consulta".to_string(),
        }
    }

    /// First image, used as the card cover.
    #[must_use]
    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Payload for creating or updating a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInput {
    pub title: String,
    pub description: String,
    pub property_type: PropertyType,
    pub purpose: PropertyPurpose,
    pub sale_price: Option<Price>,
    pub rent_price: Option<Price>,
    pub condo_fee: Option<Price>,
    pub iptu: Option<Price>,
    pub address: Address,
    pub bedrooms: u8,
    pub bathrooms: u8,
    pub parking_spots: u8,
    pub area: Option<u32>,
    pub amenities: Amenities,
    pub images: Vec<String>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

const fn default_page() -> u32 {
    1
}

impl<T> Page<T> {
    /// Total number of pages, at least 1.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.limit));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            limit: 0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "id": 12,
            "title": "Apartamento 2 quartos na Vila Mariana",
            "property_type": "apartment",
            "purpose": "rent",
            "rent_price": "3200",
            "address": { "bairro": "Vila Mariana", "city": "São Paulo", "state": "SP" },
            "bedrooms": 2,
            "amenities": { "elevator": true, "gym": true },
            "images": ["https://img.example/1.jpg", "https://img.example/2.jpg"],
            "status": "approved",
            "created_at": "2026-01-10T12:00:00Z",
            "updated_at": "2026-01-11T12:00:00Z"
        })
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let property: Property = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(property.id, PropertyId::new(12));
        assert_eq!(property.bathrooms, 0);
        assert!(property.sale_price.is_none());
        assert_eq!(property.amenities.enabled(), vec![Amenity::Elevator, Amenity::Gym]);
        assert_eq!(property.cover_image(), Some("https://img.example/1.jpg"));
    }

    #[test]
    fn test_price_label_follows_purpose() {
        let mut property: Property = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(property.price_label(), "R$ 3.200/mês");

        property.purpose = PropertyPurpose::Sale;
        assert_eq!(property.price_label(), "Preço sob consulta");
    }

    #[test]
    fn test_address_one_line() {
        let address = Address {
            street: "Rua Domingos de Morais".into(),
            number: "100".into(),
            bairro: "Vila Mariana".into(),
            city: "São Paulo".into(),
            state: "SP".into(),
            ..Address::default()
        };
        assert_eq!(
            address.one_line(),
            "Rua Domingos de Morais, 100 - Vila Mariana - São Paulo/SP"
        );
        assert_eq!(address.neighbourhood(), "Vila Mariana, São Paulo");
        assert_eq!(Address::default().one_line(), "");
    }

    #[test]
    fn test_page_total_pages() {
        let page: Page<u8> = Page {
            items: vec![],
            total: 25,
            page: 2,
            limit: 12,
        };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert_eq!(Page::<u8>::default().total_pages(), 1);
    }
}
