//! Enumerations shared with the backend.
//!
//! Every enum serializes to the same `snake_case` slug the backend uses, and
//! carries a Portuguese label for display.

use serde::{Deserialize, Serialize};

/// Error returned when a slug does not name any variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `label`, `ALL`, `Display` and `FromStr` for a
/// fieldless enum from a `Variant => ("slug", "Label")` table.
macro_rules! slug_enum {
    ($name:ident, $kind:literal, { $($variant:ident => ($slug:literal, $label:literal)),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Slug used on the wire and in URLs.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $slug),+
                }
            }

            /// Portuguese display label.
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($slug => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Listing moderation and lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Rented,
    Sold,
}

slug_enum!(PropertyStatus, "property status", {
    Pending => ("pending", "Em análise"),
    Approved => ("approved", "Publicado"),
    Rejected => ("rejected", "Rejeitado"),
    Rented => ("rented", "Alugado"),
    Sold => ("sold", "Vendido"),
});

impl PropertyStatus {
    /// Whether the listing can still be contacted about.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Listing intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyPurpose {
    Sale,
    Rent,
}

slug_enum!(PropertyPurpose, "purpose", {
    Sale => ("sale", "Venda"),
    Rent => ("rent", "Aluguel"),
});

/// Kind of property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    House,
    Apartment,
    Condo,
    Land,
    Commercial,
    Farm,
}

slug_enum!(PropertyType, "property type", {
    House => ("house", "Casa"),
    Apartment => ("apartment", "Apartamento"),
    Condo => ("condo", "Casa em condomínio"),
    Land => ("land", "Terreno"),
    Commercial => ("commercial", "Comercial"),
    Farm => ("farm", "Chácara / Sítio"),
});

/// Account profile type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Client,
    Broker,
}

slug_enum!(UserType, "user type", {
    Client => ("client", "Cliente"),
    Broker => ("broker", "Corretor"),
});

/// Broker license verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrokerStatus {
    #[default]
    PendingVerification,
    Approved,
    Rejected,
}

slug_enum!(BrokerStatus, "broker status", {
    PendingVerification => ("pending_verification", "Em verificação"),
    Approved => ("approved", "Verificado"),
    Rejected => ("rejected", "Recusado"),
});

/// Review status of uploaded broker documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

slug_enum!(DocumentReviewStatus, "document status", {
    Pending => ("pending", "Aguardando análise"),
    Approved => ("approved", "Aprovados"),
    Rejected => ("rejected", "Recusados"),
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_matches_slug() {
        for status in PropertyStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert_eq!(
            serde_json::to_string(&BrokerStatus::PendingVerification).unwrap(),
            "\"pending_verification\""
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("rent".parse::<PropertyPurpose>().unwrap(), PropertyPurpose::Rent);
        assert_eq!(" house ".parse::<PropertyType>().unwrap(), PropertyType::House);

        let err = "castle".parse::<PropertyType>().unwrap_err();
        assert_eq!(err.to_string(), "invalid property type: castle");
    }

    #[test]
    fn test_labels() {
        assert_eq!(PropertyPurpose::Sale.label(), "Venda");
        assert_eq!(UserType::Broker.label(), "Corretor");
        assert!(PropertyStatus::Approved.is_available());
        assert!(!PropertyStatus::Sold.is_available());
    }
}
