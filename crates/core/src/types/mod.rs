//! Core types for Morada.
//!
//! Type-safe wrappers and models for the real-estate domain.

pub mod creci;
pub mod email;
pub mod id;
pub mod phone;
pub mod price;
pub mod property;
pub mod status;
pub mod user;

pub use creci::{Cep, CepError, Creci, CreciError};
pub use email::{Email, EmailError};
pub use id::*;
pub use phone::{Phone, PhoneError};
pub use price::Price;
pub use property::{Address, Amenities, Amenity, Page, Property, PropertyInput};
pub use status::*;
pub use user::{Broker, BrokerDocuments, Notification, User};
