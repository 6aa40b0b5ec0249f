//! Cache types for public backend reads.

use morada_core::{Broker, BrokerId, Page, Property, PropertyId};

/// Cache key for public reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Property(PropertyId),
    /// Keyed by the encoded backend query string.
    Properties(String),
    Broker(BrokerId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Property(Box<Property>),
    Properties(Page<Property>),
    Broker(Box<Broker>),
}
