//! Morada Core - Shared domain library.
//!
//! Types and pure logic used by the `morada-web` front end and its tests:
//! - listing, account and notification models as the backend returns them
//! - validated newtypes for e-mails, phones, CRECI and CEP
//! - search filters and their canonical URL form
//! - the registration draft and its step machine
//!
//! # Architecture
//!
//! The core crate contains only types and logic - no I/O, no HTTP clients,
//! no session storage. That keeps every rule here unit-testable.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers, enums and backend models
//! - [`search`] - Filter sidebar state ↔ `/imoveis` query string
//! - [`registration`] - Sign-up draft, steps and the CRECI flow mode
//! - [`validation`] - Form validation with user-facing messages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod registration;
pub mod search;
pub mod types;
pub mod validation;

pub use registration::{
    AuthData, AuthProvider, CreciEntryDenied, CreciFlow, DRAFT_KEY, ProviderLink,
    RegistrationDraft, RegistrationStep,
};
pub use search::{ListingQuery, PropertyFilters, SortOrder};
pub use types::*;
pub use validation::ValidationErrors;
