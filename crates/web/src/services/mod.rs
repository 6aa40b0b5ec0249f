//! Per-visitor services behind the route handlers.
//!
//! # Services
//!
//! - `auth_session` - Who is signed in, favorites and flash messages
//! - `drafts` - Registration draft storage
//! - `registration` - Sign-up and CRECI step orchestration
//! - `submit_guard` - Double-submit protection for forms

pub mod auth_session;
pub mod drafts;
pub mod registration;
pub mod submit_guard;

pub use auth_session::{AuthSession, AuthSessionError};
pub use drafts::{DraftStore, DraftStoreError, MemoryDraftStore, SessionDraftStore};
pub use registration::{RegistrationService, SignupForm, SubmitError, SubmitOutcome};
pub use submit_guard::{IN_FLIGHT_MESSAGE, InFlight, SubmitGuard, SubmitTicket};
