//! Front-end models that live in the session.

pub mod session;

pub use session::{AuthToken, CurrentUser, PhoneVerification, keys as session_keys};
