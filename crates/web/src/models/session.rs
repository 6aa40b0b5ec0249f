//! Session-related types.
//!
//! Types stored in the session for authentication and sign-in state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use morada_core::{BrokerStatus, User, UserId, UserType};

/// Backend bearer token.
///
/// Serializes as a plain string so it can live in the session; `Debug`
/// never prints it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// Session-stored user identity.
///
/// A small snapshot of the backend account, refreshed on sign-in and after
/// profile changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    pub broker_status: Option<BrokerStatus>,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            user_type: user.user_type,
            broker_status: user.broker_status,
        }
    }
}

impl CurrentUser {
    /// First name for greetings.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn is_broker(&self) -> bool {
        self.user_type == UserType::Broker
    }

    /// Verified brokers may manage listings.
    #[must_use]
    pub fn can_publish(&self) -> bool {
        self.is_broker() && self.broker_status == Some(BrokerStatus::Approved)
    }

    /// Already a broker, or an upgrade request is under review.
    #[must_use]
    pub fn broker_or_pending(&self) -> bool {
        self.is_broker() || self.broker_status == Some(BrokerStatus::PendingVerification)
    }
}

/// A phone code sent and awaiting confirmation.
#[derive(Clone, Serialize, Deserialize)]
pub struct PhoneVerification {
    /// Formatted number the code went to.
    pub phone: String,
    pub session_info: String,
    pub sent_at: DateTime<Utc>,
    /// Where to go after sign-in.
    pub redirect: Option<String>,
}

impl fmt::Debug for PhoneVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhoneVerification")
            .field("phone", &self.phone)
            .field("session_info", &"[REDACTED]")
            .field("sent_at", &self.sent_at)
            .finish_non_exhaustive()
    }
}

/// Session keys.
pub mod keys {
    /// Backend bearer token of the signed-in user.
    pub const AUTH_TOKEN: &str = "auth_token";

    /// [`super::CurrentUser`] snapshot.
    pub const CURRENT_USER: &str = "current_user";

    /// Favorite property ids of the signed-in user.
    pub const FAVORITES: &str = "favorites";

    /// Pending phone sign-in.
    pub const PHONE_VERIFICATION: &str = "phone_verification";

    /// One-shot message shown on the next page.
    pub const FLASH: &str = "flash";

    pub use morada_core::DRAFT_KEY as REGISTRATION_DRAFT;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_token_serde_and_debug() {
        let token = AuthToken::new("jwt");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"jwt\"");
        assert_eq!(format!("{token:?}"), "AuthToken([REDACTED])");
    }

    #[test]
    fn test_current_user_roles() {
        let mut user = CurrentUser {
            id: UserId::new(1),
            name: "Bruno Lima".to_string(),
            email: "bruno@exemplo.com".to_string(),
            user_type: UserType::Client,
            broker_status: None,
        };
        assert_eq!(user.first_name(), "Bruno");
        assert!(!user.broker_or_pending());

        user.broker_status = Some(BrokerStatus::PendingVerification);
        assert!(user.broker_or_pending());
        assert!(!user.can_publish());

        user.user_type = UserType::Broker;
        user.broker_status = Some(BrokerStatus::Approved);
        assert!(user.can_publish());
    }
}
