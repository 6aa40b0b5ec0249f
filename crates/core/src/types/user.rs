//! Accounts, brokers and notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Address, BrokerStatus, DocumentReviewStatus, NotificationId, UserId, UserType};

/// A platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Present once the account has requested a broker upgrade.
    #[serde(default)]
    pub creci: Option<String>,
    #[serde(default)]
    pub broker_status: Option<BrokerStatus>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    #[must_use]
    pub fn is_broker(&self) -> bool {
        self.user_type == UserType::Broker
    }

    /// Brokers may publish listings only after their CRECI is verified.
    #[must_use]
    pub fn can_publish(&self) -> bool {
        self.is_broker() && self.broker_status == Some(BrokerStatus::Approved)
    }

    /// Whether a broker upgrade was requested and is still under review.
    #[must_use]
    pub fn has_pending_upgrade(&self) -> bool {
        self.broker_status == Some(BrokerStatus::PendingVerification)
    }

    /// First name for greetings.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Public broker profile shown on listing pages.
///
/// The CRECI and verification status travel on the flattened [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub listings_count: u32,
}

impl Broker {
    #[must_use]
    pub fn creci(&self) -> &str {
        self.user.creci.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn status(&self) -> BrokerStatus {
        self.user.broker_status.unwrap_or_default()
    }
}

/// Uploaded CRECI documents and their review state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerDocuments {
    pub creci_front_url: String,
    pub creci_back_url: String,
    pub selfie_url: String,
    #[serde(default)]
    pub status: DocumentReviewStatus,
}

/// An in-app notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
