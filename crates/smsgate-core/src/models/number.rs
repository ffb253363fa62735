//! Phone number and subscription models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number visibility tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NumberType {
    /// Shared number anyone may send from
    #[default]
    Public,
    /// Paid number, usable only with an active subscription
    Private,
}

impl fmt::Display for NumberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberType::Public => write!(f, "public"),
            NumberType::Private => write!(f, "private"),
        }
    }
}

impl NumberType {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(NumberType::Public),
            "private" => Some(NumberType::Private),
            _ => None,
        }
    }

    /// Check if using this tier requires a subscription
    pub fn requires_subscription(&self) -> bool {
        !matches!(self, NumberType::Public)
    }
}

/// Phone number entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Number {
    /// Unique identifier
    pub id: i64,

    /// E.164 phone number
    pub phone: String,

    /// Visibility tier
    pub number_type: NumberType,

    /// Whether new users get this number assigned
    pub is_default: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Number {
    /// Create a new number record
    pub fn new(phone: impl Into<String>, number_type: NumberType) -> Self {
        Self {
            id: 0,
            phone: phone.into(),
            number_type,
            is_default: false,
            created_at: Utc::now(),
        }
    }

    /// Check if the number is open to every user
    #[inline]
    pub fn is_public(&self) -> bool {
        !self.number_type.requires_subscription()
    }
}

/// Subscription entity
///
/// Time-bounded grant that entitles a user to non-public numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique identifier
    pub id: i64,

    /// Subscribed user
    pub user_id: i64,

    /// Last instant at which the subscription is valid
    pub expiration_date: DateTime<Utc>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Create a subscription valid until `expiration_date`
    pub fn new(user_id: i64, expiration_date: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            user_id,
            expiration_date,
            created_at: Utc::now(),
        }
    }

    /// Check if the subscription is valid at `now`
    ///
    /// Valid up to and including the expiration instant.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expiration_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_number_tiers() {
        assert!(Number::new("+15550001", NumberType::Public).is_public());
        assert!(!Number::new("+15550002", NumberType::Private).is_public());
        assert!(NumberType::Private.requires_subscription());
        assert_eq!(NumberType::from_str("PRIVATE"), Some(NumberType::Private));
        assert_eq!(NumberType::from_str("vip"), None);
    }

    #[test]
    fn test_subscription_expiry_boundary() {
        let expires = Utc::now();
        let sub = Subscription::new(1, expires);

        assert!(sub.is_active_at(expires - Duration::seconds(1)));
        assert!(sub.is_active_at(expires));
        assert!(!sub.is_active_at(expires + Duration::seconds(1)));
    }
}
