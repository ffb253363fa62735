//! User model
//!
//! Only the fields the ledger and the number entitlement check care about.
//! Credentials are hashed before they reach this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (0 until persisted)
    pub id: i64,

    /// Username (unique, for login)
    pub username: String,

    /// Password hash (never expose in API responses)
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Number used as sender when none is given
    pub default_number_id: Option<i64>,

    /// Whether the account is enabled
    pub is_active: bool,

    /// Whether the user has admin rights
    pub is_admin: bool,

    /// Whether the user must log in again before the next request
    pub is_login_required: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet persisted user
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username: username.into(),
            password_hash: password_hash.into(),
            default_number_id: None,
            is_active: true,
            is_admin: false,
            is_login_required: true,
            created_at: now,
            updated_at: now,
        }
    }
}
