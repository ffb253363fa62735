//! Wallet model
//!
//! Every user owns exactly one wallet, created together with the user.
//! The balance only grows through applied payments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Wallet entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique identifier (0 until persisted)
    pub id: i64,

    /// Owning user
    pub user_id: i64,

    /// Balance in the smallest currency unit, never negative
    pub balance: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty wallet for a user
    pub fn new(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            balance: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the balance covers `price`
    #[inline]
    pub fn can_afford(&self, price: i64) -> bool {
        self.balance >= price
    }

    /// Fail with `InsufficientBalance` unless the balance covers `price`
    pub fn ensure_can_afford(&self, price: i64) -> Result<(), AppError> {
        if self.can_afford(price) {
            Ok(())
        } else {
            Err(AppError::InsufficientBalance {
                wallet_id: self.id,
                required: price,
                available: self.balance,
            })
        }
    }

    /// Add `amount` to the balance, returning the new balance
    pub fn credit(&mut self, amount: i64) -> Result<i64, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidInput(format!(
                "credit amount must be positive, got {}",
                amount
            )));
        }
        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            AppError::InvalidInput(format!("wallet {} balance would overflow", self.id))
        })?;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }
}
