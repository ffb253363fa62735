//! Ledger transaction model
//!
//! Immutable audit log of balance changes. Rows are appended, never updated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction status tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Credit from an applied payment
    Deposit,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Deposit => write!(f, "deposit"),
        }
    }
}

impl TransactionStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(TransactionStatus::Deposit),
            _ => None,
        }
    }
}

/// Transaction entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier (0 until persisted)
    pub id: i64,

    /// Wallet whose balance changed
    pub wallet_id: i64,

    /// Amount moved, in the smallest currency unit
    pub amount: i64,

    /// Kind of movement
    pub status: TransactionStatus,

    /// Payment that produced this entry, if any
    pub payment_id: Option<i64>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Deposit entry for an applied payment
    pub fn deposit(wallet_id: i64, amount: i64, payment_id: i64) -> Self {
        Self {
            id: 0,
            wallet_id,
            amount,
            status: TransactionStatus::Deposit,
            payment_id: Some(payment_id),
            created_at: Utc::now(),
        }
    }
}
