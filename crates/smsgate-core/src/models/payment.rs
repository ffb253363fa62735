//! Payment model
//!
//! A payment is a single charge attempt against a wallet. It moves through
//! `unpaid -> paid -> applied` and never backwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Charge requested, waiting for the gateway to confirm it
    #[default]
    Unpaid,
    /// Gateway confirmed the charge; the wallet has not been credited yet
    Paid,
    /// Wallet credited. Terminal.
    Applied,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Unpaid => write!(f, "unpaid"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Applied => write!(f, "applied"),
        }
    }
}

impl PaymentStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            "applied" => Some(PaymentStatus::Applied),
            _ => None,
        }
    }

    /// The only status reachable from this one, if any
    pub fn next(&self) -> Option<Self> {
        match self {
            PaymentStatus::Unpaid => Some(PaymentStatus::Paid),
            PaymentStatus::Paid => Some(PaymentStatus::Applied),
            PaymentStatus::Applied => None,
        }
    }

    /// Check if a move to `target` is allowed
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        self.next() == Some(target)
    }

    /// Status a stored payment must hold for a plain update to set `self`
    ///
    /// `applied` is only reached through settlement, which credits the
    /// wallet in the same step, so it has no update source.
    pub fn update_source(&self) -> Option<Self> {
        match self {
            PaymentStatus::Paid => Some(PaymentStatus::Unpaid),
            PaymentStatus::Unpaid | PaymentStatus::Applied => None,
        }
    }
}

/// Payment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier (0 until persisted)
    pub id: i64,

    /// Wallet this charge credits
    pub wallet_id: i64,

    /// Amount in the smallest currency unit, fixed at creation
    pub amount: i64,

    /// Current status
    pub status: PaymentStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Create a new unpaid payment for a wallet
    pub fn new(wallet_id: i64, amount: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            wallet_id,
            amount,
            status: PaymentStatus::Unpaid,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check that this payment may be applied to its wallet
    ///
    /// Maps every non-`Paid` status onto the error the finalize path reports.
    pub fn ensure_applicable(&self) -> Result<(), AppError> {
        match self.status {
            PaymentStatus::Paid => Ok(()),
            PaymentStatus::Unpaid => Err(AppError::PaymentNotPaid(self.id)),
            PaymentStatus::Applied => Err(AppError::PaymentAlreadyApplied(self.id)),
        }
    }

    /// Record the gateway's confirmation (`unpaid -> paid`)
    pub fn mark_paid(&mut self) -> Result<(), AppError> {
        self.transition(PaymentStatus::Paid)
    }

    /// Record that the wallet was credited (`paid -> applied`)
    pub fn mark_applied(&mut self) -> Result<(), AppError> {
        self.ensure_applicable()?;
        self.transition(PaymentStatus::Applied)
    }

    /// Error for a refused move of this payment from `from` to `to`
    pub fn rejected_move(&self, from: PaymentStatus, to: PaymentStatus) -> AppError {
        AppError::InvalidPaymentStatus {
            payment_id: self.id,
            status: format!("{} -> {}", from, to),
        }
    }

    fn transition(&mut self, target: PaymentStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(target) {
            return Err(self.rejected_move(self.status, target));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}
