//! Unified error handling for the SMSGate ledger
//!
//! Every fallible operation returns [`AppError`]. Ledger failures carry the
//! identifier of the record that caused them, and each variant maps onto a
//! coarse [`ErrorKind`] that request handlers use to pick a response.

use std::fmt;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== Wallet Errors ====================
    #[error("Wallet not found: {0}")]
    WalletNotFound(i64),

    #[error("Insufficient balance in wallet {wallet_id}: required {required}, available {available}")]
    InsufficientBalance {
        wallet_id: i64,
        required: i64,
        available: i64,
    },

    // ==================== Payment Errors ====================
    #[error("Payment not found: {0}")]
    PaymentNotFound(i64),

    #[error("Payment {0} has not been paid yet")]
    PaymentNotPaid(i64),

    #[error("Payment {0} has already been applied")]
    PaymentAlreadyApplied(i64),

    #[error("Payment {payment_id} has invalid status: {status}")]
    InvalidPaymentStatus { payment_id: i64, status: String },

    // ==================== User Errors ====================
    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Invalid number: {0}")]
    InvalidNumber(i64),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of failures
///
/// Callers branch on the kind rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced wallet, payment, user or record is missing
    NotFound,
    /// A payment is not in a state that allows the requested move
    InvalidState,
    /// The number cannot be used by this user
    EntitlementDenied,
    /// The wallet balance does not cover the requested price
    InsufficientFunds,
    /// The request itself is malformed
    Validation,
    /// Storage, configuration or other infrastructure failure
    Infrastructure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::InvalidState => write!(f, "invalid_state"),
            ErrorKind::EntitlementDenied => write!(f, "entitlement_denied"),
            ErrorKind::InsufficientFunds => write!(f, "insufficient_funds"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Infrastructure => write!(f, "infrastructure"),
        }
    }
}

impl AppError {
    /// Returns the taxonomy bucket for this error
    ///
    /// `InvalidNumber` is reported as an entitlement denial whether the number
    /// is missing or the subscription is, so the kind never tells them apart.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::WalletNotFound(_)
            | AppError::PaymentNotFound(_)
            | AppError::UserNotFound(_)
            | AppError::NotFound(_) => ErrorKind::NotFound,

            AppError::PaymentNotPaid(_)
            | AppError::PaymentAlreadyApplied(_)
            | AppError::InvalidPaymentStatus { .. }
            | AppError::AlreadyExists(_) => ErrorKind::InvalidState,

            AppError::InvalidNumber(_) => ErrorKind::EntitlementDenied,

            AppError::InsufficientBalance { .. } => ErrorKind::InsufficientFunds,

            AppError::Validation(_) | AppError::InvalidInput(_) => ErrorKind::Validation,

            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Transaction(_)
            | AppError::Internal(_)
            | AppError::Config(_)
            | AppError::Serialization(_) => ErrorKind::Infrastructure,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::WalletNotFound(_) => "wallet_not_found",
            AppError::InsufficientBalance { .. } => "insufficient_balance",
            AppError::PaymentNotFound(_) => "payment_not_found",
            AppError::PaymentNotPaid(_) => "payment_not_paid",
            AppError::PaymentAlreadyApplied(_) => "payment_already_applied",
            AppError::InvalidPaymentStatus { .. } => "invalid_payment_status",
            AppError::UserNotFound(_) => "user_not_found",
            AppError::InvalidNumber(_) => "invalid_number",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the failure came from infrastructure rather than the request
    pub fn is_infrastructure(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => AppError::Pool(err.to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(AppError::WalletNotFound(7).kind(), ErrorKind::NotFound);
        assert_eq!(AppError::PaymentNotPaid(1).kind(), ErrorKind::InvalidState);
        assert_eq!(
            AppError::PaymentAlreadyApplied(1).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            AppError::InvalidPaymentStatus {
                payment_id: 1,
                status: "refunded".to_string()
            }
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            AppError::InsufficientBalance {
                wallet_id: 1,
                required: 101,
                available: 100
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            AppError::InvalidNumber(3).kind(),
            ErrorKind::EntitlementDenied
        );
        assert!(AppError::Database("down".to_string()).is_infrastructure());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::PaymentNotPaid(1).error_code(), "payment_not_paid");
        assert_eq!(
            AppError::PaymentAlreadyApplied(1).error_code(),
            "payment_already_applied"
        );
        assert_eq!(AppError::InvalidNumber(9).error_code(), "invalid_number");
    }

    #[test]
    fn test_messages_carry_identifiers() {
        assert_eq!(
            AppError::PaymentNotFound(42).to_string(),
            "Payment not found: 42"
        );
        assert_eq!(
            AppError::InsufficientBalance {
                wallet_id: 5,
                required: 101,
                available: 100
            }
            .to_string(),
            "Insufficient balance in wallet 5: required 101, available 100"
        );
    }

    #[test]
    fn test_pool_errors_are_classified() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::Pool(_)));

        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::Database(_)));
    }
}
