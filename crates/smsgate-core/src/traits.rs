//! Repository traits consumed by the services
//!
//! Lookups return `Ok(None)` for a missing record; services decide which
//! typed error that becomes.

use crate::error::AppError;
use crate::models::{Number, Payment, Subscription, Transaction, User, Wallet};
use async_trait::async_trait;
use serde::Serialize;

/// Wallet repository
#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Find wallet by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Wallet>, AppError>;

    /// Find the wallet owned by a user
    async fn find_by_user_id(&self, user_id: i64) -> Result<Option<Wallet>, AppError>;

    /// Create a new wallet
    async fn create(&self, wallet: &Wallet) -> Result<Wallet, AppError>;

    /// Atomically add `amount` to the balance, returning the new balance
    ///
    /// Fails with `WalletNotFound` if the wallet does not exist.
    async fn charge_wallet(&self, wallet_id: i64, amount: i64) -> Result<i64, AppError>;
}

/// Payment repository
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Find payment by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Payment>, AppError>;

    /// Create a new payment
    async fn create(&self, payment: &Payment) -> Result<Payment, AppError>;

    /// Persist the gateway's confirmation (`unpaid -> paid`)
    ///
    /// Compare-and-set against the stored status. Any other move, including
    /// one to `applied`, fails with `InvalidPaymentStatus` and writes nothing.
    async fn update(&self, payment: &Payment) -> Result<Payment, AppError>;

    /// Settle a paid payment into its wallet
    ///
    /// One atomic unit: moves the stored status `paid -> applied` by
    /// compare-and-set, credits the wallet by the payment amount and appends
    /// the matching deposit transaction. When the stored status is no longer
    /// `paid` nothing is written and the error for the stored status is
    /// returned, so of two concurrent callers at most one succeeds.
    async fn apply(&self, payment: &Payment) -> Result<Transaction, AppError>;
}

/// Transaction repository (append-only)
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Append a ledger entry
    async fn create(&self, transaction: &Transaction) -> Result<Transaction, AppError>;

    /// List a wallet's entries, newest first
    async fn list_by_wallet(
        &self,
        wallet_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Transaction>, i64), AppError>;
}

/// Number repository
#[async_trait]
pub trait NumberRepository: Send + Sync {
    /// Find number by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Number>, AppError>;

    /// Find the number assigned to new users
    async fn find_default(&self) -> Result<Option<Number>, AppError>;
}

/// Subscription repository
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find the user's most relevant subscription (latest expiration)
    async fn find_by_user_id(&self, user_id: i64) -> Result<Option<Subscription>, AppError>;
}

/// User repository
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find user by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Find user by username
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// List all users ordered by ID
    async fn find_all(&self) -> Result<Vec<User>, AppError>;

    /// Create a new user
    async fn create(&self, user: &User) -> Result<User, AppError>;

    /// Update an existing user
    async fn update(&self, user: &User) -> Result<User, AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}
