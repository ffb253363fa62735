//! Wallet service
//!
//! Moves money into wallets:
//! - Open a charge (an unpaid payment) against a wallet
//! - Finalize a charge once the gateway has marked it paid
//! - Answer balance and balance-sufficiency queries
//!
//! A payment credits its wallet at most once. Finalization hands the credit,
//! the ledger entry and the `applied` flip to `PaymentRepository::apply`,
//! which commits them together or not at all.

use smsgate_core::{
    config::LedgerConfig,
    models::{Payment, Transaction, User, Wallet},
    traits::{
        PaginatedResponse, PaginationMeta, Pagination, PaymentRepository,
        TransactionRepository, WalletRepository,
    },
    AppError, AppResult,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Parameters of a charge request
#[derive(Debug, Clone, Validate)]
pub struct ChargeRequest {
    pub wallet_id: i64,

    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
}

/// Parameters of a balance-sufficiency check
#[derive(Debug, Clone, Validate)]
pub struct BalanceCheck {
    pub user_id: i64,

    #[validate(range(min = 0, message = "price must not be negative"))]
    pub price: i64,
}

/// Wallet service
pub struct WalletService<W, P, T>
where
    W: WalletRepository,
    P: PaymentRepository,
    T: TransactionRepository,
{
    wallet_repo: Arc<W>,
    payment_repo: Arc<P>,
    transaction_repo: Arc<T>,
    config: LedgerConfig,
}

impl<W, P, T> WalletService<W, P, T>
where
    W: WalletRepository,
    P: PaymentRepository,
    T: TransactionRepository,
{
    /// Create a new wallet service with default ledger limits
    pub fn new(wallet_repo: Arc<W>, payment_repo: Arc<P>, transaction_repo: Arc<T>) -> Self {
        Self {
            wallet_repo,
            payment_repo,
            transaction_repo,
            config: LedgerConfig::default(),
        }
    }

    /// Replace the ledger limits
    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Open a charge against a wallet
    ///
    /// Creates an unpaid payment and returns its ID. The balance does not
    /// change until the payment is finalized.
    ///
    /// # Errors
    ///
    /// - `Validation` if the amount is not positive or above the limit
    /// - `WalletNotFound` if the wallet does not exist
    #[instrument(skip(self))]
    pub async fn charge_request(&self, wallet_id: i64, amount: i64) -> AppResult<i64> {
        let request = ChargeRequest { wallet_id, amount };
        request.validate()?;
        if request.amount > self.config.max_charge_amount {
            return Err(AppError::Validation(format!(
                "amount {} exceeds the maximum charge of {}",
                request.amount, self.config.max_charge_amount
            )));
        }

        let wallet = self
            .wallet_repo
            .find_by_id(request.wallet_id)
            .await?
            .ok_or_else(|| {
                warn!("Charge requested for unknown wallet {}", request.wallet_id);
                AppError::WalletNotFound(request.wallet_id)
            })?;

        let payment = self
            .payment_repo
            .create(&Payment::new(wallet.id, request.amount))
            .await?;

        info!(
            "Opened payment {} for wallet {}: amount={}",
            payment.id, wallet.id, payment.amount
        );

        Ok(payment.id)
    }

    /// Credit a paid payment to its wallet
    ///
    /// Returns the credited wallet's ID.
    ///
    /// # Errors
    ///
    /// - `PaymentNotFound` if the payment does not exist
    /// - `PaymentNotPaid` if the gateway has not confirmed it yet
    /// - `PaymentAlreadyApplied` if it was already credited
    /// - `InvalidPaymentStatus` if the stored status is not recognized
    ///
    /// On any error the payment keeps its status, so retrying a failed
    /// finalize runs the whole settlement again.
    #[instrument(skip(self))]
    pub async fn finalize_charge(&self, payment_id: i64) -> AppResult<i64> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or(AppError::PaymentNotFound(payment_id))?;

        if let Err(e) = payment.ensure_applicable() {
            warn!(
                "Refusing to finalize payment {} in status {}",
                payment_id, payment.status
            );
            return Err(e);
        }

        let transaction = self.payment_repo.apply(&payment).await?;

        info!(
            "Finalized payment {}: wallet={}, amount={}, transaction={}",
            payment_id, transaction.wallet_id, transaction.amount, transaction.id
        );

        Ok(payment.wallet_id)
    }

    /// Get a wallet by ID
    #[instrument(skip(self))]
    pub async fn get_wallet(&self, wallet_id: i64) -> AppResult<Wallet> {
        self.wallet_repo
            .find_by_id(wallet_id)
            .await?
            .ok_or(AppError::WalletNotFound(wallet_id))
    }

    /// Get the wallet owned by a user
    ///
    /// Every user has a wallet from creation on, so a miss means the
    /// account is inconsistent.
    #[instrument(skip(self))]
    pub async fn get_by_user_id(&self, user_id: i64) -> AppResult<Wallet> {
        self.wallet_repo
            .find_by_user_id(user_id)
            .await?
            .ok_or_else(|| {
                warn!("User {} has no wallet", user_id);
                AppError::NotFound(format!("wallet for user {}", user_id))
            })
    }

    /// Check that the user's balance covers `price`
    ///
    /// Read-only; nothing is debited. A negative price is a `Validation`
    /// error.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn check_wallet_balance(&self, user: &User, price: i64) -> AppResult<()> {
        let check = BalanceCheck {
            user_id: user.id,
            price,
        };
        check.validate()?;

        let wallet = self.get_by_user_id(check.user_id).await?;

        wallet.ensure_can_afford(price).map_err(|e| {
            warn!(
                "Wallet {} balance {} does not cover price {}",
                wallet.id, wallet.balance, price
            );
            e
        })?;

        debug!("Wallet {} covers price {}", wallet.id, price);
        Ok(())
    }

    /// List a wallet's ledger entries, newest first
    #[instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        wallet_id: i64,
        pagination: Option<Pagination>,
    ) -> AppResult<PaginatedResponse<Transaction>> {
        let wallet = self.get_wallet(wallet_id).await?;
        let pagination =
            pagination.unwrap_or_else(|| Pagination::new(1, self.config.default_page_size));

        let (data, total) = self
            .transaction_repo
            .list_by_wallet(wallet.id, pagination.limit(), pagination.offset())
            .await?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(total, pagination.page, pagination.per_page),
        })
    }
}
