//! Wallet repository implementation
//!
//! PostgreSQL-backed wallet storage with an atomic balance increment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smsgate_core::{models::Wallet, traits::WalletRepository, AppError, AppResult};
use sqlx::{PgExecutor, PgPool};
use tracing::{debug, error, instrument, warn};

/// PostgreSQL implementation of WalletRepository
pub struct PgWalletRepository {
    pool: PgPool,
}

impl PgWalletRepository {
    /// Create a new wallet repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Add `amount` to a wallet's balance, returning the new balance
///
/// Shared by `charge_wallet` and payment settlement so both run the same
/// single-statement increment. Balances only grow: `amount` must be positive.
pub(crate) async fn credit_wallet<'e, E>(executor: E, wallet_id: i64, amount: i64) -> AppResult<i64>
where
    E: PgExecutor<'e>,
{
    if amount <= 0 {
        warn!("Rejected credit of {} to wallet {}", amount, wallet_id);
        return Err(AppError::InvalidInput(format!(
            "credit amount must be positive, got {}",
            amount
        )));
    }

    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE wallets
        SET balance = balance + $2,
            updated_at = NOW()
        WHERE id = $1
        RETURNING balance
        "#,
    )
    .bind(wallet_id)
    .bind(amount)
    .fetch_optional(executor)
    .await
    .map_err(|e| {
        error!("Database error crediting wallet {}: {}", wallet_id, e);
        AppError::Database(format!("Failed to update balance: {}", e))
    })?;

    row.map(|r| r.0).ok_or(AppError::WalletNotFound(wallet_id))
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Wallet>> {
        debug!("Finding wallet by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, WalletRow>(
            r#"
            SELECT id, user_id, balance, created_at, updated_at
            FROM wallets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding wallet {}: {}", id, e);
            AppError::Database(format!("Failed to find wallet: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_by_user_id(&self, user_id: i64) -> AppResult<Option<Wallet>> {
        debug!("Finding wallet for user: {}", user_id);

        let result = sqlx::query_as::<sqlx::Postgres, WalletRow>(
            r#"
            SELECT id, user_id, balance, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding wallet for user {}: {}", user_id, e);
            AppError::Database(format!("Failed to find wallet: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self, wallet), fields(user_id = wallet.user_id))]
    async fn create(&self, wallet: &Wallet) -> AppResult<Wallet> {
        debug!("Creating wallet for user {}", wallet.user_id);

        let row = sqlx::query_as::<sqlx::Postgres, WalletRow>(
            r#"
            INSERT INTO wallets (user_id, balance)
            VALUES ($1, $2)
            RETURNING id, user_id, balance, created_at, updated_at
            "#,
        )
        .bind(wallet.user_id)
        .bind(wallet.balance)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating wallet: {}", e);
            if e.to_string().contains("unique constraint") {
                AppError::AlreadyExists(format!("Wallet for user {} already exists", wallet.user_id))
            } else {
                AppError::Database(format!("Failed to create wallet: {}", e))
            }
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn charge_wallet(&self, wallet_id: i64, amount: i64) -> AppResult<i64> {
        debug!("Charging wallet {} by {}", wallet_id, amount);
        credit_wallet(&self.pool, wallet_id, amount).await
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: i64,
    user_id: i64,
    balance: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/smsgate")
            .unwrap()
    }

    #[tokio::test]
    async fn test_charge_wallet_rejects_non_positive_amounts() {
        let repo = PgWalletRepository::new(lazy_pool());

        // rejected before any statement reaches the database
        for amount in [0, -50] {
            assert!(matches!(
                repo.charge_wallet(1, amount).await,
                Err(AppError::InvalidInput(_))
            ));
        }
    }
}
