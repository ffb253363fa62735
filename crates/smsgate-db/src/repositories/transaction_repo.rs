//! Transaction repository implementation
//!
//! The ledger table is append-only: this repository inserts and reads, it
//! never updates or deletes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smsgate_core::{
    models::{Transaction, TransactionStatus},
    traits::TransactionRepository,
    AppError, AppResult,
};
use sqlx::{PgExecutor, PgPool};
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of TransactionRepository
pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    /// Create a new transaction repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert a ledger entry with the given executor
pub(crate) async fn insert_transaction<'e, E>(
    executor: E,
    transaction: &Transaction,
) -> AppResult<Transaction>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<sqlx::Postgres, TransactionRow>(
        r#"
        INSERT INTO transactions (wallet_id, amount, status, payment_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, wallet_id, amount, status, payment_id, created_at
        "#,
    )
    .bind(transaction.wallet_id)
    .bind(transaction.amount)
    .bind(transaction.status.to_string())
    .bind(transaction.payment_id)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        error!(
            "Database error recording transaction for wallet {}: {}",
            transaction.wallet_id, e
        );
        AppError::Database(format!("Failed to create transaction: {}", e))
    })?;

    row.try_into()
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    #[instrument(skip(self, transaction), fields(wallet_id = transaction.wallet_id))]
    async fn create(&self, transaction: &Transaction) -> AppResult<Transaction> {
        debug!(
            "Recording {} of {} for wallet {}",
            transaction.status, transaction.amount, transaction.wallet_id
        );
        insert_transaction(&self.pool, transaction).await
    }

    #[instrument(skip(self))]
    async fn list_by_wallet(
        &self,
        wallet_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Transaction>, i64)> {
        debug!(
            "Listing transactions for wallet {} limit {} offset {}",
            wallet_id, limit, offset
        );

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE wallet_id = $1")
            .bind(wallet_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting transactions: {}", e);
                AppError::Database(format!("Failed to count transactions: {}", e))
            })?;

        let rows = sqlx::query_as::<sqlx::Postgres, TransactionRow>(
            r#"
            SELECT id, wallet_id, amount, status, payment_id, created_at
            FROM transactions
            WHERE wallet_id = $1
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(wallet_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing transactions: {}", e);
            AppError::Database(format!("Failed to fetch transactions: {}", e))
        })?;

        let transactions = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<AppResult<Vec<Transaction>>>()?;

        Ok((transactions, total.0))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    wallet_id: i64,
    amount: i64,
    status: String,
    payment_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let status = TransactionStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Database(format!(
                "Transaction {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            wallet_id: row.wallet_id,
            amount: row.amount,
            status,
            payment_id: row.payment_id,
            created_at: row.created_at,
        })
    }
}
