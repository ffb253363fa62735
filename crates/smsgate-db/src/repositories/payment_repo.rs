//! Payment repository implementation
//!
//! PostgreSQL-backed payment storage. Settlement runs the status flip, the
//! wallet credit and the ledger insert inside one database transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smsgate_core::{
    models::{Payment, PaymentStatus, Transaction},
    traits::PaymentRepository,
    AppError, AppResult,
};
use sqlx::{PgExecutor, PgPool};
use tracing::{debug, error, info, instrument, warn};

use super::transaction_repo::insert_transaction;
use super::wallet_repo::credit_wallet;

/// PostgreSQL implementation of PaymentRepository
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    /// Create a new payment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn select_payment<'e, E>(executor: E, id: i64) -> AppResult<Option<Payment>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
        r#"
        SELECT id, wallet_id, amount, status, created_at, updated_at
        FROM payments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(|e| {
        error!("Database error finding payment {}: {}", id, e);
        AppError::Database(format!("Failed to find payment: {}", e))
    })?;

    row.map(TryInto::try_into).transpose()
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Payment>> {
        debug!("Finding payment by id: {}", id);
        select_payment(&self.pool, id).await
    }

    #[instrument(skip(self, payment), fields(wallet_id = payment.wallet_id))]
    async fn create(&self, payment: &Payment) -> AppResult<Payment> {
        debug!(
            "Creating payment of {} for wallet {}",
            payment.amount, payment.wallet_id
        );

        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
            r#"
            INSERT INTO payments (wallet_id, amount, status)
            VALUES ($1, $2, $3)
            RETURNING id, wallet_id, amount, status, created_at, updated_at
            "#,
        )
        .bind(payment.wallet_id)
        .bind(payment.amount)
        .bind(payment.status.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating payment: {}", e);
            AppError::Database(format!("Failed to create payment: {}", e))
        })?;

        row.try_into()
    }

    #[instrument(skip(self, payment), fields(payment_id = payment.id, status = %payment.status))]
    async fn update(&self, payment: &Payment) -> AppResult<Payment> {
        debug!("Updating payment {} to {}", payment.id, payment.status);

        let Some(source) = payment.status.update_source() else {
            warn!("Refusing plain update of payment {} to {}", payment.id, payment.status);
            let current = select_payment(&self.pool, payment.id)
                .await?
                .ok_or(AppError::PaymentNotFound(payment.id))?;
            return Err(payment.rejected_move(current.status, payment.status));
        };

        // amount and wallet are fixed at creation; only the status moves,
        // and only from its single predecessor
        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
            r#"
            UPDATE payments
            SET status = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING id, wallet_id, amount, status, created_at, updated_at
            "#,
        )
        .bind(payment.id)
        .bind(payment.status.to_string())
        .bind(source.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating payment {}: {}", payment.id, e);
            AppError::Database(format!("Failed to update payment: {}", e))
        })?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current = select_payment(&self.pool, payment.id)
                    .await?
                    .ok_or(AppError::PaymentNotFound(payment.id))?;
                warn!(
                    "Payment {} is {}, not {}; update refused",
                    payment.id, current.status, source
                );
                Err(payment.rejected_move(current.status, payment.status))
            }
        }
    }

    #[instrument(skip(self, payment), fields(payment_id = payment.id))]
    async fn apply(&self, payment: &Payment) -> AppResult<Transaction> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        // Compare-and-set on status; the row lock serializes concurrent finalizers
        let claimed: Option<(i64, i64)> = sqlx::query_as(
            r#"
            UPDATE payments
            SET status = 'applied',
                updated_at = NOW()
            WHERE id = $1 AND status = 'paid'
            RETURNING wallet_id, amount
            "#,
        )
        .bind(payment.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to claim payment {}: {}", payment.id, e);
            AppError::Database(format!("Failed to update payment: {}", e))
        })?;

        let (wallet_id, amount) = match claimed {
            Some(claimed) => claimed,
            None => {
                let current = select_payment(&mut *tx, payment.id)
                    .await?
                    .ok_or(AppError::PaymentNotFound(payment.id))?;
                warn!(
                    "Payment {} not settled, stored status is {}",
                    payment.id, current.status
                );
                current.ensure_applicable()?;
                return Err(AppError::Transaction(format!(
                    "Payment {} changed while it was being applied",
                    payment.id
                )));
            }
        };

        let new_balance = credit_wallet(&mut *tx, wallet_id, amount).await?;
        let transaction =
            insert_transaction(&mut *tx, &Transaction::deposit(wallet_id, amount, payment.id))
                .await?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!(
            "Applied payment {} to wallet {}: amount={}, balance={}",
            payment.id, wallet_id, amount, new_balance
        );

        Ok(transaction)
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    wallet_id: i64,
    amount: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status =
            PaymentStatus::from_str(&row.status).ok_or(AppError::InvalidPaymentStatus {
                payment_id: row.id,
                status: row.status,
            })?;

        Ok(Self {
            id: row.id,
            wallet_id: row.wallet_id,
            amount: row.amount,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> PaymentRow {
        PaymentRow {
            id: 12,
            wallet_id: 3,
            amount: 500,
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_known_status_maps() {
        let payment: Payment = row("paid").try_into().unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.amount, 500);
    }

    #[test]
    fn test_unknown_status_is_invalid_payment_status() {
        let result: AppResult<Payment> = row("refunded").try_into();
        match result {
            Err(AppError::InvalidPaymentStatus { payment_id, status }) => {
                assert_eq!(payment_id, 12);
                assert_eq!(status, "refunded");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
