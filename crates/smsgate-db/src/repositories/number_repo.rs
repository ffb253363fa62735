//! Number and subscription repository implementations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smsgate_core::{
    models::{Number, NumberType, Subscription},
    traits::{NumberRepository, SubscriptionRepository},
    AppError, AppResult,
};
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of NumberRepository
pub struct PgNumberRepository {
    pool: PgPool,
}

impl PgNumberRepository {
    /// Create a new number repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NumberRepository for PgNumberRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Number>> {
        debug!("Finding number by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, NumberRow>(
            r#"
            SELECT id, phone, number_type, is_default, created_at
            FROM numbers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding number {}: {}", id, e);
            AppError::Database(format!("Failed to find number: {}", e))
        })?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self))]
    async fn find_default(&self) -> AppResult<Option<Number>> {
        let row = sqlx::query_as::<sqlx::Postgres, NumberRow>(
            r#"
            SELECT id, phone, number_type, is_default, created_at
            FROM numbers
            WHERE is_default
            ORDER BY id
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding default number: {}", e);
            AppError::Database(format!("Failed to find default number: {}", e))
        })?;

        row.map(TryInto::try_into).transpose()
    }
}

/// PostgreSQL implementation of SubscriptionRepository
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    #[instrument(skip(self))]
    async fn find_by_user_id(&self, user_id: i64) -> AppResult<Option<Subscription>> {
        debug!("Finding subscription for user: {}", user_id);

        let row = sqlx::query_as::<sqlx::Postgres, SubscriptionRow>(
            r#"
            SELECT id, user_id, expiration_date, created_at
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY expiration_date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding subscription for user {}: {}", user_id, e);
            AppError::Database(format!("Failed to find subscription: {}", e))
        })?;

        Ok(row.map(|row| Subscription {
            id: row.id,
            user_id: row.user_id,
            expiration_date: row.expiration_date,
            created_at: row.created_at,
        }))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NumberRow {
    id: i64,
    phone: String,
    number_type: String,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NumberRow> for Number {
    type Error = AppError;

    fn try_from(row: NumberRow) -> Result<Self, Self::Error> {
        let number_type = NumberType::from_str(&row.number_type).ok_or_else(|| {
            AppError::Database(format!(
                "Number {} has unknown type '{}'",
                row.id, row.number_type
            ))
        })?;

        Ok(Self {
            id: row.id,
            phone: row.phone,
            number_type,
            is_default: row.is_default,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    user_id: i64,
    expiration_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}
