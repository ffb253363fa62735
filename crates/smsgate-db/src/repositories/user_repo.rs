//! User repository implementation
//!
//! Provides PostgreSQL-backed storage for users and their default number.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smsgate_core::{models::User, traits::UserRepository, AppError, AppResult};
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of UserRepository
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        debug!("Finding user by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, UserRow>(
            r#"
            SELECT id, username, password_hash, default_number_id,
                   is_active, is_admin, is_login_required,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding user {}: {}", id, e);
            AppError::Database(format!("Failed to find user: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        debug!("Finding user by username: {}", username);

        let row = sqlx::query_as::<sqlx::Postgres, UserRow>(
            r#"
            SELECT id, username, password_hash, default_number_id,
                   is_active, is_admin, is_login_required,
                   created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding user by username: {}", e);
            AppError::Database(format!("Failed to find user: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<sqlx::Postgres, UserRow>(
            r#"
            SELECT id, username, password_hash, default_number_id,
                   is_active, is_admin, is_login_required,
                   created_at, updated_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing users: {}", e);
            AppError::Database(format!("Failed to fetch users: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create(&self, user: &User) -> AppResult<User> {
        debug!("Creating user: {}", user.username);

        let row = sqlx::query_as::<sqlx::Postgres, UserRow>(
            r#"
            INSERT INTO users (
                username, password_hash, default_number_id,
                is_active, is_admin, is_login_required
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, password_hash, default_number_id,
                      is_active, is_admin, is_login_required,
                      created_at, updated_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.default_number_id)
        .bind(user.is_active)
        .bind(user.is_admin)
        .bind(user.is_login_required)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating user: {}", e);
            if e.to_string().contains("unique constraint") {
                AppError::AlreadyExists(format!("Username {} already exists", user.username))
            } else {
                AppError::Database(format!("Failed to create user: {}", e))
            }
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update(&self, user: &User) -> AppResult<User> {
        debug!("Updating user: {}", user.id);

        let row = sqlx::query_as::<sqlx::Postgres, UserRow>(
            r#"
            UPDATE users
            SET username = $2,
                password_hash = $3,
                default_number_id = $4,
                is_active = $5,
                is_admin = $6,
                is_login_required = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, password_hash, default_number_id,
                      is_active, is_admin, is_login_required,
                      created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.default_number_id)
        .bind(user.is_active)
        .bind(user.is_admin)
        .bind(user.is_login_required)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating user {}: {}", user.id, e);
            AppError::Database(format!("Failed to update user: {}", e))
        })?
        .ok_or(AppError::UserNotFound(user.id))?;

        Ok(row.into())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    default_number_id: Option<i64>,
    is_active: bool,
    is_admin: bool,
    is_login_required: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            default_number_id: row.default_number_id,
            is_active: row.is_active,
            is_admin: row.is_admin,
            is_login_required: row.is_login_required,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
