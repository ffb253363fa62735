//! SMSGate Database Layer
//!
//! This crate provides storage for the SMSGate ledger:
//!
//! - Connection pool management and embedded migrations with sqlx
//! - PostgreSQL implementations of every repository trait
//! - Payment settlement as a single database transaction
//! - `MemoryStore`, an in-process store with the same contracts

pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::MemoryStore;
pub use pool::{create_pool, run_migrations};
pub use repositories::*;

// Re-export commonly used types
pub use smsgate_core::{AppError, AppResult};
pub use sqlx::PgPool;
