//! SMSGate Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the SMSGate wallet ledger. It includes:
//!
//! - Domain models (Wallet, Payment, Transaction, Number, Subscription, User)
//! - Repository traits consumed by the services
//! - Unified error handling with a stable error taxonomy
//! - Application configuration and tracing setup

pub mod config;
pub mod error;
pub mod models;
pub mod telemetry;
pub mod traits;

pub use config::AppConfig;
pub use error::{AppError, ErrorKind};

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
