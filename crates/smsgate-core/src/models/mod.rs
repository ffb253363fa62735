//! Domain models for the SMSGate ledger
//!
//! This module contains all the core domain models used throughout the application.

pub mod number;
pub mod payment;
pub mod transaction;
pub mod user;
pub mod wallet;

pub use number::{Number, NumberType, Subscription};
pub use payment::{Payment, PaymentStatus};
pub use transaction::{Transaction, TransactionStatus};
pub use user::User;
pub use wallet::Wallet;
