//! Business logic services for SMSGate
//!
//! Services orchestrate the repository traits from `smsgate-core`; they never
//! touch a database directly, so any store implementing the traits works.
//!
//! # Services
//!
//! - `WalletService` - Charge requests, charge finalization and balance checks
//! - `UserService` - User registration and default-number entitlement

pub mod user_service;
pub mod wallet_service;

pub use user_service::UserService;
pub use wallet_service::{BalanceCheck, ChargeRequest, WalletService};
