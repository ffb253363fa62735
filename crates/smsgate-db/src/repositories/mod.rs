//! Repository implementations
//!
//! Concrete implementations of the repository traits defined in
//! smsgate-core, using sqlx for PostgreSQL access.

pub mod number_repo;
pub mod payment_repo;
pub mod transaction_repo;
pub mod user_repo;
pub mod wallet_repo;

pub use number_repo::{PgNumberRepository, PgSubscriptionRepository};
pub use payment_repo::PgPaymentRepository;
pub use transaction_repo::PgTransactionRepository;
pub use user_repo::PgUserRepository;
pub use wallet_repo::PgWalletRepository;
