//! In-memory store implementing every repository trait
//!
//! One `parking_lot::Mutex` guards all tables, so each call, settlement
//! included, is atomic with respect to every other call. Nothing survives a
//! restart; this is for tests and single-process embedding.

use async_trait::async_trait;
use parking_lot::Mutex;
use smsgate_core::{
    models::{Number, Payment, Subscription, Transaction, User, Wallet},
    traits::{
        NumberRepository, PaymentRepository, SubscriptionRepository, TransactionRepository,
        UserRepository, WalletRepository,
    },
    AppError, AppResult,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    wallets: BTreeMap<i64, Wallet>,
    payments: BTreeMap<i64, Payment>,
    transactions: Vec<Transaction>,
    numbers: BTreeMap<i64, Number>,
    subscriptions: Vec<Subscription>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of all ledger repositories
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_ledger_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every balance or ledger write fail with a transaction error
    ///
    /// Nothing is written while the switch is on.
    pub fn set_fail_ledger_writes(&self, fail: bool) {
        self.fail_ledger_writes.store(fail, Ordering::SeqCst);
    }

    fn check_ledger_writes(&self) -> AppResult<()> {
        if self.fail_ledger_writes.load(Ordering::SeqCst) {
            warn!("Ledger write rejected by failure injection");
            return Err(AppError::Transaction(
                "ledger writes are disabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Add a number, returning it with its assigned ID
    pub fn insert_number(&self, mut number: Number) -> Number {
        let mut tables = self.tables.lock();
        number.id = tables.allocate_id();
        tables.numbers.insert(number.id, number.clone());
        number
    }

    /// Add a subscription, returning it with its assigned ID
    pub fn insert_subscription(&self, mut subscription: Subscription) -> Subscription {
        let mut tables = self.tables.lock();
        subscription.id = tables.allocate_id();
        tables.subscriptions.push(subscription.clone());
        subscription
    }

    /// Snapshot of the ledger in insertion order
    pub fn transactions(&self) -> Vec<Transaction> {
        self.tables.lock().transactions.clone()
    }

    /// Number of stored payments
    pub fn payment_count(&self) -> usize {
        self.tables.lock().payments.len()
    }
}

#[async_trait]
impl WalletRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Wallet>> {
        Ok(self.tables.lock().wallets.get(&id).cloned())
    }

    async fn find_by_user_id(&self, user_id: i64) -> AppResult<Option<Wallet>> {
        Ok(self
            .tables
            .lock()
            .wallets
            .values()
            .find(|w| w.user_id == user_id)
            .cloned())
    }

    async fn create(&self, wallet: &Wallet) -> AppResult<Wallet> {
        let mut tables = self.tables.lock();
        if tables.wallets.values().any(|w| w.user_id == wallet.user_id) {
            return Err(AppError::AlreadyExists(format!(
                "Wallet for user {} already exists",
                wallet.user_id
            )));
        }

        let mut created = wallet.clone();
        created.id = tables.allocate_id();
        tables.wallets.insert(created.id, created.clone());
        debug!("Created wallet {} for user {}", created.id, created.user_id);
        Ok(created)
    }

    async fn charge_wallet(&self, wallet_id: i64, amount: i64) -> AppResult<i64> {
        self.check_ledger_writes()?;
        let mut tables = self.tables.lock();
        let wallet = tables
            .wallets
            .get_mut(&wallet_id)
            .ok_or(AppError::WalletNotFound(wallet_id))?;
        wallet.credit(amount)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Payment>> {
        Ok(self.tables.lock().payments.get(&id).cloned())
    }

    async fn create(&self, payment: &Payment) -> AppResult<Payment> {
        let mut tables = self.tables.lock();
        let mut created = payment.clone();
        created.id = tables.allocate_id();
        tables.payments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, payment: &Payment) -> AppResult<Payment> {
        let mut tables = self.tables.lock();
        let stored = tables
            .payments
            .get_mut(&payment.id)
            .ok_or(AppError::PaymentNotFound(payment.id))?;
        if payment.status.update_source() != Some(stored.status) {
            warn!(
                "Refusing to move payment {} from {} to {}",
                payment.id, stored.status, payment.status
            );
            return Err(payment.rejected_move(stored.status, payment.status));
        }
        stored.status = payment.status;
        stored.updated_at = payment.updated_at;
        Ok(stored.clone())
    }

    async fn apply(&self, payment: &Payment) -> AppResult<Transaction> {
        let mut tables = self.tables.lock();

        let mut settled = tables
            .payments
            .get(&payment.id)
            .cloned()
            .ok_or(AppError::PaymentNotFound(payment.id))?;
        settled.mark_applied()?;
        self.check_ledger_writes()?;

        let mut wallet = tables
            .wallets
            .get(&settled.wallet_id)
            .cloned()
            .ok_or(AppError::WalletNotFound(settled.wallet_id))?;
        wallet.credit(settled.amount)?;

        // validated; write all three together
        let mut transaction = Transaction::deposit(wallet.id, settled.amount, settled.id);
        transaction.id = tables.allocate_id();
        tables.wallets.insert(wallet.id, wallet);
        tables.payments.insert(settled.id, settled);
        tables.transactions.push(transaction.clone());

        Ok(transaction)
    }
}

#[async_trait]
impl TransactionRepository for MemoryStore {
    async fn create(&self, transaction: &Transaction) -> AppResult<Transaction> {
        self.check_ledger_writes()?;
        let mut tables = self.tables.lock();
        let mut created = transaction.clone();
        created.id = tables.allocate_id();
        tables.transactions.push(created.clone());
        Ok(created)
    }

    async fn list_by_wallet(
        &self,
        wallet_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Transaction>, i64)> {
        let tables = self.tables.lock();
        let matching: Vec<&Transaction> = tables
            .transactions
            .iter()
            .rev()
            .filter(|t| t.wallet_id == wallet_id)
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl NumberRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Number>> {
        Ok(self.tables.lock().numbers.get(&id).cloned())
    }

    async fn find_default(&self) -> AppResult<Option<Number>> {
        Ok(self
            .tables
            .lock()
            .numbers
            .values()
            .find(|n| n.is_default)
            .cloned())
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn find_by_user_id(&self, user_id: i64) -> AppResult<Option<Subscription>> {
        Ok(self
            .tables
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.expiration_date)
            .cloned())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .tables
            .lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_all(&self) -> AppResult<Vec<User>> {
        Ok(self.tables.lock().users.values().cloned().collect())
    }

    async fn create(&self, user: &User) -> AppResult<User> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::AlreadyExists(format!(
                "Username {} already exists",
                user.username
            )));
        }

        let mut created = user.clone();
        created.id = tables.allocate_id();
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let mut tables = self.tables.lock();
        let stored = tables
            .users
            .get_mut(&user.id)
            .ok_or(AppError::UserNotFound(user.id))?;
        *stored = user.clone();
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use smsgate_core::models::{NumberType, PaymentStatus, TransactionStatus};

    async fn paid_payment(store: &MemoryStore, amount: i64) -> (Wallet, Payment) {
        let wallet = WalletRepository::create(store, &Wallet::new(1)).await.unwrap();
        let mut payment = PaymentRepository::create(store, &Payment::new(wallet.id, amount))
            .await
            .unwrap();
        payment.mark_paid().unwrap();
        PaymentRepository::update(store, &payment).await.unwrap();
        (wallet, payment)
    }

    #[tokio::test]
    async fn test_apply_credits_once() {
        let store = MemoryStore::new();
        let (wallet, payment) = paid_payment(&store, 300).await;

        let tx = store.apply(&payment).await.unwrap();
        assert_eq!(tx.amount, 300);
        assert_eq!(tx.status, TransactionStatus::Deposit);

        let err = store.apply(&payment).await.unwrap_err();
        assert!(matches!(err, AppError::PaymentAlreadyApplied(_)));

        let stored = WalletRepository::find_by_id(&store, wallet.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.balance, 300);
        assert_eq!(store.transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_uses_stored_status() {
        let store = MemoryStore::new();
        let (_, mut payment) = paid_payment(&store, 100).await;

        // caller's copy is stale; the store still says paid
        payment.status = PaymentStatus::Unpaid;
        assert!(store.apply(&payment).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_cannot_reopen_applied_payment() {
        let store = MemoryStore::new();
        let (wallet, mut payment) = paid_payment(&store, 500).await;
        store.apply(&payment).await.unwrap();

        payment.status = PaymentStatus::Paid;
        assert!(matches!(
            PaymentRepository::update(&store, &payment).await,
            Err(AppError::InvalidPaymentStatus { .. })
        ));

        let err = store.apply(&payment).await.unwrap_err();
        assert!(matches!(err, AppError::PaymentAlreadyApplied(_)));
        let wallet = WalletRepository::find_by_id(&store, wallet.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wallet.balance, 500);
        assert_eq!(store.transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_update_cannot_skip_settlement() {
        let store = MemoryStore::new();
        let (wallet, mut payment) = paid_payment(&store, 80).await;

        payment.status = PaymentStatus::Applied;
        assert!(PaymentRepository::update(&store, &payment).await.is_err());
        payment.status = PaymentStatus::Unpaid;
        assert!(PaymentRepository::update(&store, &payment).await.is_err());

        let stored = PaymentRepository::find_by_id(&store, payment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentStatus::Paid);
        assert!(store.apply(&stored).await.is_ok());
        let wallet = WalletRepository::find_by_id(&store, wallet.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wallet.balance, 80);
    }

    #[tokio::test]
    async fn test_failed_apply_writes_nothing() {
        let store = MemoryStore::new();
        let (wallet, payment) = paid_payment(&store, 100).await;

        store.set_fail_ledger_writes(true);
        assert!(matches!(
            store.apply(&payment).await,
            Err(AppError::Transaction(_))
        ));

        let stored = PaymentRepository::find_by_id(&store, payment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentStatus::Paid);
        let wallet = WalletRepository::find_by_id(&store, wallet.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wallet.balance, 0);
        assert!(store.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_one_wallet_per_user() {
        let store = MemoryStore::new();
        WalletRepository::create(&store, &Wallet::new(5)).await.unwrap();
        assert!(matches!(
            WalletRepository::create(&store, &Wallet::new(5)).await,
            Err(AppError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_charge_wallet_missing() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.charge_wallet(99, 10).await,
            Err(AppError::WalletNotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_latest_subscription_wins() {
        let store = MemoryStore::new();
        store.insert_subscription(Subscription::new(7, Utc::now() - Duration::days(10)));
        let current =
            store.insert_subscription(Subscription::new(7, Utc::now() + Duration::days(10)));
        store.insert_subscription(Subscription::new(8, Utc::now() + Duration::days(99)));

        let found = SubscriptionRepository::find_by_user_id(&store, 7)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, current.id);
    }

    #[tokio::test]
    async fn test_default_number() {
        let store = MemoryStore::new();
        assert!(store.find_default().await.unwrap().is_none());

        store.insert_number(Number::new("+15550001", NumberType::Private));
        let default = store.insert_number(Number {
            is_default: true,
            ..Number::new("+15550002", NumberType::Public)
        });

        assert_eq!(store.find_default().await.unwrap().unwrap().id, default.id);
    }

    #[tokio::test]
    async fn test_list_by_wallet_newest_first() {
        let store = MemoryStore::new();
        for (payment_id, amount) in [(1, 10), (2, 20), (3, 30)] {
            TransactionRepository::create(&store, &Transaction::deposit(4, amount, payment_id))
                .await
                .unwrap();
        }
        TransactionRepository::create(&store, &Transaction::deposit(5, 99, 9))
            .await
            .unwrap();

        let (page, total) = store.list_by_wallet(4, 2, 0).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(
            page.iter().map(|t| t.amount).collect::<Vec<_>>(),
            vec![30, 20]
        );

        let (page, _) = store.list_by_wallet(4, 2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].amount, 10);
    }
}
