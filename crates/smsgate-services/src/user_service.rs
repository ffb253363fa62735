//! User service
//!
//! Account creation and lookups, plus the default-number entitlement check:
//! a public number may be used by anyone, any other number only while the
//! user holds an unexpired subscription.

use chrono::{DateTime, Utc};
use smsgate_core::{
    models::{User, Wallet},
    traits::{NumberRepository, SubscriptionRepository, UserRepository, WalletRepository},
    AppError, AppResult,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// User service
pub struct UserService<U, W, N, S>
where
    U: UserRepository,
    W: WalletRepository,
    N: NumberRepository,
    S: SubscriptionRepository,
{
    user_repo: Arc<U>,
    wallet_repo: Arc<W>,
    number_repo: Arc<N>,
    subscription_repo: Arc<S>,
}

impl<U, W, N, S> UserService<U, W, N, S>
where
    U: UserRepository,
    W: WalletRepository,
    N: NumberRepository,
    S: SubscriptionRepository,
{
    /// Create a new user service
    pub fn new(
        user_repo: Arc<U>,
        wallet_repo: Arc<W>,
        number_repo: Arc<N>,
        subscription_repo: Arc<S>,
    ) -> Self {
        Self {
            user_repo,
            wallet_repo,
            number_repo,
            subscription_repo,
        }
    }

    /// Register a user and open their wallet
    ///
    /// The password must already be hashed. Flags are reset to those of a
    /// fresh regular account, and the store's default number is assigned
    /// when there is one.
    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    pub async fn create_user(&self, new_user: User) -> AppResult<User> {
        let mut user = new_user;

        if let Some(number) = self.number_repo.find_default().await? {
            debug!("Assigning default number {} to {}", number.id, user.username);
            user.default_number_id = Some(number.id);
        }
        user.is_active = true;
        user.is_admin = false;
        user.is_login_required = true;

        let user = self.user_repo.create(&user).await?;
        let wallet = self.wallet_repo.create(&Wallet::new(user.id)).await?;

        info!(
            "Created user {} ({}) with wallet {}",
            user.id, user.username, wallet.id
        );

        Ok(user)
    }

    /// Get a user by ID
    #[instrument(skip(self))]
    pub async fn get_user_by_id(&self, user_id: i64) -> AppResult<User> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))
    }

    /// Get a user by username
    #[instrument(skip(self))]
    pub async fn get_user_by_username(&self, username: &str) -> AppResult<User> {
        self.user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", username)))
    }

    /// List every user
    pub async fn get_all(&self) -> AppResult<Vec<User>> {
        self.user_repo.find_all().await
    }

    /// Persist changes to an existing user
    ///
    /// The default number is kept as stored; it only changes through
    /// `update_default_number`, which checks the entitlement.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn update(&self, user: &User) -> AppResult<User> {
        let stored = self.get_user_by_id(user.id).await?;

        let mut user = user.clone();
        if user.default_number_id != stored.default_number_id {
            warn!(
                "Ignoring default number change for user {} outside the entitlement check",
                user.id
            );
            user.default_number_id = stored.default_number_id;
        }
        user.updated_at = Utc::now();
        self.user_repo.update(&user).await
    }

    /// Set the user's default sending number, checked against the clock now
    pub async fn update_default_number(&self, user_id: i64, number_id: i64) -> AppResult<User> {
        self.update_default_number_at(user_id, number_id, Utc::now())
            .await
    }

    /// Set the user's default sending number, checked at `now`
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user does not exist
    /// - `InvalidNumber` if the number does not exist, or if it is not public
    ///   and the user has no subscription active at `now`
    ///
    /// The user is left untouched on every error.
    #[instrument(skip(self))]
    pub async fn update_default_number_at(
        &self,
        user_id: i64,
        number_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<User> {
        let mut user = self.get_user_by_id(user_id).await?;

        let number = self
            .number_repo
            .find_by_id(number_id)
            .await?
            .ok_or(AppError::InvalidNumber(number_id))?;

        if !number.is_public() {
            let subscription = self.subscription_repo.find_by_user_id(user.id).await?;
            match subscription {
                Some(s) if s.is_active_at(now) => {
                    debug!(
                        "Subscription {} active until {}",
                        s.id, s.expiration_date
                    );
                }
                Some(s) => {
                    warn!(
                        "User {} subscription {} expired at {}, checked at {}",
                        user.id, s.id, s.expiration_date, now
                    );
                    return Err(AppError::InvalidNumber(number_id));
                }
                None => {
                    warn!(
                        "User {} has no subscription for {} number {}",
                        user.id, number.number_type, number.id
                    );
                    return Err(AppError::InvalidNumber(number_id));
                }
            }
        }

        user.default_number_id = Some(number.id);
        user.updated_at = now;
        let user = self.user_repo.update(&user).await?;

        info!(
            "User {} default number set to {} (checked at {})",
            user.id, number.id, now
        );

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use smsgate_core::models::{Number, NumberType, Subscription};
    use smsgate_db::MemoryStore;

    type Service = UserService<MemoryStore, MemoryStore, MemoryStore, MemoryStore>;

    fn service(store: &Arc<MemoryStore>) -> Service {
        UserService::new(store.clone(), store.clone(), store.clone(), store.clone())
    }

    /// Fails the test if the subscription store is consulted
    struct UntouchedSubscriptions;

    #[async_trait]
    impl SubscriptionRepository for UntouchedSubscriptions {
        async fn find_by_user_id(&self, user_id: i64) -> AppResult<Option<Subscription>> {
            panic!("subscription lookup for user {}", user_id);
        }
    }

    #[tokio::test]
    async fn test_create_user_opens_wallet() {
        let store = Arc::new(MemoryStore::new());
        let default = store.insert_number(Number {
            is_default: true,
            ..Number::new("+15550100", NumberType::Public)
        });

        let mut new_user = User::new("carol", "$argon2id$hash");
        new_user.is_admin = true;
        new_user.is_active = false;

        let user = service(&store).create_user(new_user).await.unwrap();

        assert!(user.id > 0);
        assert_eq!(user.default_number_id, Some(default.id));
        assert!(user.is_active);
        assert!(!user.is_admin);
        assert!(user.is_login_required);

        let wallet = WalletRepository::find_by_user_id(store.as_ref(), user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wallet.balance, 0);
    }

    #[tokio::test]
    async fn test_create_user_without_default_number() {
        let store = Arc::new(MemoryStore::new());
        let user = service(&store)
            .create_user(User::new("dave", "hash"))
            .await
            .unwrap();
        assert_eq!(user.default_number_id, None);
    }

    #[tokio::test]
    async fn test_create_user_duplicate_username() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);
        service.create_user(User::new("erin", "hash")).await.unwrap();

        let err = service
            .create_user(User::new("erin", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_lookups() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);
        let user = service.create_user(User::new("frank", "hash")).await.unwrap();

        assert_eq!(service.get_user_by_id(user.id).await.unwrap().username, "frank");
        assert_eq!(service.get_user_by_username("frank").await.unwrap().id, user.id);
        assert_eq!(service.get_all().await.unwrap().len(), 1);
        assert!(matches!(
            service.get_user_by_id(999).await,
            Err(AppError::UserNotFound(999))
        ));
        assert!(matches!(
            service.get_user_by_username("nobody").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let store = Arc::new(MemoryStore::new());
        let mut ghost = User::new("ghost", "hash");
        ghost.id = 42;
        assert!(matches!(
            service(&store).update(&ghost).await,
            Err(AppError::UserNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_default_number() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);
        let user = service.create_user(User::new("lena", "hash")).await.unwrap();
        let private = store.insert_number(Number::new("+15550205", NumberType::Private));

        assert!(service
            .update_default_number(user.id, private.id)
            .await
            .is_err());

        let mut changed = user.clone();
        changed.default_number_id = Some(private.id);
        changed.is_login_required = false;
        let updated = service.update(&changed).await.unwrap();

        assert_eq!(updated.default_number_id, None);
        assert!(!updated.is_login_required);
        let stored = service.get_user_by_id(user.id).await.unwrap();
        assert_eq!(stored.default_number_id, None);
        assert!(!stored.is_login_required);
    }

    #[tokio::test]
    async fn test_private_number_with_active_subscription() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);
        let user = service.create_user(User::new("gina", "hash")).await.unwrap();
        let number = store.insert_number(Number::new("+15550200", NumberType::Private));
        let now = Utc::now();
        store.insert_subscription(Subscription::new(user.id, now + Duration::days(30)));

        let updated = service
            .update_default_number_at(user.id, number.id, now)
            .await
            .unwrap();
        assert_eq!(updated.default_number_id, Some(number.id));
    }

    #[tokio::test]
    async fn test_subscription_active_at_expiration_instant() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);
        let user = service.create_user(User::new("hank", "hash")).await.unwrap();
        let number = store.insert_number(Number::new("+15550201", NumberType::Private));
        let expires = Utc::now();
        store.insert_subscription(Subscription::new(user.id, expires));

        assert!(service
            .update_default_number_at(user.id, number.id, expires)
            .await
            .is_ok());

        let err = service
            .update_default_number_at(user.id, number.id, expires + Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidNumber(id) if id == number.id));
    }

    #[tokio::test]
    async fn test_private_number_without_subscription() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);
        let user = service.create_user(User::new("ivy", "hash")).await.unwrap();
        let number = store.insert_number(Number::new("+15550202", NumberType::Private));

        let err = service
            .update_default_number(user.id, number.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidNumber(id) if id == number.id));

        let stored = service.get_user_by_id(user.id).await.unwrap();
        assert_eq!(stored.default_number_id, None);
    }

    #[tokio::test]
    async fn test_unknown_user_and_number() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store);
        let user = service.create_user(User::new("jack", "hash")).await.unwrap();
        let number = store.insert_number(Number::new("+15550203", NumberType::Public));

        assert!(matches!(
            service.update_default_number(999, number.id).await,
            Err(AppError::UserNotFound(999))
        ));
        assert!(matches!(
            service.update_default_number(user.id, 888).await,
            Err(AppError::InvalidNumber(888))
        ));
    }

    #[tokio::test]
    async fn test_public_number_skips_subscription_lookup() {
        let store = Arc::new(MemoryStore::new());
        let user = UserRepository::create(store.as_ref(), &User::new("kim", "hash"))
            .await
            .unwrap();
        let number = store.insert_number(Number::new("+15550204", NumberType::Public));

        let service = UserService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(UntouchedSubscriptions),
        );

        let updated = service
            .update_default_number(user.id, number.id)
            .await
            .unwrap();
        assert_eq!(updated.default_number_id, Some(number.id));
    }
}
