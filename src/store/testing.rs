//! Store doubles for exercising backend failure paths.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    Admin, CredentialStore, MemoryStore, NewAdmin, NewUser, PasswordReset, StoreError,
    StoreResult, User,
};

/// Delegates to a [`MemoryStore`] but can be told to fail selected calls
/// the way a dropped database connection would.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_user_lookup: AtomicBool,
    fail_reset_consume: AtomicBool,
}

impl FlakyStore {
    pub fn fail_user_lookup(&self, fail: bool) {
        self.fail_user_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reset_consume(&self, fail: bool) {
        self.fail_reset_consume.store(fail, Ordering::SeqCst);
    }

    fn down() -> StoreError {
        StoreError::Backend(anyhow::anyhow!("db down: connection reset by peer"))
    }
}

#[async_trait]
impl CredentialStore for FlakyStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<User> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<User> {
        if self.fail_user_lookup.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        self.inner.find_user_by_id(id).await
    }

    async fn find_user_by_verification_token(&self, token: &str) -> StoreResult<User> {
        self.inner.find_user_by_verification_token(token).await
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.inner.create_user(user).await
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.inner.update_user(user).await
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        self.inner.delete_user(id).await
    }

    async fn set_user_blocked(&self, id: Uuid, blocked: bool) -> StoreResult<()> {
        self.inner.set_user_blocked(id, blocked).await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.inner.list_users().await
    }

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Admin> {
        self.inner.find_admin_by_email(email).await
    }

    async fn create_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        self.inner.create_admin(admin).await
    }

    async fn create_reset(&self, reset: &PasswordReset) -> StoreResult<()> {
        self.inner.create_reset(reset).await
    }

    async fn find_reset_by_token(&self, token: &str) -> StoreResult<PasswordReset> {
        self.inner.find_reset_by_token(token).await
    }

    async fn delete_reset(&self, id: Uuid) -> StoreResult<()> {
        self.inner.delete_reset(id).await
    }

    async fn consume_reset(
        &self,
        reset_id: Uuid,
        user_id: Uuid,
        password_hash: &str,
    ) -> StoreResult<bool> {
        if self.fail_reset_consume.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        self.inner.consume_reset(reset_id, user_id, password_hash).await
    }

    async fn purge_expired_resets(&self, now: OffsetDateTime) -> StoreResult<u64> {
        self.inner.purge_expired_resets(now).await
    }
}
