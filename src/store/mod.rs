//! Persistence boundary for principals and password reset grants.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod memory;
pub mod models;
pub mod postgres;
#[cfg(test)]
pub mod testing;

pub use memory::MemoryStore;
pub use models::{Admin, NewAdmin, NewUser, PasswordReset, User};
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A unique constraint rejected the write (duplicate email or token).
    #[error("record already exists")]
    Conflict,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<User>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<User>;
    async fn find_user_by_verification_token(&self, token: &str) -> StoreResult<User>;
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    /// Persists every mutable column of `user`, bumping `updated_at`.
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;
    async fn set_user_blocked(&self, id: Uuid, blocked: bool) -> StoreResult<()>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Admin>;
    async fn create_admin(&self, admin: NewAdmin) -> StoreResult<Admin>;

    /// Stores `reset` and drops every earlier reset of the same user, atomically.
    async fn create_reset(&self, reset: &PasswordReset) -> StoreResult<()>;
    async fn find_reset_by_token(&self, token: &str) -> StoreResult<PasswordReset>;
    /// Fails with `NotFound` when the record was already consumed.
    async fn delete_reset(&self, id: Uuid) -> StoreResult<()>;
    /// Deletes reset `reset_id` and writes `password_hash` for `user_id` as one unit.
    /// `Ok(false)` when the reset was already consumed; `NotFound` when the user is
    /// gone. Nothing changes unless both writes succeed.
    async fn consume_reset(
        &self,
        reset_id: Uuid,
        user_id: Uuid,
        password_hash: &str,
    ) -> StoreResult<bool>;
    /// Deletes every reset whose expiry is at or before `now`; returns the count.
    async fn purge_expired_resets(&self, now: OffsetDateTime) -> StoreResult<u64>;
}
