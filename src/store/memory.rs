use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Admin, CredentialStore, NewAdmin, NewUser, PasswordReset, StoreError, StoreResult, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    admins: HashMap<Uuid, Admin>,
    resets: HashMap<Uuid, PasswordReset>,
}

/// In-process store. Enforces the same uniqueness rules as the SQL schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<User> {
        let t = self.tables.read().await;
        t.users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<User> {
        let t = self.tables.read().await;
        t.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_user_by_verification_token(&self, token: &str) -> StoreResult<User> {
        let t = self.tables.read().await;
        t.users
            .values()
            .find(|u| u.verification_token.as_deref() == Some(token))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            age: new.age,
            gender: new.gender,
            address: new.address,
            phone_number: new.phone_number,
            image_url: None,
            is_verified: new.is_verified,
            is_blocked: false,
            verification_token: new.verification_token,
            verification_expires_at: new.verification_expires_at,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(StoreError::Conflict);
        }
        let slot = t.users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        *slot = User {
            updated_at: OffsetDateTime::now_utc(),
            ..user.clone()
        };
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.users.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn set_user_blocked(&self, id: Uuid, blocked: bool) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let user = t.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.is_blocked = blocked;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let t = self.tables.read().await;
        let mut users: Vec<User> = t.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Admin> {
        let t = self.tables.read().await;
        t.admins
            .values()
            .find(|a| a.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_admin(&self, new: NewAdmin) -> StoreResult<Admin> {
        let mut t = self.tables.write().await;
        if t.admins.values().any(|a| a.email == new.email) {
            return Err(StoreError::Conflict);
        }
        let admin = Admin {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        t.admins.insert(admin.id, admin.clone());
        Ok(admin)
    }

    async fn create_reset(&self, reset: &PasswordReset) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.resets.values().any(|r| r.reset_token == reset.reset_token) {
            return Err(StoreError::Conflict);
        }
        t.resets.retain(|_, r| r.user_id != reset.user_id);
        t.resets.insert(reset.id, reset.clone());
        Ok(())
    }

    async fn find_reset_by_token(&self, token: &str) -> StoreResult<PasswordReset> {
        let t = self.tables.read().await;
        t.resets
            .values()
            .find(|r| r.reset_token == token)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete_reset(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.resets.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn consume_reset(
        &self,
        reset_id: Uuid,
        user_id: Uuid,
        password_hash: &str,
    ) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        if !t.resets.get(&reset_id).is_some_and(|r| r.user_id == user_id) {
            return Ok(false);
        }
        let user = t.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = OffsetDateTime::now_utc();
        t.resets.remove(&reset_id);
        Ok(true)
    }

    async fn purge_expired_resets(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        let before = t.resets.len();
        t.resets.retain(|_, r| !r.is_expired_at(now));
        Ok((before - t.resets.len()) as u64)
    }
}
