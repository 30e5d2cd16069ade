use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    Admin, CredentialStore, NewAdmin, NewUser, PasswordReset, StoreError, StoreResult, User,
};

const USER_COLUMNS: &str = r#"
    id, name, email, password_hash, age, gender, address, phone_number, image_url,
    is_verified, is_blocked, verification_token, verification_expires_at,
    created_at, updated_at
"#;

/// Postgres-backed credential store.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }

    async fn find_user_where(&self, column: &str, value: &str) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict,
            other => StoreError::Backend(other.into()),
        }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<User> {
        self.find_user_where("email", email).await
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_user_by_verification_token(&self, token: &str) -> StoreResult<User> {
        self.find_user_where("verification_token", token).await
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, age, gender, address,
                               phone_number, is_verified, verification_token,
                               verification_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.age)
            .bind(&user.gender)
            .bind(&user.address)
            .bind(&user.phone_number)
            .bind(user.is_verified)
            .bind(&user.verification_token)
            .bind(user.verification_expires_at)
            .fetch_one(&self.db)
            .await?;
        Ok(created)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET name = $2, email = $3, password_hash = $4, age = $5, gender = $6,
                   address = $7, phone_number = $8, image_url = $9, is_verified = $10,
                   is_blocked = $11, verification_token = $12,
                   verification_expires_at = $13, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.age)
        .bind(&user.gender)
        .bind(&user.address)
        .bind(&user.phone_number)
        .bind(&user.image_url)
        .bind(user.is_verified)
        .bind(user.is_blocked)
        .bind(&user.verification_token)
        .bind(user.verification_expires_at)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_user_blocked(&self, id: Uuid, blocked: bool) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE users SET is_blocked = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(blocked)
                .execute(&self.db)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.db).await?;
        Ok(users)
    }

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Admin> {
        let admin = sqlx::query_as::<_, Admin>(
            r#"
            SELECT id, name, email, password_hash, created_at
              FROM admins
             WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_one(&self.db)
        .await?;
        Ok(admin)
    }

    async fn create_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let created = sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&admin.name)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn create_reset(&self, reset: &PasswordReset) -> StoreResult<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query("DELETE FROM password_resets WHERE user_id = $1")
            .bind(reset.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO password_resets (id, user_id, reset_token, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(reset.id)
        .bind(reset.user_id)
        .bind(&reset.reset_token)
        .bind(reset.expires_at)
        .bind(reset.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn find_reset_by_token(&self, token: &str) -> StoreResult<PasswordReset> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            SELECT id, user_id, reset_token, expires_at, created_at
              FROM password_resets
             WHERE reset_token = $1
            "#,
        )
        .bind(token)
        .fetch_one(&self.db)
        .await?;
        Ok(reset)
    }

    async fn delete_reset(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM password_resets WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn consume_reset(
        &self,
        reset_id: Uuid,
        user_id: Uuid,
        password_hash: &str,
    ) -> StoreResult<bool> {
        // Dropping `tx` before commit rolls both statements back.
        let mut tx = self.db.begin().await.context("begin tx")?;
        let consumed = sqlx::query("DELETE FROM password_resets WHERE id = $1 AND user_id = $2")
            .bind(reset_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if consumed.rows_affected() == 0 {
            return Ok(false);
        }

        let updated = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await.context("commit tx")?;
        Ok(true)
    }

    async fn purge_expired_resets(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM password_resets WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}
