use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::accounts::repo_types::{NewUser, Profile, Role, User, UserChanges};
use crate::db::{map_unique, PgStore};

const USER_COLUMNS: &str =
    "id, email, name, role, is_active, password_hash, otp, otp_created_at, date_joined";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, new: NewUser) -> anyhow::Result<User>;
    /// Newest first.
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>>;
    /// Cascades to the profile, enrollments and favorites of the user.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn count_by_role(&self, role: Role) -> anyhow::Result<i64>;

    /// Overwrites any pending code.
    async fn store_otp(&self, id: Uuid, code: &str, issued_at: OffsetDateTime) -> anyhow::Result<()>;
    /// Sets the password and clears the pending code in one write.
    async fn reset_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;

    async fn create_profile(&self, user_id: Uuid) -> anyhow::Result<Profile>;
    async fn find_profile(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>>;
    async fn set_avatar(&self, user_id: Uuid, avatar_key: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, password_hash, role)
            VALUES (lower($1), $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.password_hash)
        .bind(new.role)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, "email"))?;
        Ok(user)
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY date_joined DESC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = $2, email = lower($3), role = $4, is_active = $5
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(changes.role)
        .bind(changes.is_active)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_unique(e, "email"))?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_by_role(&self, role: Role) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn store_otp(&self, id: Uuid, code: &str, issued_at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET otp = $2, otp_created_at = $3 WHERE id = $1")
            .bind(id)
            .bind(code)
            .bind(issued_at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn reset_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2, otp = NULL, otp_created_at = NULL
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn create_profile(&self, user_id: Uuid) -> anyhow::Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING user_id, avatar_key, created_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(profile)
    }

    async fn find_profile(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT user_id, avatar_key, created_at FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(profile)
    }

    async fn set_avatar(&self, user_id: Uuid, avatar_key: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, avatar_key)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET avatar_key = EXCLUDED.avatar_key
            "#,
        )
        .bind(user_id)
        .bind(avatar_key)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
