use sqlx::PgPool;

use super::conflict_on_unique;
use crate::errors::AppError;
use crate::models::{Role, User};
use crate::validation::agent_public_url;

const USER_COLUMNS: &str =
    "user_id, email, name, role, profile_picture, is_active, created_at, last_login";
const DUPLICATE_EMAIL: &str = "User with this email already exists";

/// Fields of a user about to be created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub profile_picture: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub bio: Option<String>,
}

/// Database storage for CRM users
pub struct UserStorage {
    pool: PgPool,
}

impl UserStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Refreshes `last_login` and returns the updated row.
    pub async fn record_login(&self, user_id: i32) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET last_login = NOW() WHERE user_id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Inserts a user; agents also get a profile with a generated public URL.
    ///
    /// Both rows are written in one transaction.
    ///
    /// # Errors
    ///
    /// `409 Conflict` when the email is already registered.
    pub async fn create(&self, new_user: &NewUser) -> Result<User, AppError> {
        let email = new_user.email.trim().to_lowercase();
        let mut tx = self.pool.begin().await?;

        let existing: Option<i32> =
            sqlx::query_scalar("SELECT user_id FROM users WHERE LOWER(email) = $1")
                .bind(&email)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, role, profile_picture) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&email)
        .bind(new_user.name.trim())
        .bind(new_user.role)
        .bind(&new_user.profile_picture)
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_on_unique(DUPLICATE_EMAIL))?;

        if user.role == Role::Agent {
            let public_url = agent_public_url(user.user_id, &user.name);
            sqlx::query(
                r#"
                INSERT INTO agent_profiles (user_id, public_url, bio, phone, specialization, profile_picture)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(user.user_id)
            .bind(&public_url)
            .bind(&new_user.bio)
            .bind(&new_user.phone)
            .bind(&new_user.specialization)
            .bind(&new_user.profile_picture)
            .execute(&mut *tx)
            .await
            .map_err(conflict_on_unique("Public URL already taken"))?;

            tracing::info!("Agent profile created: {}", public_url);
        }

        tx.commit().await?;

        tracing::info!("✓ User created: {} ({})", user.email, user.role);
        Ok(user)
    }

    pub async fn update_role(&self, user_id: i32, role: Role) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $1 WHERE user_id = $2 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(role)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// True when `user_id` exists with the agent role.
    pub async fn is_agent(&self, user_id: i32) -> Result<bool, AppError> {
        let found: Option<i32> =
            sqlx::query_scalar("SELECT user_id FROM users WHERE user_id = $1 AND role = 'agent'")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }
}
