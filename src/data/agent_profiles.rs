use sqlx::PgPool;

use super::update::build_update;
use crate::errors::AppError;
use crate::models::{AgentProfile, AgentProfileCreate, AgentProfilePatch, PublicAgent};

/// Database storage for agent profiles
pub struct AgentProfileStorage {
    pool: PgPool,
}

impl AgentProfileStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_user(&self, user_id: i32) -> Result<Option<AgentProfile>, AppError> {
        let profile =
            sqlx::query_as::<_, AgentProfile>("SELECT * FROM agent_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(profile)
    }

    /// Creates the caller's profile.
    ///
    /// # Errors
    ///
    /// `400` when the user already has a profile or the public URL is taken.
    pub async fn create(
        &self,
        user_id: i32,
        data: &AgentProfileCreate,
    ) -> Result<AgentProfile, AppError> {
        let public_url = data.public_url.trim();
        let mut tx = self.pool.begin().await?;

        let has_profile: Option<i32> =
            sqlx::query_scalar("SELECT profile_id FROM agent_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if has_profile.is_some() {
            return Err(AppError::BadRequest("Agent profile already exists".to_string()));
        }

        let url_taken: Option<i32> =
            sqlx::query_scalar("SELECT profile_id FROM agent_profiles WHERE public_url = $1")
                .bind(public_url)
                .fetch_optional(&mut *tx)
                .await?;
        if url_taken.is_some() {
            return Err(AppError::BadRequest("Public URL already taken".to_string()));
        }

        let profile = sqlx::query_as::<_, AgentProfile>(
            r#"
            INSERT INTO agent_profiles (user_id, public_url, bio, phone, specialization, profile_picture)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(public_url)
        .bind(&data.bio)
        .bind(&data.phone)
        .bind(&data.specialization)
        .bind(&data.profile_picture)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("✓ Agent profile {} created for user {}", public_url, user_id);
        Ok(profile)
    }

    pub async fn update(
        &self,
        user_id: i32,
        patch: &AgentProfilePatch,
    ) -> Result<Option<AgentProfile>, AppError> {
        let mut builder = build_update(patch, user_id, None)?;

        let profile = builder
            .build_query_as::<AgentProfile>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    /// Agent card behind an active public URL.
    pub async fn find_public(&self, public_url: &str) -> Result<Option<PublicAgent>, AppError> {
        let agent = sqlx::query_as::<_, PublicAgent>(
            r#"
            SELECT u.user_id, u.name, u.email, ap.bio, ap.phone,
                   COALESCE(ap.profile_picture, u.profile_picture) AS profile_picture,
                   ap.public_url
            FROM agent_profiles ap
            JOIN users u ON ap.user_id = u.user_id
            WHERE ap.public_url = $1 AND ap.is_active = TRUE AND u.is_active = TRUE
            "#,
        )
        .bind(public_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(agent)
    }
}
