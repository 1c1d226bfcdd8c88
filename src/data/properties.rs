use sqlx::PgPool;

use super::update::build_update;
use crate::errors::AppError;
use crate::models::{PageWindow, Property, PropertyCreate, PropertyPatch};

const PROPERTY_SELECT: &str = r#"
    SELECT p.*, u.name AS agent_name
    FROM properties p
    LEFT JOIN users u ON p.assigned_agent_id = u.user_id
"#;

/// Database storage for property listings
pub struct PropertyStorage {
    pool: PgPool,
}

impl PropertyStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All listings, or only those assigned to `agent_id` when given.
    pub async fn list(&self, agent_id: Option<i32>) -> Result<Vec<Property>, AppError> {
        let properties = sqlx::query_as::<_, Property>(&format!(
            "{} WHERE ($1::INT IS NULL OR p.assigned_agent_id = $1) ORDER BY p.created_at DESC",
            PROPERTY_SELECT
        ))
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(properties)
    }

    /// One page of listings plus the total row count.
    pub async fn page(
        &self,
        window: PageWindow,
        agent_id: Option<i32>,
    ) -> Result<(Vec<Property>, i64), AppError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM properties WHERE ($1::INT IS NULL OR assigned_agent_id = $1)",
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await?;

        let properties = sqlx::query_as::<_, Property>(&format!(
            "{} WHERE ($1::INT IS NULL OR p.assigned_agent_id = $1) \
             ORDER BY p.created_at DESC LIMIT $2 OFFSET $3",
            PROPERTY_SELECT
        ))
        .bind(agent_id)
        .bind(window.page_size)
        .bind(window.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((properties, total))
    }

    pub async fn get(&self, property_id: i32) -> Result<Option<Property>, AppError> {
        let property = sqlx::query_as::<_, Property>(&format!(
            "{} WHERE p.property_id = $1",
            PROPERTY_SELECT
        ))
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(property)
    }

    /// Active listings of one agent, for their public page.
    pub async fn list_active_for_agent(&self, agent_id: i32) -> Result<Vec<Property>, AppError> {
        let properties = sqlx::query_as::<_, Property>(&format!(
            "{} WHERE p.assigned_agent_id = $1 AND p.status = 'active' ORDER BY p.created_at DESC",
            PROPERTY_SELECT
        ))
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(properties)
    }

    /// Inserts a listing and returns its id.
    pub async fn create(
        &self,
        data: &PropertyCreate,
        status: &str,
        assigned_agent_id: Option<i32>,
        created_by: i32,
    ) -> Result<i32, AppError> {
        let property_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO properties (
                label, description, address, area, beds, baths, price,
                property_type, image_url, status, assigned_agent_id, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING property_id
            "#,
        )
        .bind(data.label.trim())
        .bind(&data.description)
        .bind(&data.address)
        .bind(&data.area)
        .bind(data.beds)
        .bind(data.baths)
        .bind(&data.price)
        .bind(&data.property_type)
        .bind(&data.image_url)
        .bind(status)
        .bind(assigned_agent_id)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("✓ Property {} created by user {}", property_id, created_by);
        Ok(property_id)
    }

    /// Applies a partial update; `agent_id` limits it to that agent's listings.
    ///
    /// Returns `None` when no matching row exists.
    pub async fn update(
        &self,
        property_id: i32,
        patch: &PropertyPatch,
        agent_id: Option<i32>,
    ) -> Result<Option<Property>, AppError> {
        let scope = agent_id.map(|id| ("assigned_agent_id", id));
        let mut builder = build_update(patch, property_id, scope)?;

        let property = builder
            .build_query_as::<Property>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(property)
    }

    pub async fn assign(&self, property_id: i32, agent_id: i32) -> Result<Option<Property>, AppError> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties SET assigned_agent_id = $1, updated_at = NOW()
            WHERE property_id = $2
            RETURNING *
            "#,
        )
        .bind(agent_id)
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(property)
    }

    /// Listing label, used to describe what a lead is interested in.
    pub async fn label_of(&self, property_id: i32) -> Result<Option<String>, AppError> {
        let label: Option<String> =
            sqlx::query_scalar("SELECT label FROM properties WHERE property_id = $1")
                .bind(property_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(label)
    }

    /// `(total, pending)` listing counts, optionally for one agent.
    pub async fn counts(&self, agent_id: Option<i32>) -> Result<(i64, i64), AppError> {
        let (total, pending): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'pending')
            FROM properties
            WHERE ($1::INT IS NULL OR assigned_agent_id = $1)
            "#,
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((total, pending))
    }
}
