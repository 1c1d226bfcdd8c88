use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;

use crate::errors::AppError;
use crate::models::{InteractionCount, InteractionRequest};

#[derive(Debug, FromRow)]
struct EmailInteractionCount {
    email: String,
    action_type: String,
    count: i64,
}

/// Database storage for tracked front-end interactions
pub struct InteractionStorage {
    pool: PgPool,
}

impl InteractionStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        event: &InteractionRequest,
        email: Option<&str>,
        occurred_at: DateTime<Utc>,
        engagement_score: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_interactions (
                session_id, action_type, element_id, page_url, property_id, property_label,
                phone, email, referrer, user_agent, occurred_at, engagement_score
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&event.session_id)
        .bind(&event.action)
        .bind(&event.element)
        .bind(&event.page)
        .bind(&event.property_id)
        .bind(&event.property_label)
        .bind(&event.phone)
        .bind(email)
        .bind(&event.referrer)
        .bind(&event.user_agent)
        .bind(occurred_at)
        .bind(engagement_score)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn counts_for_email(&self, email: &str) -> Result<Vec<InteractionCount>, AppError> {
        let counts = sqlx::query_as::<_, InteractionCount>(
            r#"
            SELECT action_type, COUNT(*) AS count
            FROM user_interactions
            WHERE email = LOWER($1)
            GROUP BY action_type
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }

    /// Interaction counts for many emails in one query, keyed by lower-cased email.
    pub async fn counts_for_emails(
        &self,
        emails: &[String],
    ) -> Result<HashMap<String, Vec<InteractionCount>>, AppError> {
        if emails.is_empty() {
            return Ok(HashMap::new());
        }

        let lowered: Vec<String> = emails.iter().map(|e| e.to_lowercase()).collect();
        let rows = sqlx::query_as::<_, EmailInteractionCount>(
            r#"
            SELECT email, action_type, COUNT(*) AS count
            FROM user_interactions
            WHERE email = ANY($1)
            GROUP BY email, action_type
            "#,
        )
        .bind(&lowered)
        .fetch_all(&self.pool)
        .await?;

        let mut by_email: HashMap<String, Vec<InteractionCount>> = HashMap::new();
        for row in rows {
            by_email.entry(row.email).or_default().push(InteractionCount {
                action_type: row.action_type,
                count: row.count,
            });
        }

        Ok(by_email)
    }
}
