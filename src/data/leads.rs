use sqlx::PgPool;
use std::collections::BTreeMap;

use crate::errors::AppError;
use crate::models::{Lead, LeadStatus, MessageRecipient, PageWindow};

/// Fields of a lead about to be captured.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub comments: Option<String>,
    pub property_id: Option<i32>,
    pub property_interested: String,
    pub source: &'static str,
    pub assigned_agent_id: Option<i32>,
    pub created_by: Option<i32>,
    /// Score computed at capture time from the lead and its email's interactions.
    pub lead_score: i32,
}

/// Splits a display name into `(first, last)`; the last name may be empty.
fn split_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Database storage for leads and their contact rows
pub struct LeadStorage {
    pool: PgPool,
}

impl LeadStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts the contact for the lead's email and inserts the lead, in one
    /// transaction. Re-submitting the same email updates the contact instead of
    /// duplicating it.
    pub async fn capture(&self, lead: &NewLead) -> Result<i32, AppError> {
        let display_name = lead.customer_name.split_whitespace().collect::<Vec<_>>().join(" ");
        let (first_name, last_name) = split_name(&display_name);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO contacts (email, first_name, last_name, display_name)
            VALUES (LOWER($1), $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                display_name = EXCLUDED.display_name,
                updated_at = NOW()
            "#,
        )
        .bind(&lead.email)
        .bind(&first_name)
        .bind(&last_name)
        .bind(&display_name)
        .execute(&mut *tx)
        .await?;

        let lead_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO leads (
                email, customer_name, phone, status, property_id, property_interested,
                lead_comments, source, assigned_agent_id, created_by, lead_score
            )
            VALUES ($1, $2, $3, 'new', $4, $5, $6, $7, $8, $9, $10)
            RETURNING lead_id
            "#,
        )
        .bind(&lead.email)
        .bind(&display_name)
        .bind(&lead.phone)
        .bind(lead.property_id)
        .bind(&lead.property_interested)
        .bind(&lead.comments)
        .bind(lead.source)
        .bind(lead.assigned_agent_id)
        .bind(lead.created_by)
        .bind(lead.lead_score)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "✓ Lead {} captured from {} ({}), score {}",
            lead_id,
            lead.email,
            lead.source,
            lead.lead_score
        );
        Ok(lead_id)
    }

    pub async fn list(&self, agent_id: Option<i32>) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT l.*, c.display_name AS contact_name
            FROM leads l
            LEFT JOIN contacts c ON c.email = LOWER(l.email)
            WHERE ($1::INT IS NULL OR l.assigned_agent_id = $1)
            ORDER BY l.created_date DESC
            "#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(leads)
    }

    pub async fn page(&self, window: PageWindow, agent_id: i32) -> Result<(Vec<Lead>, i64), AppError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE assigned_agent_id = $1")
                .bind(agent_id)
                .fetch_one(&self.pool)
                .await?;

        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT l.*, c.display_name AS contact_name
            FROM leads l
            LEFT JOIN contacts c ON c.email = LOWER(l.email)
            WHERE l.assigned_agent_id = $1
            ORDER BY l.created_date DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(agent_id)
        .bind(window.page_size)
        .bind(window.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((leads, total))
    }

    pub async fn get(&self, lead_id: i32) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            SELECT l.*, c.display_name AS contact_name
            FROM leads l
            LEFT JOIN contacts c ON c.email = LOWER(l.email)
            WHERE l.lead_id = $1
            "#,
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT l.*, c.display_name AS contact_name
            FROM leads l
            LEFT JOIN contacts c ON c.email = LOWER(l.email)
            WHERE LOWER(l.email) = LOWER($1)
            ORDER BY l.created_date DESC, l.lead_id DESC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(leads)
    }

    /// Sets the status and/or appends a note, in one transaction.
    pub async fn update_status(
        &self,
        lead_id: i32,
        status: Option<LeadStatus>,
        note: Option<&str>,
        author_id: i32,
    ) -> Result<Option<Lead>, AppError> {
        let mut tx = self.pool.begin().await?;

        let lead = match status {
            Some(status) => {
                sqlx::query_as::<_, Lead>(
                    "UPDATE leads SET status = $1, updated_at = NOW() WHERE lead_id = $2 RETURNING *",
                )
                .bind(status.as_str())
                .bind(lead_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, Lead>(
                    "UPDATE leads SET updated_at = NOW() WHERE lead_id = $1 RETURNING *",
                )
                .bind(lead_id)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let Some(lead) = lead else {
            return Ok(None);
        };

        if let Some(note) = note {
            sqlx::query("INSERT INTO lead_notes (lead_id, note, created_by) VALUES ($1, $2, $3)")
                .bind(lead_id)
                .bind(note)
                .bind(author_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Some(lead))
    }

    /// Deletes the given leads and returns the ids that existed.
    pub async fn delete_many(&self, lead_ids: &[i32]) -> Result<Vec<i32>, AppError> {
        let deleted: Vec<i32> =
            sqlx::query_scalar("DELETE FROM leads WHERE lead_id = ANY($1) RETURNING lead_id")
                .bind(lead_ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(deleted)
    }

    pub async fn recipients(&self, lead_ids: &[i32]) -> Result<Vec<MessageRecipient>, AppError> {
        let recipients = sqlx::query_as::<_, MessageRecipient>(
            "SELECT lead_id, customer_name, email, phone FROM leads WHERE lead_id = ANY($1) ORDER BY lead_id",
        )
        .bind(lead_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(recipients)
    }

    /// Persists recomputed scores in a single statement.
    pub async fn save_scores(&self, scores: &[(i32, i32)]) -> Result<u64, AppError> {
        if scores.is_empty() {
            return Ok(0);
        }

        let (ids, values): (Vec<i32>, Vec<i32>) = scores.iter().copied().unzip();
        let result = sqlx::query(
            r#"
            UPDATE leads SET lead_score = data.score, updated_at = NOW()
            FROM UNNEST($1::INT[], $2::INT[]) AS data(id, score)
            WHERE leads.lead_id = data.id
            "#,
        )
        .bind(&ids)
        .bind(&values)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// `(total, status breakdown, average score)`, optionally for one agent.
    pub async fn stats(
        &self,
        agent_id: Option<i32>,
    ) -> Result<(i64, BTreeMap<String, i64>, f64), AppError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) FROM leads
            WHERE ($1::INT IS NULL OR assigned_agent_id = $1)
            GROUP BY status
            "#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        let average: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(lead_score)::FLOAT8 FROM leads WHERE ($1::INT IS NULL OR assigned_agent_id = $1)",
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await?;

        let breakdown: BTreeMap<String, i64> = rows.into_iter().collect();
        let total = breakdown.values().sum();
        let average = (average.unwrap_or(0.0) * 10.0).round() / 10.0;

        Ok((total, breakdown, average))
    }

    /// `(total, pending)` lead counts, optionally for one agent.
    pub async fn counts(&self, agent_id: Option<i32>) -> Result<(i64, i64), AppError> {
        let (total, pending): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'new')
            FROM leads
            WHERE ($1::INT IS NULL OR assigned_agent_id = $1)
            "#,
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((total, pending))
    }
}

#[cfg(test)]
mod tests {
    use super::split_name;

    #[test]
    fn name_splits_on_first_whitespace() {
        assert_eq!(
            split_name("Mary Ann Smith"),
            ("Mary".to_string(), "Ann Smith".to_string())
        );
        assert_eq!(split_name("Cher"), ("Cher".to_string(), String::new()));
    }
}
