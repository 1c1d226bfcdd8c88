use crate::auth::{AdminUser, AuthUser, MaybeAuthUser, SessionKeys};
use crate::config::Config;
use crate::data::{
    AgentProfileStorage, InteractionStorage, LeadStorage, NewLead, PropertyStorage, UserStorage,
};
use crate::errors::{AppError, ResultExt};
use crate::identity::IdentityVerifier;
use crate::models::*;
use crate::scoring::{engagement_score, score_new_lead, score_stored_lead};
use crate::validation::{is_valid_email, normalize_phone};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;

const GENERAL_INQUIRY: &str = "General Inquiry";

/// Shared application state injected into handlers.
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Session token signer/verifier.
    pub sessions: SessionKeys,
    /// OAuth provider verification (cached, circuit-broken).
    pub identity: IdentityVerifier,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Result<Self, AppError> {
        let sessions = SessionKeys::new(
            &config.jwt_secret,
            chrono::Duration::minutes(config.session_ttl_minutes),
        );
        let identity = IdentityVerifier::new(&config)?;

        Ok(Self {
            db,
            config,
            sessions,
            identity,
        })
    }

    pub fn users(&self) -> UserStorage {
        UserStorage::new(self.db.clone())
    }

    pub fn properties(&self) -> PropertyStorage {
        PropertyStorage::new(self.db.clone())
    }

    pub fn agent_profiles(&self) -> AgentProfileStorage {
        AgentProfileStorage::new(self.db.clone())
    }

    pub fn leads(&self) -> LeadStorage {
        LeadStorage::new(self.db.clone())
    }

    pub fn interactions(&self) -> InteractionStorage {
        InteractionStorage::new(self.db.clone())
    }
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "realty-crm-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Real Estate CRM API"))
}

/// Serves the OpenAPI specification YAML file from the working directory.
pub async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves the Swagger UI HTML page, loading `/api-docs/openapi.yml`.
pub async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Real Estate CRM API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

// ============ Properties ============

/// GET /properties
///
/// Public listing. Authenticated agents only see the listings assigned to them.
pub async fn list_properties(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(caller): MaybeAuthUser,
) -> Result<Json<Vec<Property>>, AppError> {
    let agent_scope = caller.as_ref().filter(|c| c.is_agent()).map(|c| c.user_id);
    tracing::info!("GET /properties - agent scope: {:?}", agent_scope);

    let properties = state.properties().list(agent_scope).await?;
    Ok(Json(properties))
}

/// GET /properties/:id
pub async fn get_property(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<i32>,
) -> Result<Json<Property>, AppError> {
    tracing::info!("GET /properties/{}", property_id);

    let property = state
        .properties()
        .get(property_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;

    Ok(Json(property))
}

// ============ Leads ============

/// Validates an enquiry and stores it as a lead with its contact row.
///
/// The lead is stored already scored, counting interactions its email made
/// before enquiring.
pub(crate) async fn capture_lead(
    state: &AppState,
    enquiry: EnquiryRequest,
    source: &'static str,
    assigned_agent_id: Option<i32>,
    created_by: Option<i32>,
) -> Result<i32, AppError> {
    let name = enquiry.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }

    let email = enquiry.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }

    let phone = enquiry
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| normalize_phone(p).unwrap_or_else(|| p.to_string()));

    let (property_id, property_interested) = match enquiry.property_id {
        Some(id) => match state.properties().label_of(id).await? {
            Some(label) => (Some(id), label),
            None => {
                tracing::warn!("Enquiry references unknown property {}", id);
                (None, GENERAL_INQUIRY.to_string())
            }
        },
        None => (None, GENERAL_INQUIRY.to_string()),
    };

    let comments = enquiry.message.filter(|m| !m.trim().is_empty());
    let counts = state.interactions().counts_for_email(&email).await?;
    let lead_score = score_new_lead(name, &email, comments.as_deref(), &counts);

    let lead = NewLead {
        customer_name: name.to_string(),
        email,
        phone,
        comments,
        property_id,
        property_interested,
        source,
        assigned_agent_id,
        created_by,
        lead_score,
    };

    state
        .leads()
        .capture(&lead)
        .await
        .with_context(|| format!("capturing {} lead for {}", source, lead.email))
}

/// POST /enquiry
///
/// Public enquiry form. A logged-in agent submitting it gets the lead assigned.
pub async fn submit_enquiry(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(caller): MaybeAuthUser,
    Json(enquiry): Json<EnquiryRequest>,
) -> Result<Json<CreatedLead>, AppError> {
    tracing::info!("POST /enquiry - from {}", enquiry.email);

    let assigned = caller.as_ref().filter(|c| c.is_agent()).map(|c| c.user_id);
    let created_by = caller.as_ref().map(|c| c.user_id);

    let lead_id = capture_lead(&state, enquiry, "website", assigned, created_by).await?;

    Ok(Json(CreatedLead {
        message: "Enquiry submitted successfully".to_string(),
        lead_id,
    }))
}

/// GET /leads
///
/// Recomputes every returned lead's score from its signals and its email's
/// interactions, persisting the scores that changed.
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(caller): MaybeAuthUser,
) -> Result<Json<Vec<Lead>>, AppError> {
    let agent_scope = caller.as_ref().filter(|c| c.is_agent()).map(|c| c.user_id);
    tracing::info!("GET /leads - agent scope: {:?}", agent_scope);

    let leads_storage = state.leads();
    let mut leads = leads_storage.list(agent_scope).await?;

    let emails: Vec<String> = leads
        .iter()
        .map(|l| l.email.to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let counts = state.interactions().counts_for_emails(&emails).await?;

    let mut changed = Vec::new();
    for lead in leads.iter_mut() {
        let lead_counts = counts
            .get(&lead.email.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let score = score_stored_lead(lead, lead_counts);
        if score != lead.lead_score {
            changed.push((lead.lead_id, score));
            lead.lead_score = score;
        }
    }

    if !changed.is_empty() {
        let updated = leads_storage.save_scores(&changed).await?;
        tracing::debug!("Persisted {} recomputed lead scores", updated);
    }

    Ok(Json(leads))
}

/// GET /leads/:id
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<i32>,
) -> Result<Json<Lead>, AppError> {
    tracing::info!("GET /leads/{}", lead_id);

    let lead = state
        .leads()
        .get(lead_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;

    Ok(Json(lead))
}

/// PUT /leads/:id/status
///
/// Agents may only touch leads assigned to them.
pub async fn update_lead_status(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(lead_id): Path<i32>,
    Json(update): Json<LeadStatusUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("PUT /leads/{}/status - by user {}", lead_id, caller.user_id);

    let status = update
        .status
        .as_deref()
        .map(str::parse::<LeadStatus>)
        .transpose()?;
    let notes = update.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());

    if status.is_none() && notes.is_none() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let leads = state.leads();
    let existing = leads
        .get(lead_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;

    if caller.is_agent() && existing.assigned_agent_id != Some(caller.user_id) {
        return Err(AppError::Forbidden(
            "You can only update leads assigned to you".to_string(),
        ));
    }

    let lead = leads
        .update_status(lead_id, status, notes, caller.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;

    Ok(Json(json!({
        "message": "Lead updated successfully",
        "lead": lead,
    })))
}

/// GET /leads/stats/summary
pub async fn lead_stats_summary(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(caller): MaybeAuthUser,
) -> Result<Json<LeadStatsSummary>, AppError> {
    let agent_scope = caller.as_ref().filter(|c| c.is_agent()).map(|c| c.user_id);
    tracing::info!("GET /leads/stats/summary - agent scope: {:?}", agent_scope);

    let (total_leads, status_breakdown, average_lead_score) =
        state.leads().stats(agent_scope).await?;

    Ok(Json(LeadStatsSummary {
        total_leads,
        status_breakdown,
        average_lead_score,
    }))
}

/// DELETE /leads/bulk-delete
pub async fn bulk_delete_leads(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, AppError> {
    tracing::info!(
        "DELETE /leads/bulk-delete - {} ids by admin {}",
        request.lead_ids.len(),
        admin.user_id
    );

    if request.lead_ids.is_empty() {
        return Err(AppError::BadRequest("No lead IDs provided".to_string()));
    }

    let deleted_ids = state.leads().delete_many(&request.lead_ids).await?;

    Ok(Json(BulkDeleteResponse {
        message: format!("Successfully deleted {} leads", deleted_ids.len()),
        deleted_count: deleted_ids.len() as u64,
        deleted_ids,
    }))
}

/// Replaces every `{{name}}` placeholder with the recipient's name.
pub fn personalize(template: &str, name: &str) -> String {
    template.replace("{{name}}", name)
}

/// POST /leads/send-message
///
/// Delivery is simulated: each message is personalised, logged and reported.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageReport>, AppError> {
    tracing::info!(
        "POST /leads/send-message - {:?} to {} recipients by user {}",
        request.channel,
        request.recipients.len(),
        caller.user_id
    );

    if request.recipients.is_empty() {
        return Err(AppError::BadRequest("No recipients specified".to_string()));
    }
    if request.body.trim().is_empty() {
        return Err(AppError::BadRequest("Message body is required".to_string()));
    }

    let recipients = state.leads().recipients(&request.recipients).await?;
    if recipients.is_empty() {
        return Err(AppError::BadRequest("No valid recipients found".to_string()));
    }

    let mut sent_messages = Vec::new();
    let mut failed_messages = Vec::new();

    for recipient in recipients {
        let to = match request.channel {
            MessageChannel::Email => Some(recipient.email.clone()),
            MessageChannel::Sms => recipient.phone.clone().filter(|p| !p.is_empty()),
        };

        let Some(to) = to else {
            failed_messages.push(FailedMessage {
                recipient_id: recipient.lead_id,
                recipient_name: recipient.customer_name,
                error: "No phone number on file".to_string(),
            });
            continue;
        };

        let message = SentMessage {
            recipient_id: recipient.lead_id,
            body: personalize(&request.body, &recipient.customer_name),
            subject: request
                .subject
                .as_deref()
                .map(|s| personalize(s, &recipient.customer_name)),
            recipient_name: recipient.customer_name,
            channel: request.channel,
            to,
            template: request.template.clone(),
            status: "sent",
            sent_at: Utc::now(),
        };
        tracing::info!(
            "Simulated {:?} delivery to lead {} at {}",
            message.channel,
            message.recipient_id,
            message.to
        );
        sent_messages.push(message);
    }

    Ok(Json(MessageReport {
        message: format!("Messages processed: {} sent", sent_messages.len()),
        sent_count: sent_messages.len(),
        failed_count: failed_messages.len(),
        sent_messages,
        failed_messages,
    }))
}

// ============ Interaction tracking ============

/// Parse timestamp string to DateTime<Utc>, falling back to now.
fn parse_timestamp(timestamp: Option<&str>) -> DateTime<Utc> {
    timestamp
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// POST /track-interaction
///
/// Stores the event; when it carries the email of a known lead, that email's
/// leads are re-scored and the newest lead's score is returned.
pub async fn track_interaction(
    State(state): State<Arc<AppState>>,
    Json(event): Json<InteractionRequest>,
) -> Result<Json<InteractionResponse>, AppError> {
    tracing::info!("POST /track-interaction - {} ({})", event.action, event.session_id);

    if event.session_id.trim().is_empty() || event.action.trim().is_empty() {
        return Err(AppError::BadRequest(
            "sessionId and action are required".to_string(),
        ));
    }

    let engagement = engagement_score(&event.action);
    let occurred_at = parse_timestamp(event.timestamp.as_deref());
    let email = event
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());

    let interactions = state.interactions();
    interactions
        .record(&event, email.as_deref(), occurred_at, engagement)
        .await?;

    let mut lead_score = None;
    if let Some(email) = email.as_deref() {
        let leads_storage = state.leads();
        let leads = leads_storage.find_by_email(email).await?;
        if !leads.is_empty() {
            let counts = interactions.counts_for_email(email).await?;
            let scores: Vec<(i32, i32)> = leads
                .iter()
                .map(|lead| (lead.lead_id, score_stored_lead(lead, &counts)))
                .collect();
            leads_storage.save_scores(&scores).await?;
            lead_score = scores.first().map(|(_, score)| *score);
            tracing::info!("Re-scored {} leads for {}", scores.len(), email);
        }
    }

    Ok(Json(InteractionResponse {
        message: "Interaction tracked successfully".to_string(),
        lead_score,
        engagement_score: engagement,
    }))
}
