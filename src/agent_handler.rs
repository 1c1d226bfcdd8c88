use crate::admin_handler::{validate_new_property, validate_property_patch};
use crate::auth::AgentUser;
use crate::errors::AppError;
use crate::handlers::{capture_lead, AppState};
use crate::models::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

const AGENT_DEFAULT_PAGE_SIZE: i64 = 10;
const AGENT_MAX_PAGE_SIZE: i64 = 100;

// ============ Properties ============

/// GET /agent/properties
pub async fn list_properties(
    State(state): State<Arc<AppState>>,
    AgentUser(agent): AgentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PropertyPage>, AppError> {
    let window = query.window(AGENT_DEFAULT_PAGE_SIZE, AGENT_MAX_PAGE_SIZE)?;
    tracing::info!(
        "GET /agent/properties - agent {} page {} size {}",
        agent.user_id,
        window.page,
        window.page_size
    );

    let (properties, total_count) = state
        .properties()
        .page(window, Some(agent.user_id))
        .await?;

    Ok(Json(PropertyPage {
        properties,
        total_count,
        page: window.page,
        page_size: window.page_size,
    }))
}

/// POST /agent/properties
///
/// Agent listings start as `pending` until an admin activates them.
pub async fn create_property(
    State(state): State<Arc<AppState>>,
    AgentUser(agent): AgentUser,
    Json(data): Json<PropertyCreate>,
) -> Result<(StatusCode, Json<CreatedProperty>), AppError> {
    tracing::info!("POST /agent/properties - {} by agent {}", data.label, agent.user_id);
    validate_new_property(&data)?;

    let property_id = state
        .properties()
        .create(&data, "pending", Some(agent.user_id), agent.user_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedProperty {
            message: "Property created successfully".to_string(),
            property_id,
        }),
    ))
}

/// PUT /agent/properties/:id
pub async fn update_property(
    State(state): State<Arc<AppState>>,
    AgentUser(agent): AgentUser,
    Path(property_id): Path<i32>,
    Json(patch): Json<PropertyPatch>,
) -> Result<Json<Property>, AppError> {
    tracing::info!("PUT /agent/properties/{} - by agent {}", property_id, agent.user_id);
    validate_property_patch(&patch)?;

    let property = state
        .properties()
        .update(property_id, &patch, Some(agent.user_id))
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Property not found or not assigned to you".to_string())
        })?;

    Ok(Json(property))
}

// ============ Profile ============

/// GET /agent/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    AgentUser(agent): AgentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    match state.agent_profiles().get_by_user(agent.user_id).await? {
        Some(profile) => Ok(Json(json!(profile))),
        None => Ok(Json(json!({
            "message": "No profile found",
            "profile": null,
        }))),
    }
}

/// POST /agent/profile
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    AgentUser(agent): AgentUser,
    Json(data): Json<AgentProfileCreate>,
) -> Result<(StatusCode, Json<AgentProfile>), AppError> {
    tracing::info!("POST /agent/profile - {} by agent {}", data.public_url, agent.user_id);

    let public_url = data.public_url.trim();
    if public_url.is_empty()
        || !public_url
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::BadRequest(
            "Public URL may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }

    let profile = state.agent_profiles().create(agent.user_id, &data).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// PUT /agent/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AgentUser(agent): AgentUser,
    Json(patch): Json<AgentProfilePatch>,
) -> Result<Json<AgentProfile>, AppError> {
    tracing::info!("PUT /agent/profile - by agent {}", agent.user_id);

    let profile = state
        .agent_profiles()
        .update(agent.user_id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Agent profile not found".to_string()))?;

    Ok(Json(profile))
}

/// GET /agent/:public_url
///
/// Public agent page: the agent card and their active listings.
pub async fn public_page(
    State(state): State<Arc<AppState>>,
    Path(public_url): Path<String>,
) -> Result<Json<PublicAgentPage>, AppError> {
    tracing::info!("GET /agent/{}", public_url);

    let agent = state
        .agent_profiles()
        .find_public(&public_url)
        .await?
        .ok_or_else(|| AppError::NotFound("Agent not found".to_string()))?;

    let properties = state
        .properties()
        .list_active_for_agent(agent.user_id)
        .await?;

    Ok(Json(PublicAgentPage { agent, properties }))
}

// ============ Leads ============

/// GET /agent/leads
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    AgentUser(agent): AgentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<LeadPage>, AppError> {
    let window = query.window(AGENT_DEFAULT_PAGE_SIZE, AGENT_MAX_PAGE_SIZE)?;
    tracing::info!("GET /agent/leads - agent {} page {}", agent.user_id, window.page);

    let (leads, total_count) = state.leads().page(window, agent.user_id).await?;

    Ok(Json(LeadPage {
        leads,
        total_count,
        page: window.page,
        page_size: window.page_size,
    }))
}

/// POST /agent/leads
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    AgentUser(agent): AgentUser,
    Json(request): Json<EnquiryRequest>,
) -> Result<(StatusCode, Json<CreatedLead>), AppError> {
    tracing::info!("POST /agent/leads - {} by agent {}", request.email, agent.user_id);

    let lead_id = capture_lead(
        &state,
        request,
        "agent_created",
        Some(agent.user_id),
        Some(agent.user_id),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedLead {
            message: "Lead created successfully".to_string(),
            lead_id,
        }),
    ))
}

/// GET /agent/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    AgentUser(agent): AgentUser,
) -> Result<Json<AgentStats>, AppError> {
    let (total_properties, _) = state.properties().counts(Some(agent.user_id)).await?;
    let (total_leads, pending_leads) = state.leads().counts(Some(agent.user_id)).await?;

    Ok(Json(AgentStats::new(total_properties, total_leads, pending_leads)))
}
