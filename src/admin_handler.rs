use crate::auth::AdminUser;
use crate::data::NewUser;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::*;
use crate::validation::{is_valid_email, normalize_phone};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use serde_json::json;
use std::sync::Arc;

const ADMIN_DEFAULT_PAGE_SIZE: i64 = 100;
const ADMIN_MAX_PAGE_SIZE: i64 = 1000;

/// Field checks shared by admin and agent property creation.
pub(crate) fn validate_new_property(data: &PropertyCreate) -> Result<(), AppError> {
    if data.label.trim().is_empty() {
        return Err(AppError::BadRequest("Property label is required".to_string()));
    }
    validate_numbers(data.price.as_ref(), data.beds, data.baths)
}

pub(crate) fn validate_property_patch(patch: &PropertyPatch) -> Result<(), AppError> {
    if patch.label.as_deref().is_some_and(|l| l.trim().is_empty()) {
        return Err(AppError::BadRequest("Property label cannot be empty".to_string()));
    }
    if patch.status.as_deref().is_some_and(|s| s.trim().is_empty()) {
        return Err(AppError::BadRequest("Property status cannot be empty".to_string()));
    }
    validate_numbers(patch.price.as_ref(), patch.beds, patch.baths)
}

fn validate_numbers(
    price: Option<&BigDecimal>,
    beds: Option<i32>,
    baths: Option<i32>,
) -> Result<(), AppError> {
    if price.is_some_and(|p| *p < BigDecimal::from(0)) {
        return Err(AppError::BadRequest("Price cannot be negative".to_string()));
    }
    if beds.is_some_and(|b| b < 0) || baths.is_some_and(|b| b < 0) {
        return Err(AppError::BadRequest(
            "Beds and baths cannot be negative".to_string(),
        ));
    }
    Ok(())
}

// ============ Users ============

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Vec<User>>, AppError> {
    tracing::info!("GET /admin/users - by admin {}", admin.user_id);

    let users = state.users().list().await?;
    Ok(Json(users))
}

/// POST /admin/users
///
/// Creates a user; agents also get a profile in the same transaction.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<CreateUserResponse>), AppError>` - 201 with the
///   new user, or 409 when the email is already registered.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    tracing::info!("POST /admin/users - {} by admin {}", request.email, admin.user_id);

    let email = request.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }

    let phone = request
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| normalize_phone(p).unwrap_or_else(|| p.to_string()));

    let user = state
        .users()
        .create(&NewUser {
            email,
            name: request.name,
            role: request.role.unwrap_or(Role::Agent),
            profile_picture: None,
            phone,
            specialization: request.specialization,
            bio: request.bio,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            message: "User created successfully".to_string(),
            user_id: user.user_id,
            email: user.email,
            name: user.name,
            role: user.role,
        }),
    ))
}

/// PUT /admin/users/:id/role
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i32>,
    Json(request): Json<RoleUpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("PUT /admin/users/{}/role - by admin {}", user_id, admin.user_id);

    let role: Role = request
        .role
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Role is required".to_string()))?
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid role. Must be 'admin' or 'agent'".to_string()))?;

    let user = state
        .users()
        .update_role(user_id, role)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "message": format!("User role updated to {}", role),
        "user": user,
    })))
}

// ============ Properties ============

/// GET /admin/properties?page&page_size
pub async fn list_properties(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PropertyPage>, AppError> {
    let window = query.window(ADMIN_DEFAULT_PAGE_SIZE, ADMIN_MAX_PAGE_SIZE)?;
    tracing::info!("GET /admin/properties - page {} size {}", window.page, window.page_size);

    let (properties, total_count) = state.properties().page(window, None).await?;

    Ok(Json(PropertyPage {
        properties,
        total_count,
        page: window.page,
        page_size: window.page_size,
    }))
}

/// POST /admin/properties
pub async fn create_property(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(data): Json<PropertyCreate>,
) -> Result<(StatusCode, Json<CreatedProperty>), AppError> {
    tracing::info!("POST /admin/properties - {} by admin {}", data.label, admin.user_id);
    validate_new_property(&data)?;

    let property_id = state
        .properties()
        .create(&data, "active", None, admin.user_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedProperty {
            message: "Property created successfully".to_string(),
            property_id,
        }),
    ))
}

/// PUT /admin/properties/:id
pub async fn update_property(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(property_id): Path<i32>,
    Json(patch): Json<PropertyPatch>,
) -> Result<Json<Property>, AppError> {
    tracing::info!("PUT /admin/properties/{} - by admin {}", property_id, admin.user_id);
    validate_property_patch(&patch)?;

    let property = state
        .properties()
        .update(property_id, &patch, None)
        .await?
        .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;

    Ok(Json(property))
}

/// POST /admin/properties/:id/assign
pub async fn assign_property(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(property_id): Path<i32>,
    Json(request): Json<AssignPropertyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let agent_id = request
        .agent_id
        .ok_or_else(|| AppError::BadRequest("agent_id is required".to_string()))?;
    tracing::info!(
        "POST /admin/properties/{}/assign - agent {} by admin {}",
        property_id,
        agent_id,
        admin.user_id
    );

    if !state.users().is_agent(agent_id).await? {
        return Err(AppError::NotFound("Agent not found".to_string()));
    }

    let property = state
        .properties()
        .assign(property_id, agent_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;

    Ok(Json(json!({
        "message": "Property assigned successfully",
        "property": property,
    })))
}

/// GET /admin/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<AdminStats>, AppError> {
    let (total_properties, pending_properties) = state.properties().counts(None).await?;
    let total_users = state.users().count().await?;
    let (total_leads, _) = state.leads().counts(None).await?;

    Ok(Json(AdminStats {
        total_properties,
        total_users,
        total_leads,
        pending_properties,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn listing(label: &str) -> PropertyCreate {
        PropertyCreate {
            label: label.to_string(),
            description: None,
            address: None,
            area: None,
            beds: Some(3),
            baths: Some(2),
            price: Some(BigDecimal::from_str("525000.00").unwrap()),
            property_type: Some("house".to_string()),
            image_url: None,
        }
    }

    #[test]
    fn new_property_requires_label() {
        assert!(validate_new_property(&listing("Maple Street cottage")).is_ok());
        assert!(validate_new_property(&listing("   ")).is_err());
    }

    #[test]
    fn negative_numbers_are_rejected() {
        let mut data = listing("Loft");
        data.price = Some(BigDecimal::from_str("-1").unwrap());
        assert!(validate_new_property(&data).is_err());

        let patch = PropertyPatch {
            beds: Some(-2),
            ..Default::default()
        };
        assert!(validate_property_patch(&patch).is_err());
    }
}
