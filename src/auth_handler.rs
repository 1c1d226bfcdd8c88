use crate::auth::{determine_initial_role, AuthUser, Claims};
use crate::data::NewUser;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::identity::VerifiedIdentity;
use crate::models::{GoogleAuthRequest, LoginResponse, MessageResponse, MicrosoftAuthRequest};
use axum::{extract::State, Json};
use std::sync::Arc;

const UNKNOWN_USER: &str =
    "User not found. Please contact an administrator to create your account.";

/// Maps a verified provider identity onto a CRM user and issues a session.
async fn complete_login(
    state: &AppState,
    identity: VerifiedIdentity,
) -> Result<LoginResponse, AppError> {
    if !identity.email_verified {
        return Err(AppError::BadRequest("Email not verified".to_string()));
    }

    let users = state.users();
    let user = match users.find_by_email(&identity.email).await? {
        Some(existing) => {
            if !existing.is_active {
                tracing::warn!("Inactive user {} attempted login", existing.email);
                return Err(AppError::Forbidden("Account is disabled".to_string()));
            }
            users.record_login(existing.user_id).await?
        }
        None if state.config.allow_self_signup => {
            let existing_users = users.count().await?;
            let role =
                determine_initial_role(&identity.email, &state.config.admin_emails, existing_users);
            tracing::info!("Self-signup for {} as {}", identity.email, role);

            let created = users
                .create(&NewUser {
                    email: identity.email.clone(),
                    name: identity.name.clone(),
                    role,
                    profile_picture: identity.picture.clone(),
                    phone: None,
                    specialization: None,
                    bio: None,
                })
                .await?;
            users.record_login(created.user_id).await?
        }
        None => {
            tracing::warn!("Login attempt by unknown user {}", identity.email);
            return Err(AppError::Unauthorized(UNKNOWN_USER.to_string()));
        }
    };

    let access_token = state.sessions.issue(&user)?;
    tracing::info!("✓ {:?} login for user {}", identity.provider, user.user_id);

    Ok(LoginResponse {
        access_token,
        token_type: "bearer",
        user,
    })
}

/// POST /auth/google
///
/// Exchanges a Google ID token for a session token.
///
/// # Returns
///
/// * `Result<Json<LoginResponse>, AppError>` - The session token and user, or
///   401 for unknown users and rejected tokens.
pub async fn google_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GoogleAuthRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    tracing::info!("POST /auth/google");

    if request.id_token.trim().is_empty() {
        return Err(AppError::BadRequest("id_token is required".to_string()));
    }

    let identity = state.identity.verify_google(&request.id_token).await?;
    let response = complete_login(&state, identity).await?;
    Ok(Json(response))
}

/// POST /auth/microsoft
pub async fn microsoft_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MicrosoftAuthRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    tracing::info!("POST /auth/microsoft");

    if request.access_token.trim().is_empty() {
        return Err(AppError::BadRequest("access_token is required".to_string()));
    }

    let identity = state
        .identity
        .verify_microsoft(&request.access_token, Some(request.id_token.as_str()))
        .await?;
    let response = complete_login(&state, identity).await?;
    Ok(Json(response))
}

/// GET /auth/me
pub async fn me(AuthUser(claims): AuthUser) -> Json<Claims> {
    Json(claims)
}

/// POST /auth/logout
///
/// Session tokens are stateless; the client discards its copy.
pub async fn logout(AuthUser(claims): AuthUser) -> Json<MessageResponse> {
    tracing::info!("User {} logged out", claims.user_id);
    Json(MessageResponse::new("Successfully logged out"))
}
