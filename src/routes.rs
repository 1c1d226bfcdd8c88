use crate::handlers::{self, AppState};
use crate::{admin_handler, agent_handler, auth_handler};
use axum::{
    http::{request::Parts, HeaderValue},
    routing::{delete, get, post, put},
    Router,
};
use regex::Regex;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Every route except `/health`. Callers add rate limiting and body limits.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::root))
        // API Documentation
        .route("/docs", get(handlers::serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(handlers::serve_openapi_spec))
        // Authentication
        .route("/auth/google", post(auth_handler::google_login))
        .route("/auth/microsoft", post(auth_handler::microsoft_login))
        .route("/auth/me", get(auth_handler::me))
        .route("/auth/logout", post(auth_handler::logout))
        // Admin
        .route(
            "/admin/users",
            get(admin_handler::list_users).post(admin_handler::create_user),
        )
        .route("/admin/users/:id/role", put(admin_handler::update_user_role))
        .route(
            "/admin/properties",
            get(admin_handler::list_properties).post(admin_handler::create_property),
        )
        .route("/admin/properties/:id", put(admin_handler::update_property))
        .route(
            "/admin/properties/:id/assign",
            post(admin_handler::assign_property),
        )
        .route("/admin/stats", get(admin_handler::stats))
        // Agent
        .route(
            "/agent/properties",
            get(agent_handler::list_properties).post(agent_handler::create_property),
        )
        .route("/agent/properties/:id", put(agent_handler::update_property))
        .route(
            "/agent/profile",
            get(agent_handler::get_profile)
                .post(agent_handler::create_profile)
                .put(agent_handler::update_profile),
        )
        .route(
            "/agent/leads",
            get(agent_handler::list_leads).post(agent_handler::create_lead),
        )
        .route("/agent/stats", get(agent_handler::stats))
        .route("/agent/:public_url", get(agent_handler::public_page))
        // Public properties
        .route("/properties", get(handlers::list_properties))
        .route("/properties/:id", get(handlers::get_property))
        // Leads
        .route("/enquiry", post(handlers::submit_enquiry))
        .route("/leads", get(handlers::list_leads))
        .route("/leads/stats/summary", get(handlers::lead_stats_summary))
        .route("/leads/bulk-delete", delete(handlers::bulk_delete_leads))
        .route("/leads/send-message", post(handlers::send_message))
        .route("/leads/:id", get(handlers::get_lead))
        .route("/leads/:id/status", put(handlers::update_lead_status))
        // Interaction tracking
        .route("/track-interaction", post(handlers::track_interaction))
}

/// Credentialed CORS for origins matching `origin`.
pub fn cors_layer(origin: &Regex) -> CorsLayer {
    let origin = origin.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |value: &HeaderValue, _parts: &Parts| {
                value.to_str().map(|o| origin.is_match(o)).unwrap_or(false)
            },
        ))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Final app: `/health` (never rate limited) merged with `api`, plus tracing and CORS.
pub fn app(state: Arc<AppState>, api: Router<Arc<AppState>>) -> Router {
    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
