// handlers/mod.rs - portal web tier
//
// Auth pages (/auth/*) are reachable without a session; the role sections
// (/admin/*, /guru/*, /murid/*) sit behind the session guard, which also
// bounces signed-in users away from the login and register pages.

pub mod auth;
pub mod dashboard;
pub mod resources;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::api::PortalClient;
use crate::middleware::{session_guard_middleware, ApiResponse, SessionGuard};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub client: PortalClient,
    pub guard: SessionGuard,
}

impl AppState {
    pub fn new(client: PortalClient, guard: SessionGuard) -> Self {
        Self { client, guard }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        // Auth pages
        .route("/auth/login", get(auth::login_page).post(auth::login_post))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/register", get(auth::register_page).post(auth::register_post))
        .route("/auth/register/success", get(auth::register_success))
        .route("/auth/activation", post(auth::activation_post))
        // Role sections; the bare section roots exist so the guard sees them
        .route("/admin", get(dashboard::section_root))
        .route("/guru", get(dashboard::section_root))
        .route("/murid", get(dashboard::section_root))
        .route("/admin/dashboard", get(dashboard::dashboard))
        .route("/guru/dashboard", get(dashboard::dashboard))
        .route("/murid/dashboard", get(dashboard::dashboard))
        .route("/admin/profile", get(dashboard::profile_get).put(dashboard::profile_put))
        .route("/admin/:page", get(resources::list).post(resources::create))
        .route("/admin/:page/:id", put(resources::update).delete(resources::delete))
        .layer(from_fn_with_state(state.guard.clone(), session_guard_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "sekolah-portal",
        "version": env!("CARGO_PKG_VERSION"),
        "sections": ["/admin", "/guru", "/murid"]
    }))
}

async fn health() -> ApiResponse<Value> {
    ApiResponse::success(json!({ "status": "ok" }))
}
