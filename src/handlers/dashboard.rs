// handlers/dashboard.rs - role landing pages and the signed-in profile

use axum::{extract::State, response::Redirect, Extension, Json};
use serde_json::{json, Value};

use super::AppState;
use crate::api::PortalClient;
use crate::auth::{dashboard_url, SessionToken};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{Profile, ProfileUpdate};

/// Backend client acting as the session's user
pub(crate) fn client_for(state: &AppState, session: &SessionToken) -> Result<PortalClient, ApiError> {
    match session.access_token() {
        Some(token) => Ok(state.client.clone().with_access_token(token)),
        None => Err(ApiError::unauthorized("Session carries no backend token")),
    }
}

/// Reached only if the guard let a section root through
pub async fn section_root(Extension(session): Extension<SessionToken>) -> Redirect {
    Redirect::temporary(dashboard_url(session.role()))
}

pub async fn dashboard(Extension(session): Extension<SessionToken>) -> ApiResponse<Value> {
    let user = &session.user;
    ApiResponse::success(json!({
        "page": "dashboard",
        "user": {
            "id": user.id,
            "email": user.email,
            "fullName": user.full_name,
            "role": user.role,
        },
        "issuedAt": session.issued_at,
    }))
}

/// GET /admin/profile
pub async fn profile_get(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
) -> ApiResult<Profile> {
    let profile = client_for(&state, &session)?.profile().await?;
    Ok(ApiResponse::success(profile))
}

/// PUT /admin/profile
pub async fn profile_put(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Profile> {
    if update.full_name.trim().is_empty() || update.email.trim().is_empty() {
        return Err(ApiError::bad_request("Full name and email are required"));
    }
    let profile = client_for(&state, &session)?.update_profile(&update).await?;
    tracing::info!("Profile updated for {}", profile.email);
    Ok(ApiResponse::success(profile))
}
