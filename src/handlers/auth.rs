// handlers/auth.rs - sign-in, sign-out and registration pages

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::api::RegisterRequest;
use crate::auth::{dashboard_url, Claims, Role, SessionUser};
use crate::config::SESSION_LIFETIME_SECS;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, LOGIN_PATH};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackQuery {
    pub callback_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    pub identifier: String,
    pub password: String,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivationForm {
    pub code: String,
}

/// Only same-origin paths are honoured as post-login destinations
fn safe_callback(callback: Option<&str>) -> Option<&str> {
    callback
        .map(str::trim)
        .filter(|c| c.starts_with('/') && !c.starts_with("//"))
}

fn post_login_destination(callback: Option<&str>, user: &SessionUser) -> String {
    match safe_callback(callback) {
        Some(path) => path.to_string(),
        None => dashboard_url(user.role()).to_string(),
    }
}

/// GET /auth/login
pub async fn login_page(Query(query): Query<CallbackQuery>) -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "page": "login",
        "callbackUrl": safe_callback(query.callback_url.as_deref()),
        "error": query.error,
    }))
}

/// POST /auth/login - authenticate against the backend and start a session
pub async fn login_post(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    Json(form): Json<LoginForm>,
) -> Result<Response, ApiError> {
    if form.identifier.trim().is_empty() || form.password.is_empty() {
        return Err(ApiError::bad_request("Identifier and password are required"));
    }

    let user = state
        .client
        .authorize(form.identifier.trim(), &form.password)
        .await
        .map_err(|e| match e {
            ApiError::Network(_) => e,
            other => {
                tracing::info!("Login rejected for '{}': {}", form.identifier, other);
                ApiError::unauthorized("Login failed")
            }
        })?;

    let token = state.guard.keys().encode(&Claims::new(user.clone())).map_err(|e| {
        tracing::error!("Failed to issue session: {}", e);
        ApiError::internal_server_error("Failed to start session")
    })?;

    let callback = form.callback_url.as_deref().or(query.callback_url.as_deref());
    let destination = post_login_destination(callback, &user);
    let cookie = state.guard.session_cookie(&token, SESSION_LIFETIME_SECS);

    tracing::info!("Session started for {} ({})", user.email, user.role);
    with_cookie(Redirect::to(&destination).into_response(), &cookie)
}

/// POST /auth/logout - drop the session cookie
pub async fn logout(State(state): State<AppState>) -> Response {
    state.guard.sign_out(Redirect::to(LOGIN_PATH).into_response())
}

fn with_cookie(mut response: Response, cookie: &str) -> Result<Response, ApiError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|_| ApiError::internal_server_error("Invalid session cookie"))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(response)
}

/// GET /auth/register
pub async fn register_page() -> ApiResponse<Value> {
    let roles: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
    ApiResponse::success(json!({ "page": "register", "roles": roles }))
}

/// POST /auth/register
pub async fn register_post(
    State(state): State<AppState>,
    Json(form): Json<RegisterRequest>,
) -> Result<Redirect, ApiError> {
    if form.password != form.confirm_password {
        return Err(ApiError::validation_error("Passwords do not match", None));
    }
    if form.role.parse::<Role>().is_err() {
        return Err(ApiError::bad_request(format!("Unknown role '{}'", form.role)));
    }

    state.client.register(&form).await?;
    Ok(Redirect::to("/auth/register/success"))
}

/// GET /auth/register/success
pub async fn register_success() -> ApiResponse<Value> {
    ApiResponse::success(json!({ "page": "register-success" }))
}

/// POST /auth/activation
pub async fn activation_post(
    State(state): State<AppState>,
    Json(form): Json<ActivationForm>,
) -> ApiResult<Value> {
    let result = state.client.activate(&form.code).await?;
    Ok(ApiResponse::success(json!({ "activated": true, "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> SessionUser {
        SessionUser {
            id: "u".to_string(),
            email: "u@sekolah.sch.id".to_string(),
            full_name: "U".to_string(),
            role: role.to_string(),
            access_token: None,
        }
    }

    #[test]
    fn callback_must_be_a_local_path() {
        assert_eq!(safe_callback(Some("/admin/dataguru?page=2")), Some("/admin/dataguru?page=2"));
        assert_eq!(safe_callback(Some("//evil.example.com")), None);
        assert_eq!(safe_callback(Some("https://evil.example.com")), None);
        assert_eq!(safe_callback(None), None);
    }

    #[test]
    fn destination_defaults_to_role_home() {
        assert_eq!(post_login_destination(None, &user("guru")), "/guru/dashboard");
        assert_eq!(post_login_destination(Some("/admin/datamurid"), &user("admin")), "/admin/datamurid");
        assert_eq!(post_login_destination(None, &user("tamu")), "/");
    }
}
