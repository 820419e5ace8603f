// Backend/API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Error raised by a backend call, carrying a human-readable message
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<BTreeMap<String, Vec<String>>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (backend answered with something unexpected)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // No response at all (connect failure, timeout)
    Network(String),

    // 2xx but the payload did not have the expected shape
    InvalidResponse(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Network(_) => 503,
            ApiError::InvalidResponse(_) => 502,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Network(msg) => msg,
            ApiError::InvalidResponse(msg) => msg,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Network(_) => "NETWORK_ERROR",
            ApiError::InvalidResponse(_) => "INVALID_RESPONSE",
        }
    }

    /// True when the backend rejected the session itself (expired or revoked token)
    pub fn is_session_rejection(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::Forbidden(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<BTreeMap<String, Vec<String>>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        ApiError::Network(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        ApiError::InvalidResponse(message.into())
    }

    /// Build an error from a non-2xx backend response.
    ///
    /// Field errors under `meta.errors` win and are flattened into one message,
    /// then status-specific handling, then the body's `message`, then `fallback`.
    pub fn from_response(status: u16, body: &Value, fallback: &str) -> Self {
        if let Some(field_errors) = meta_field_errors(body) {
            let message = field_errors
                .values()
                .flatten()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            return ApiError::ValidationError {
                message,
                field_errors: Some(field_errors),
            };
        }

        let body_message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string);
        let message = body_message.unwrap_or_else(|| fallback.to_string());

        match status {
            400 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            500 => ApiError::InternalServerError(message),
            503 => ApiError::ServiceUnavailable(message),
            _ => ApiError::BadGateway(message),
        }
    }
}

/// `meta.errors` is an object of field -> message or field -> [messages]
fn meta_field_errors(body: &Value) -> Option<BTreeMap<String, Vec<String>>> {
    let errors = body.get("meta")?.get("errors")?.as_object()?;
    let mut out = BTreeMap::new();
    for (field, value) in errors {
        let messages = match value {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            other => vec![other.to_string()],
        };
        out.insert(field.clone(), messages);
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            tracing::error!("Backend payload decode error: {}", err);
            ApiError::invalid_response("Malformed response from server")
        } else if err.is_timeout() {
            ApiError::network("Request timed out")
        } else {
            tracing::error!("Network error: {}", err);
            ApiError::network("Unable to reach server")
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

/// Response extension marking a backend 401/403; the session guard signs
/// the user out when it sees one on a section page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRejected;

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let rejected = self.is_session_rejection();
        let mut response = (status, Json(self.to_json())).into_response();
        if rejected {
            response.extensions_mut().insert(SessionRejected);
        }
        response
    }
}
