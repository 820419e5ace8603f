use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use url::form_urlencoded;

use crate::auth::{dashboard_url, Role, SessionError, SessionKeys, SessionToken};
use crate::error::SessionRejected;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";

/// Where a navigation request stands with respect to its session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    Valid(SessionToken),
    Expired(SessionToken),
}

impl SessionState {
    pub fn valid_session(&self) -> Option<&SessionToken> {
        match self {
            SessionState::Valid(session) => Some(session),
            _ => None,
        }
    }
}

/// Classify a decoded (or absent) token at instant `now` (unix seconds).
pub fn classify(token: Option<SessionToken>, now: i64) -> SessionState {
    match token {
        None => SessionState::Unauthenticated,
        Some(session) if session.is_expired(now) => SessionState::Expired(session),
        Some(session) => SessionState::Valid(session),
    }
}

/// What part of the portal a path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// `/auth/login` and `/auth/register`
    AuthPage,
    /// Any other `/auth/*` path
    AuthOther,
    /// `/admin`, `/guru`, `/murid` and everything below them
    Section { role: Role, is_root: bool },
    /// Not matched by the guard at all
    Unguarded,
}

pub fn route_kind(path: &str) -> RouteKind {
    if path == LOGIN_PATH || path == REGISTER_PATH {
        return RouteKind::AuthPage;
    }

    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let (first, rest) = match trimmed.split_once('/') {
        Some((first, rest)) => (first, Some(rest)),
        None => (trimmed, None),
    };

    if first == "auth" {
        return RouteKind::AuthOther;
    }

    match first.parse::<Role>() {
        Ok(role) => RouteKind::Section {
            role,
            is_root: rest.map_or(true, str::is_empty),
        },
        Err(_) => RouteKind::Unguarded,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Next,
    Redirect(String),
}

/// `/auth/login?callbackUrl=<original>` with the original URL form-encoded
pub fn login_redirect(original_url: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("callbackUrl", original_url)
        .finish();
    format!("{}?{}", LOGIN_PATH, query)
}

/// Routing policy over an already classified request.
///
/// `original_url` is the path plus query the user asked for; it becomes the
/// login callback when the session is missing or expired.
pub fn route_decision(path: &str, original_url: &str, state: &SessionState) -> GuardDecision {
    match route_kind(path) {
        RouteKind::AuthPage => match state.valid_session() {
            Some(session) => GuardDecision::Redirect(dashboard_url(session.role()).to_string()),
            None => GuardDecision::Next,
        },
        RouteKind::Section { role: section, is_root } => {
            let Some(session) = state.valid_session() else {
                return GuardDecision::Redirect(login_redirect(original_url));
            };

            let role = session.role();
            if role != Some(section) {
                return GuardDecision::Redirect(dashboard_url(role).to_string());
            }

            if is_root {
                return GuardDecision::Redirect(section.dashboard_path().to_string());
            }

            GuardDecision::Next
        }
        RouteKind::AuthOther | RouteKind::Unguarded => GuardDecision::Next,
    }
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Session guard state shared by every request through the middleware
#[derive(Clone)]
pub struct SessionGuard {
    keys: SessionKeys,
    cookie_name: String,
    secure_cookies: bool,
    clock: Clock,
}

impl SessionGuard {
    pub fn new(keys: SessionKeys, cookie_name: impl Into<String>) -> Self {
        Self {
            keys,
            cookie_name: cookie_name.into(),
            secure_cookies: false,
            clock: Arc::new(|| Utc::now().timestamp()),
        }
    }

    pub fn from_config() -> Self {
        let security = &crate::config::config().security;
        Self::new(SessionKeys::from_config(), security.session_cookie.clone())
            .with_secure_cookies(security.secure_cookies)
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// Replace the wall clock, e.g. to pin `now` in tests
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// `Set-Cookie` value carrying `value` for `max_age` seconds
    pub fn session_cookie(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name, value, max_age
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Attach a cookie that expires the session immediately
    pub fn sign_out(&self, mut response: Response) -> Response {
        match HeaderValue::from_str(&self.session_cookie("", 0)) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Invalid session cookie name '{}': {}", self.cookie_name, e),
        }
        response
    }

    /// Undecodable tokens count as absent; only configuration problems are errors.
    pub fn classify_request(&self, headers: &HeaderMap) -> Result<SessionState, SessionError> {
        let Some(raw) = extract_session_token(headers, &self.cookie_name) else {
            return Ok(SessionState::Unauthenticated);
        };

        let token = match self.keys.decode(&raw) {
            Ok(token) => token,
            Err(SessionError::MissingSecret) => return Err(SessionError::MissingSecret),
            Err(e) => {
                tracing::debug!("Ignoring session token: {}", e);
                None
            }
        };

        Ok(classify(token, (self.clock)()))
    }
}

/// Session cookie first, then `Authorization: Bearer`
fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// Route middleware for `/auth/*`, `/admin/*`, `/guru/*` and `/murid/*`.
///
/// Passes valid sessions through with the `SessionToken` in request extensions;
/// any classification failure redirects to the login page. Form posts to the
/// auth pages are never bounced, so a signed-in user can sign in again. When a
/// section handler answers with a backend session rejection, the cookie is
/// cleared and the user is sent to sign in again.
pub async fn session_guard_middleware(
    State(guard): State<SessionGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let kind = route_kind(&path);
    let navigation = request.method() == Method::GET || request.method() == Method::HEAD;
    if kind == RouteKind::Unguarded || (kind == RouteKind::AuthPage && !navigation) {
        return next.run(request).await;
    }

    let original_url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let state = match guard.classify_request(request.headers()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Session guard error on {}: {}", path, e);
            return Redirect::temporary(LOGIN_PATH).into_response();
        }
    };

    match route_decision(&path, &original_url, &state) {
        GuardDecision::Next => {
            if let SessionState::Valid(session) = state {
                request.extensions_mut().insert(session);
            }
            let response = next.run(request).await;

            let in_section = matches!(kind, RouteKind::Section { .. });
            if in_section && response.extensions().get::<SessionRejected>().is_some() {
                tracing::warn!("Backend rejected the session on {}, signing out", original_url);
                return guard.sign_out(Redirect::to(&login_redirect(&original_url)).into_response());
            }
            response
        }
        GuardDecision::Redirect(location) => {
            tracing::debug!("Session guard redirect {} -> {}", original_url, location);
            Redirect::temporary(&location).into_response()
        }
    }
}
