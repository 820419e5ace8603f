pub mod response;
pub mod session_guard;

pub use response::{ApiResponse, ApiResult};
pub use session_guard::{
    classify, login_redirect, route_decision, route_kind, session_guard_middleware, GuardDecision,
    RouteKind, SessionGuard, SessionState, LOGIN_PATH, REGISTER_PATH,
};
