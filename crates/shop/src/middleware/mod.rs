//! HTTP middleware stack for the shop API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Rate limiting on login and registration (governor)
//!
//! Identity is resolved per handler through the extractors in [`identity`].

pub mod identity;
pub mod json;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use identity::{
    OptionalAuth, RequireAuth, RequireStaff, Requester, clear_current_user, pin_guest, pinned_guest,
    set_current_user, take_guest,
};
pub use json::ApiJson;
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
