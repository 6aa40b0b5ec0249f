//! HTTP middleware stack for the portal.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with `request_id` field)
//! 3. Request ID (add unique ID to each request)
//! 4. CSP nonce (generate per-request nonce for inline scripts)
//! 5. Security headers (CSP with that nonce, frame and referrer policy)
//! 6. Session layer (tower-sessions, signed cookie)
//! 7. Rate limiting (governor, per route group)

pub mod auth;
pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    LOGIN_PATH, OptionalAuth, RequireAuth, RequireBroker, is_htmx, login_redirect, login_url,
    safe_redirect,
};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use rate_limit::{RateLimiterLayer, api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{
    SESSION_COOKIE_NAME, create_pool, create_session_layer, session_layer, signing_key,
};
