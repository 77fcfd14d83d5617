//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 3. Request ID
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Principal loading (session principal into request extensions)
//! 6. Rate limiting on checkout and payment routes (governor)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{OptionalPrincipal, RequireAdmin, RequirePrincipal, load_principal};
pub use rate_limit::{checkout_rate_limiter, payment_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
