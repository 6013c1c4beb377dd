//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (storefront and CRM origins only)
//! 5. Rate limiting on `/api` (governor)
//!
//! Authentication is not a layer: handlers opt in with the [`RequireAuth`]
//! and [`RequireAdmin`] extractors.

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod request_id;

pub use auth::{RequireAdmin, RequireAuth};
pub use cors::cors_layer;
pub use rate_limit::{api_rate_limiter, rate_limit_response};
pub use request_id::request_id_middleware;
