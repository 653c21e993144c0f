//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request span with `request_id` field)
//! 3. Request ID (record id in span, Sentry scope, response header)
//! 4. CORS
//! 5. Body limit
//! 6. Rate limiting on credential routes only (governor)
//!
//! Authentication is done per handler with the extractors in [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{CurrentAdmin, CurrentCustomer, RequireAdmin, RequireAdminWriter, RequireCustomer};
pub use rate_limit::{auth_rate_limiter, json_rate_limit_response};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
