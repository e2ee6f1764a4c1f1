/// Middleware modules for the API server
///
/// - `security`: OWASP response headers, HSTS and CSP in production
/// - `rate_limit`: token-bucket limiting for the unauthenticated auth endpoints
///
/// Request ids come from `tower_http::request_id` and authentication from
/// `app::jwt_auth_layer`.

pub mod rate_limit;
pub mod security;
