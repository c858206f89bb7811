/// Middleware modules for the API server
///
/// - Security headers on every response
/// - Per-user rate limiting on write routes

pub mod rate_limit;
pub mod security;
