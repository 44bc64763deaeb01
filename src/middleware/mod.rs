/// Middleware module
///
/// Access token guard for the protected scopes.

mod jwt_middleware;

pub use jwt_middleware::JwtMiddleware;
