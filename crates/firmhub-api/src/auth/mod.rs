pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod tokens;

pub use jwt::{IssuedToken, JwtService};
pub use middleware::{auth_middleware, optional_auth_middleware, AuthFailureLimiter, AuthState};
pub use models::{AdminUser, AuthUser, JwtClaims, MaybeUser};
