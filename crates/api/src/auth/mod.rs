//! Authentication module for Offertedesk

pub mod jwt;
pub mod middleware;

pub use jwt::{JwtError, JwtManager, SupabaseClaims};
pub use middleware::{optional_auth, require_auth, AuthState, AuthUser};
