//! GitHub sign-in and session authentication
//!
//! Handles:
//! - Access tokens and refresh secrets
//! - Auth cookies
//! - GitHub OAuth client
//! - Auth gate for protected routes
//! - Auth endpoints and their rate limiting

pub mod cookies;
pub mod gate;
pub mod github;
mod locks;
pub mod middleware;
pub mod rate_limit;
mod routes;
pub mod secret;
pub mod token;

pub use cookies::CookiePolicy;
pub use gate::{AuthGate, Authorization};
pub use github::GitHubClient;
pub use rate_limit::RateLimiter;
pub use routes::auth_router;
pub use token::TokenIssuer;
