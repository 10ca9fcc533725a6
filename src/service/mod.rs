//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the stores, the GitHub client and the clock.

mod auth;

pub use auth::{AuthService, ClientInfo, LoginOutcome, Reissued};
