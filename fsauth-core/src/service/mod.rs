//! The auth orchestrator.
//!
//! Decides which lower-level failures are business outcomes (returned as
//! values with an [`AuthStatus`]) and which are internal errors
//! ([`AuthServiceError`]). Lower components never make that call.

mod auth_service;
mod context;
mod outcome;
/// Input checks run before any hashing or storage.
pub mod validation;

pub use auth_service::{AuthService, AuthServiceError};
pub use context::CallContext;
pub use outcome::{
    AuthPublicUserRequest, AuthStatus, AuthUserOutcome, AuthUserRequest,
    CreateUserOutcome, CreateUserRequest, PublicIdentity, PublicUserOutcome,
};
pub use validation::ValidationError;
