//! HTTP transport and process bootstrap for the fsauth identity service.
//!
//! The router exposes the register / login / public lookup operations of
//! [`fsauth_core::AuthService`] as JSON endpoints; [`infra::startup`]
//! wires configuration, storage and keys into an [`AppState`].

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use infra::errors::{AppError, AppResult};
pub use routes::create_router;
