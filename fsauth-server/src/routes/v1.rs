use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;
use crate::handlers::{auth, users};

pub const CREATE_USER: &str = "/v1/auth/users";
pub const LOGIN: &str = "/v1/auth/login";
pub const PUBLIC_LOGIN: &str = "/v1/auth/public";
pub const PUBLIC_USERS: &str = "/v1/users/public";

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route(CREATE_USER, post(auth::create_user))
        .route(LOGIN, post(auth::login))
        .route(PUBLIC_LOGIN, post(auth::public_login))
        .route(PUBLIC_USERS, get(users::list_public_users))
}
