use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use fsauth_core::service::{AuthPublicUserRequest, AuthUserRequest, CreateUserRequest};
use fsauth_core::{AuthStatus, IssuedToken};
use serde::{Deserialize, Serialize};

use super::observe;
use crate::AppState;
use crate::infra::errors::{AppError, AppResult};

/// Body shared by every token-returning operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub status: AuthStatus,
    pub token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenResponse {
    fn new(status: AuthStatus, token: Option<&IssuedToken>) -> Self {
        Self {
            status,
            token: token.map(|issued| issued.value.clone()),
            expires_at: token.map(|issued| issued.expires_at),
        }
    }
}

impl IntoResponse for TokenResponse {
    fn into_response(self) -> Response {
        (http_status(self.status), Json(self)).into_response()
    }
}

fn http_status(status: AuthStatus) -> StatusCode {
    match status {
        AuthStatus::Ok => StatusCode::OK,
        AuthStatus::AlreadyExists => StatusCode::CONFLICT,
        AuthStatus::NotFound => StatusCode::NOT_FOUND,
        AuthStatus::PasswordMismatch => StatusCode::UNAUTHORIZED,
        AuthStatus::NotPublic => StatusCode::FORBIDDEN,
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> AppResult<TokenResponse> {
    observe("create_user", async {
        let Json(request) = payload?;
        let ctx = state.call_context();
        let outcome = state.auth_service.create_user(&ctx, request).await?;
        Ok::<_, AppError>(TokenResponse::new(outcome.status(), outcome.token()))
    })
    .await
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<AuthUserRequest>, JsonRejection>,
) -> AppResult<TokenResponse> {
    observe("authenticate", async {
        let Json(request) = payload?;
        let ctx = state.call_context();
        let outcome = state.auth_service.authenticate(&ctx, request).await?;
        Ok::<_, AppError>(TokenResponse::new(outcome.status(), outcome.token()))
    })
    .await
}

pub async fn public_login(
    State(state): State<AppState>,
    payload: Result<Json<AuthPublicUserRequest>, JsonRejection>,
) -> AppResult<TokenResponse> {
    observe("authenticate_public", async {
        let Json(request) = payload?;
        let ctx = state.call_context();
        let outcome = state.auth_service.authenticate_public(&ctx, request).await?;
        Ok::<_, AppError>(TokenResponse::new(outcome.status(), outcome.token()))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_statuses_map_to_http() {
        assert_eq!(http_status(AuthStatus::Ok), StatusCode::OK);
        assert_eq!(http_status(AuthStatus::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(http_status(AuthStatus::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            http_status(AuthStatus::PasswordMismatch),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(http_status(AuthStatus::NotPublic), StatusCode::FORBIDDEN);
    }

    #[test]
    fn absent_token_serializes_as_null() {
        let body = serde_json::to_value(TokenResponse::new(AuthStatus::NotFound, None)).unwrap();
        assert_eq!(body["status"], "NOT_FOUND");
        assert!(body["token"].is_null());
        assert!(body["expires_at"].is_null());
    }
}
