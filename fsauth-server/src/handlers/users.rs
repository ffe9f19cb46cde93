use axum::{Json, extract::State};
use fsauth_core::service::PublicIdentity;

use super::observe;
use crate::AppState;
use crate::infra::errors::{AppError, AppResult};

/// Users that opted into public lookup, without credentials.
pub async fn list_public_users(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PublicIdentity>>> {
    observe("list_public_users", async {
        let ctx = state.call_context();
        let users = state.auth_service.list_public_users(&ctx).await?;
        Ok::<_, AppError>(Json(users))
    })
    .await
}
