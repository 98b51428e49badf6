use axum::{extract::State, Json};
use billboard_protocol::UserListResponse;
use std::sync::Arc;

use crate::error::Result;
use crate::AppState;

/// Every account with its role. Mounted behind `authenticate` and `require_admin`.
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<UserListResponse>> {
    let users = state.auth.list_users().await?;
    Ok(Json(UserListResponse {
        success: true,
        data: users.iter().map(|u| u.profile()).collect(),
    }))
}
