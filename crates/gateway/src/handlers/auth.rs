use axum::{extract::State, Json};
use billboard_protocol::{
    ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest,
    LoginResponse, MessageResponse, RegisterRequest,
};
use std::sync::Arc;

use super::ApiJson;
use crate::error::Result;
use crate::AppState;

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<Json<MessageResponse>> {
    tracing::info!(
        "Registration attempt for {}",
        payload.username.as_deref().unwrap_or("<missing>")
    );
    state.auth.register(payload).await?;
    Ok(Json(MessageResponse::ok("User registered")))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let session = state.auth.login(payload).await?;
    Ok(Json(LoginResponse {
        success: true,
        token: session.token,
        user: session.user.profile(),
    }))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>> {
    let temp_password = state.auth.forgot_password(payload).await?;
    Ok(Json(ForgotPasswordResponse {
        success: true,
        message: "Password reset successfully".to_string(),
        temp_password,
    }))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state.auth.change_password(payload).await?;
    Ok(Json(MessageResponse::ok("Password changed successfully")))
}
