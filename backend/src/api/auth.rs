use axum::{extract::State, Json};

use crate::{
    auth::{create_token, verify_password, AuthUser},
    error::{AppError, Result},
    models::user::{LoginRequest, LoginResponse, UserProfile},
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    // Unknown, inactive and wrong-password logins all look the same to the caller.
    let user = state
        .users
        .find_by_email(req.email.trim())
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthenticated)?;

    verify_password(&req.password, &user.password_hash)?;

    let token = create_token(user.id, user.role, &state.jwt_secret, state.jwt_expiry_hours)
        .map_err(AppError::Internal)?;

    tracing::info!(user_id = %user.id, "Login");

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserProfile>> {
    let user = state
        .users
        .get(auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(user.into()))
}
