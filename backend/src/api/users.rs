use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::Result,
    models::{
        common::PaginationParams,
        user::{CreateUserRequest, ResetPasswordRequest, UserDeletion, UserProfile},
    },
    services::admin,
    AppState,
};

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PaginationParams>,
) -> Result<Json<Vec<UserProfile>>> {
    let users = admin::list_users(state.users.as_ref(), &auth, page).await?;
    Ok(Json(users))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    let profile = admin::create_user(state.users.as_ref(), &auth, body).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn reset_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    admin::reset_password(state.users.as_ref(), &auth, id, body).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn delete_one(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDeletion>> {
    let deletion = admin::delete_user(
        state.users.as_ref(),
        state.requests.as_ref(),
        state.kpi.as_ref(),
        &auth,
        id,
    )
    .await?;
    Ok(Json(deletion))
}
