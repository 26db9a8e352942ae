use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        common::PaginationParams,
        leave::{CreateLeaveRequest, LeaveRequest, ReviewDecision},
    },
    services::leave as engine,
    AppState,
};

/// Paged with `?limit=&offset=`, 100 rows by default.
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PaginationParams>,
) -> Result<Json<Vec<LeaveRequest>>> {
    let requests = engine::list_requests(state.requests.as_ref(), &auth, page).await?;
    Ok(Json(requests))
}

pub async fn get_one(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LeaveRequest>> {
    let request = engine::get_request(state.requests.as_ref(), &auth, id).await?;
    Ok(Json(request))
}

/// A missing or invalid token reaches the engine as `None` and is rejected there.
/// Directory failures while resolving the caller propagate unchanged.
pub async fn create(
    State(state): State<AppState>,
    auth: std::result::Result<AuthUser, AppError>,
    Json(body): Json<CreateLeaveRequest>,
) -> Result<(StatusCode, Json<LeaveRequest>)> {
    let requester = match auth {
        Ok(user) => Some(user),
        Err(AppError::Unauthenticated) => None,
        Err(e) => return Err(e),
    };
    let request = engine::create_request(state.requests.as_ref(), requester.as_ref(), body).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(decision): Json<ReviewDecision>,
) -> Result<Json<LeaveRequest>> {
    let request = engine::review_request(state.requests.as_ref(), &auth, id, decision).await?;
    Ok(Json(request))
}

pub async fn delete_one(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    engine::delete_request(state.requests.as_ref(), &auth, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
