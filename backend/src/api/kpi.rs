use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    auth::AuthUser,
    error::Result,
    models::kpi::{AwardPointsRequest, AwardReport, DepartmentQuery, KpiRecord},
    services::kpi as engine,
    AppState,
};

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DepartmentQuery>,
) -> Result<Json<Vec<KpiRecord>>> {
    let records = engine::list_department(state.kpi.as_ref(), &auth, query.department.as_deref()).await?;
    Ok(Json(records))
}

/// Partial failures still answer 200; the report lists what did not apply.
pub async fn award(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AwardPointsRequest>,
) -> Result<Json<AwardReport>> {
    let report = engine::award_points(state.kpi.as_ref(), &auth, body).await?;
    Ok(Json(report))
}

pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(work_unit_id): Path<String>,
) -> Result<Json<AwardReport>> {
    let report = engine::remove_points(state.kpi.as_ref(), &auth, &work_unit_id).await?;
    Ok(Json(report))
}
