pub mod auth;
pub mod kpi;
pub mod leave;
pub mod users;

use axum::{
    routing::{delete, get, patch, post},
    Json, Router,
};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        // Leave and work-from-home requests
        .route("/api/requests", get(leave::list).post(leave::create))
        .route("/api/requests/:id", get(leave::get_one).delete(leave::delete_one))
        .route("/api/requests/:id/review", patch(leave::review))
        // KPI
        .route("/api/kpi", get(kpi::list))
        .route("/api/kpi/awards", post(kpi::award))
        .route("/api/kpi/awards/:work_unit_id", delete(kpi::remove))
        // Users
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", delete(users::delete_one))
        .route("/api/users/:id/password", post(users::reset_password))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
