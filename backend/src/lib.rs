pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod services;
pub mod store;

use std::sync::Arc;

use sqlx::PgPool;

use store::{
    memory::{MemoryKpiLedger, MemoryRequestStore, MemoryUserDirectory},
    postgres::{PgKpiLedger, PgRequestStore, PgUserDirectory},
    KpiLedger, RequestStore, UserDirectory,
};

/// Shared application state available to all handlers via axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub requests: Arc<dyn RequestStore>,
    pub kpi: Arc<dyn KpiLedger>,
    pub users: Arc<dyn UserDirectory>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

impl AppState {
    pub fn postgres(pool: PgPool, jwt_secret: String, jwt_expiry_hours: u64) -> Self {
        Self {
            requests: Arc::new(PgRequestStore::new(pool.clone())),
            kpi: Arc::new(PgKpiLedger::new(pool.clone())),
            users: Arc::new(PgUserDirectory::new(pool)),
            jwt_secret,
            jwt_expiry_hours,
        }
    }

    /// State backed by process memory. Nothing survives a restart.
    pub fn in_memory(jwt_secret: String, jwt_expiry_hours: u64) -> Self {
        Self {
            requests: Arc::new(MemoryRequestStore::new()),
            kpi: Arc::new(MemoryKpiLedger::new()),
            users: Arc::new(MemoryUserDirectory::new()),
            jwt_secret,
            jwt_expiry_hours,
        }
    }
}
