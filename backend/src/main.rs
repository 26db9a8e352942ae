use std::time::Duration;

use axum::http::{HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use officeflow_backend::{api, config, services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (dev convenience)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::from_env()?;

    // Tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let state = match &cfg.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(5))
                .connect(url)
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Database connected and migrations applied");

            AppState::postgres(pool, cfg.jwt_secret.clone(), cfg.jwt_expiry_hours)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores; data is lost on restart");
            AppState::in_memory(cfg.jwt_secret.clone(), cfg.jwt_expiry_hours)
        }
    };

    if let Some(admin) = &cfg.bootstrap_admin {
        services::admin::ensure_bootstrap_admin(state.users.as_ref(), admin)
            .await
            .map_err(|e| anyhow::anyhow!("bootstrap admin: {}", e))?;
    }

    // CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(
            cfg.cors_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        );

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(cors),
    );

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("Listening on {}", cfg.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
