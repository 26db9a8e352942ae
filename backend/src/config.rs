use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string. When unset the service runs on in-memory stores.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub listen_addr: String,
    pub cors_origins: Vec<String>,
    pub log_json: bool,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Admin account created at start-up if no user with this email exists yet.
#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
    pub department: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters for security");
        }
        if jwt_secret.contains("change_me") {
            anyhow::bail!("JWT_SECRET contains a placeholder value, set a real secret before running");
        }

        let bootstrap_admin = match (
            std::env::var("BOOTSTRAP_ADMIN_EMAIL").ok(),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: std::env::var("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|_| "Administrator".into()),
                department: std::env::var("BOOTSTRAP_ADMIN_DEPARTMENT")
                    .unwrap_or_else(|_| "Management".into()),
            }),
            (None, None) => None,
            _ => anyhow::bail!(
                "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"
            ),
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            jwt_secret,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "12".into())
                .parse()
                .context("JWT_EXPIRY_HOURS must be a number")?,
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            log_json: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            bootstrap_admin,
        })
    }
}
