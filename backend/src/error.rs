use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Invalid {
            field,
            message: message.into(),
        }
    }

    /// Machine-readable error kind returned alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "permission-denied",
            AppError::NotFound(_) => "not-found",
            AppError::Invalid { .. } | AppError::Validation(_) => "invalid-argument",
            AppError::InvalidState(_) => "failed-precondition",
            AppError::Conflict(_) => "conflict",
            AppError::Database(e) if is_unique_violation(e) => "conflict",
            AppError::Database(_) | AppError::Internal(_) => "internal",
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|c| c.as_ref() == "23505"),
        _ => false,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let kind = self.kind();
        let (status, message) = match &self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Invalid { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Validation(e) => {
                let messages: Vec<String> = e
                    .field_errors()
                    .into_iter()
                    .map(|(field, errors)| {
                        let msgs: Vec<&str> = errors
                            .iter()
                            .filter_map(|err| err.message.as_ref().map(|m| m.as_ref()))
                            .collect();
                        if msgs.is_empty() {
                            let codes: Vec<&str> =
                                errors.iter().map(|err| err.code.as_ref()).collect();
                            format!("{}: {}", field, codes.join(", "))
                        } else {
                            format!("{}: {}", field, msgs.join(", "))
                        }
                    })
                    .collect();
                (StatusCode::BAD_REQUEST, messages.join("; "))
            }
            AppError::Database(e) => {
                if is_unique_violation(e) {
                    tracing::warn!("Unique constraint violation: {}", e);
                    (
                        StatusCode::CONFLICT,
                        "A record with that value already exists".into(),
                    )
                } else {
                    tracing::error!("Database error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Database error".into())
                }
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
