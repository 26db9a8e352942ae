use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "app_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    #[serde(alias = "department_head")]
    Specialist,
    Viewer,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn is_reviewer(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user id
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Identity of the caller, re-read from the user directory on every request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: String,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let TypedHeader(bearer) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthenticated)?;

        let key = DecodingKey::from_secret(app_state.jwt_secret.as_bytes());
        let claims = decode::<Claims>(bearer.token(), &key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::warn!("JWT decode failed: {}", e);
                AppError::Unauthenticated
            })?
            .claims;

        // The token only proves who the caller was; role and status come from the directory.
        let user = app_state
            .users
            .get(claims.sub)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if !user.is_active {
            return Err(AppError::Unauthenticated);
        }

        Ok(AuthUser {
            id: user.id,
            name: user.name,
            email: user.email,
            department: user.department,
            role: user.role,
        })
    }
}

pub fn create_token(
    user_id: Uuid,
    role: Role,
    secret: &str,
    expiry_hours: u64,
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = OffsetDateTime::now_utc();
    let exp = now + time::Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: user_id,
        role,
        exp: exp.unix_timestamp(),
        iat: now.unix_timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid stored hash")))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::Unauthenticated)
}
