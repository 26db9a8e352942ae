//! Privileged user management.

use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{self, AuthUser, Role},
    config::BootstrapAdmin,
    error::{AppError, Result},
    models::{
        common::PaginationParams,
        user::{CreateUserRequest, ResetPasswordRequest, User, UserDeletion, UserProfile},
    },
    policy,
    store::{KpiLedger, RequestStore, UserDirectory},
};

pub async fn list_users(
    directory: &dyn UserDirectory,
    actor: &AuthUser,
    page: PaginationParams,
) -> Result<Vec<UserProfile>> {
    if !policy::can_view_users(actor.role) {
        return Err(AppError::Forbidden);
    }
    let users = directory.list(page).await?;
    Ok(users.into_iter().map(UserProfile::from).collect())
}

pub async fn create_user(
    directory: &dyn UserDirectory,
    actor: &AuthUser,
    req: CreateUserRequest,
) -> Result<UserProfile> {
    if !policy::can_manage_users(actor.role) {
        return Err(AppError::Forbidden);
    }
    req.validate()?;

    if directory.find_by_email(&req.email).await?.is_some() {
        return Err(AppError::Conflict(
            "A user with that email already exists".into(),
        ));
    }

    let user = insert_user(directory, req).await?;

    tracing::info!(user_id = %user.id, role = ?user.role, created_by = %actor.id, "User created");
    Ok(user.into())
}

pub async fn reset_password(
    directory: &dyn UserDirectory,
    actor: &AuthUser,
    target: Uuid,
    req: ResetPasswordRequest,
) -> Result<()> {
    if !policy::can_manage_users(actor.role) {
        return Err(AppError::Forbidden);
    }
    if actor.id == target {
        return Err(AppError::invalid(
            "user_id",
            "Use the account settings to change your own password",
        ));
    }
    req.validate()?;

    let hash = auth::hash_password(&req.new_password)?;
    if !directory.set_password_hash(target, &hash).await? {
        return Err(AppError::NotFound("User not found".into()));
    }

    tracing::info!(user_id = %target, reset_by = %actor.id, "Password reset");
    Ok(())
}

/// Deletes a user and everything this service holds for them.
pub async fn delete_user(
    directory: &dyn UserDirectory,
    requests: &dyn RequestStore,
    ledger: &dyn KpiLedger,
    actor: &AuthUser,
    target: Uuid,
) -> Result<UserDeletion> {
    if !policy::can_manage_users(actor.role) {
        return Err(AppError::Forbidden);
    }
    if actor.id == target {
        return Err(AppError::invalid(
            "user_id",
            "You cannot delete your own account",
        ));
    }
    if directory.get(target).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }

    let requests_deleted = requests.delete_by_owner(target).await?;
    let kpi_records_deleted = ledger.delete_user(target).await?;
    // A concurrent delete may have removed the row already; the cascade above still ran.
    if !directory.delete(target).await? {
        tracing::warn!(user_id = %target, "User vanished during delete");
    }

    tracing::info!(
        user_id = %target,
        deleted_by = %actor.id,
        requests_deleted,
        kpi_records_deleted,
        "User deleted"
    );

    Ok(UserDeletion {
        user_id: target,
        requests_deleted,
        kpi_records_deleted,
    })
}

/// Creates the configured admin account unless its email is already taken.
pub async fn ensure_bootstrap_admin(directory: &dyn UserDirectory, admin: &BootstrapAdmin) -> Result<()> {
    if directory.find_by_email(&admin.email).await?.is_some() {
        return Ok(());
    }

    let req = CreateUserRequest {
        name: admin.name.clone(),
        email: admin.email.clone(),
        department: admin.department.clone(),
        role: Role::Admin,
        password: admin.password.clone(),
    };
    req.validate()?;
    let user = insert_user(directory, req).await?;

    tracing::info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");
    Ok(())
}

async fn insert_user(directory: &dyn UserDirectory, req: CreateUserRequest) -> Result<User> {
    let user = User {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        department: req.department.trim().to_string(),
        role: req.role,
        password_hash: auth::hash_password(&req.password)?,
        is_active: true,
        created_at: OffsetDateTime::now_utc(),
    };
    directory.insert(&user).await?;
    Ok(user)
}
