//! Leave / work-from-home request lifecycle.
//!
//! `Pending` is the only non-terminal state. A reviewer moves a request to
//! `Approved` or `Rejected` exactly once; deletion is an admin-only side channel
//! available from any state.

use std::collections::BTreeSet;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        common::PaginationParams,
        leave::{CreateLeaveRequest, LeaveRequest, RequestStatus, ReviewDecision, ReviewState},
    },
    policy::{self, ListScope},
    store::{RequestFilter, RequestStore},
};

pub async fn create_request(
    store: &dyn RequestStore,
    requester: Option<&AuthUser>,
    input: CreateLeaveRequest,
) -> Result<LeaveRequest> {
    let requester = requester.ok_or(AppError::Unauthenticated)?;

    if input.number_of_days <= 0 {
        return Err(AppError::invalid(
            "number_of_days",
            "Number of days must be greater than 0",
        ));
    }

    let days: BTreeSet<_> = input.selected_days.into_iter().collect();
    let (Some(&start_date), Some(&end_date)) = (days.first(), days.last()) else {
        return Err(AppError::invalid(
            "selected_days",
            "Please select at least one day",
        ));
    };
    if days.len() as i64 != input.number_of_days {
        return Err(AppError::invalid(
            "selected_days",
            format!(
                "Please select exactly {} day(s), {} selected",
                input.number_of_days,
                days.len()
            ),
        ));
    }

    let reason = input.reason.trim();
    if reason.is_empty() {
        return Err(AppError::invalid("reason", "Reason is required"));
    }

    let selected_days: Vec<_> = days.into_iter().collect();
    let request = LeaveRequest {
        id: Uuid::new_v4(),
        user_id: requester.id,
        user_name: requester.name.clone(),
        user_email: requester.email.clone(),
        department: requester.department.clone(),
        kind: input.kind,
        number_of_days: selected_days.len() as i64,
        selected_days,
        start_date,
        end_date,
        reason: reason.to_string(),
        review: ReviewState::Pending,
        requested_at: OffsetDateTime::now_utc(),
    };

    store.insert(&request).await?;

    tracing::info!(
        request_id = %request.id,
        user_id = %request.user_id,
        kind = ?request.kind,
        days = request.number_of_days,
        "Leave request submitted"
    );

    Ok(request)
}

pub async fn review_request(
    store: &dyn RequestStore,
    reviewer: &AuthUser,
    id: Uuid,
    decision: ReviewDecision,
) -> Result<LeaveRequest> {
    let existing = store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Leave request {} not found", id)))?;

    let target = decision.target_status();
    let is_self = existing.user_id == reviewer.id;
    if !policy::can_transition(reviewer.role, RequestStatus::Pending, target, is_self) {
        tracing::warn!(request_id = %id, reviewer = %reviewer.id, role = ?reviewer.role, "Review denied");
        return Err(AppError::Forbidden);
    }

    if !existing.review.is_pending() {
        return Err(already_reviewed(&existing));
    }

    let reviewed_at = OffsetDateTime::now_utc();
    let review = match decision {
        ReviewDecision::Approve => ReviewState::Approved {
            reviewed_by: reviewer.id,
            reviewed_by_name: reviewer.name.clone(),
            reviewed_at,
        },
        ReviewDecision::Reject { reason } => {
            let reason = reason.as_deref().map(str::trim).unwrap_or_default();
            if reason.is_empty() {
                return Err(AppError::invalid(
                    "reason",
                    "A rejection reason is required",
                ));
            }
            ReviewState::Rejected {
                reviewed_by: reviewer.id,
                reviewed_by_name: reviewer.name.clone(),
                reviewed_at,
                rejection_reason: reason.to_string(),
            }
        }
    };

    match store.review_if_pending(id, &review).await? {
        Some(updated) => {
            tracing::info!(
                request_id = %id,
                reviewer = %reviewer.id,
                status = ?updated.status(),
                "Leave request reviewed"
            );
            Ok(updated)
        }
        // Another reviewer got there first, or the request was deleted meanwhile.
        None => match store.get(id).await? {
            Some(current) => Err(already_reviewed(&current)),
            None => Err(AppError::NotFound(format!("Leave request {} not found", id))),
        },
    }
}

fn already_reviewed(request: &LeaveRequest) -> AppError {
    AppError::InvalidState(format!(
        "Leave request {} has already been {}",
        request.id,
        request.status().as_str()
    ))
}

pub async fn delete_request(store: &dyn RequestStore, actor: &AuthUser, id: Uuid) -> Result<()> {
    if !policy::can_delete(actor.role) {
        tracing::warn!(request_id = %id, actor = %actor.id, "Delete denied");
        return Err(AppError::Forbidden);
    }

    if !store.delete(id).await? {
        return Err(AppError::NotFound(format!("Leave request {} not found", id)));
    }

    tracing::info!(request_id = %id, actor = %actor.id, "Leave request deleted");
    Ok(())
}

/// Newest first, one page at a time. `page` defaults to the first 100 rows;
/// callers walk further with `offset`.
pub async fn list_requests(
    store: &dyn RequestStore,
    actor: &AuthUser,
    page: PaginationParams,
) -> Result<Vec<LeaveRequest>> {
    let owner = match policy::can_list(actor.role) {
        ListScope::All => None,
        ListScope::Own => Some(actor.id),
    };
    store.list(RequestFilter { owner, page }).await
}

/// Requests outside the caller's scope are reported as missing.
pub async fn get_request(store: &dyn RequestStore, actor: &AuthUser, id: Uuid) -> Result<LeaveRequest> {
    let request = store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Leave request {} not found", id)))?;

    if policy::can_list(actor.role) == ListScope::Own && request.user_id != actor.id {
        return Err(AppError::NotFound(format!("Leave request {} not found", id)));
    }

    Ok(request)
}
