use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "request_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Leave,
    WorkFromHome,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

/// Review state of a request. Reviewer fields only exist once the request has
/// left `Pending`, and a rejection always carries its reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewState {
    Pending,
    Approved {
        reviewed_by: Uuid,
        reviewed_by_name: String,
        #[serde(with = "time::serde::rfc3339")]
        reviewed_at: OffsetDateTime,
    },
    Rejected {
        reviewed_by: Uuid,
        reviewed_by_name: String,
        #[serde(with = "time::serde::rfc3339")]
        reviewed_at: OffsetDateTime,
        rejection_reason: String,
    },
}

impl ReviewState {
    pub fn status(&self) -> RequestStatus {
        match self {
            ReviewState::Pending => RequestStatus::Pending,
            ReviewState::Approved { .. } => RequestStatus::Approved,
            ReviewState::Rejected { .. } => RequestStatus::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ReviewState::Pending)
    }

    pub fn reviewed_by(&self) -> Option<Uuid> {
        match self {
            ReviewState::Pending => None,
            ReviewState::Approved { reviewed_by, .. } | ReviewState::Rejected { reviewed_by, .. } => {
                Some(*reviewed_by)
            }
        }
    }
}

/// Leave or work-from-home request with the requester identity captured at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub department: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub selected_days: Vec<Date>,
    pub start_date: Date,
    pub end_date: Date,
    pub number_of_days: i64,
    pub reason: String,
    #[serde(flatten)]
    pub review: ReviewState,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
}

impl LeaveRequest {
    pub fn status(&self) -> RequestStatus {
        self.review.status()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeaveRequest {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    #[serde(default)]
    pub selected_days: Vec<Date>,
    pub number_of_days: i64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ReviewDecision {
    pub fn target_status(&self) -> RequestStatus {
        match self {
            ReviewDecision::Approve => RequestStatus::Approved,
            ReviewDecision::Reject { .. } => RequestStatus::Rejected,
        }
    }
}
