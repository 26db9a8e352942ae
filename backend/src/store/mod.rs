//! Storage seams for the engines.
//!
//! The engines never reach a database directly; they receive one of these
//! handles. `memory` backs tests and the database-less dev mode, `postgres`
//! backs production.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        common::PaginationParams,
        kpi::{AppliedDelta, AwardHistoryEntry, KpiDelta, KpiKey, KpiRecord},
        leave::{LeaveRequest, ReviewState},
        user::User,
    },
};

/// Which requests a listing may return.
#[derive(Debug, Clone, Copy)]
pub struct RequestFilter {
    /// `None` lists every requester.
    pub owner: Option<Uuid>,
    pub page: PaginationParams,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: &LeaveRequest) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<LeaveRequest>>;

    /// Writes `review` only if the request is still pending. Returns the updated
    /// record, or `None` when no pending request with this id exists.
    async fn review_if_pending(&self, id: Uuid, review: &ReviewState) -> Result<Option<LeaveRequest>>;

    /// Returns `false` when the id is unknown.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Newest first.
    async fn list(&self, filter: RequestFilter) -> Result<Vec<LeaveRequest>>;

    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait KpiLedger: Send + Sync {
    /// Atomic read-modify-write of one record, creating it when absent.
    async fn apply(&self, key: &KpiKey, user_name: &str, delta: KpiDelta) -> Result<AppliedDelta>;

    async fn get(&self, key: &KpiKey) -> Result<Option<KpiRecord>>;

    async fn list_by_department(&self, department: &str) -> Result<Vec<KpiRecord>>;

    /// Records the award in the work unit's history and applies its points in
    /// one atomic step. Returns `None`, changing nothing, if this
    /// (work unit, user, department) was already awarded.
    async fn award(&self, entry: &AwardHistoryEntry) -> Result<Option<AppliedDelta>>;

    /// Deletes the history of one key for a work unit and reverses exactly the
    /// deleted entries, atomically. Returns `None` when nothing was recorded,
    /// e.g. because a concurrent reversal got there first.
    async fn revoke(&self, work_unit_id: &str, key: &KpiKey) -> Result<Option<AppliedDelta>>;

    async fn history_for(&self, work_unit_id: &str) -> Result<Vec<AwardHistoryEntry>>;

    /// Removes every record and history entry of a user, returning the record count.
    async fn delete_user(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn insert(&self, user: &User) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn list(&self, page: PaginationParams) -> Result<Vec<User>>;

    /// Returns `false` when the id is unknown.
    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<bool>;

    /// Returns `false` when the id is unknown.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}
