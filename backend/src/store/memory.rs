//! Process-local stores. Used by the test-suite and when no `DATABASE_URL` is set.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{KpiLedger, RequestFilter, RequestStore, UserDirectory};
use crate::{
    error::{AppError, Result},
    models::{
        common::PaginationParams,
        kpi::{AppliedDelta, AwardHistoryEntry, KpiDelta, KpiKey, KpiRecord},
        leave::{LeaveRequest, ReviewState},
        user::User,
    },
};

fn paginate<T>(rows: Vec<T>, page: PaginationParams) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[derive(Default)]
pub struct MemoryRequestStore {
    rows: RwLock<HashMap<Uuid, LeaveRequest>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn insert(&self, request: &LeaveRequest) -> Result<()> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&request.id) {
            return Err(AppError::Conflict(format!(
                "Leave request {} already exists",
                request.id
            )));
        }
        rows.insert(request.id, request.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<LeaveRequest>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn review_if_pending(&self, id: Uuid, review: &ReviewState) -> Result<Option<LeaveRequest>> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(row) if row.review.is_pending() => {
                row.review = review.clone();
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }

    async fn list(&self, filter: RequestFilter) -> Result<Vec<LeaveRequest>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<LeaveRequest> = rows
            .values()
            .filter(|r| filter.owner.map_or(true, |owner| r.user_id == owner))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(paginate(matching, filter.page))
    }

    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, r| r.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
struct LedgerState {
    records: HashMap<KpiKey, KpiRecord>,
    history: HashMap<String, Vec<AwardHistoryEntry>>,
}

/// Every ledger operation runs under one lock, which makes `apply` an atomic
/// read-modify-write per key.
#[derive(Default)]
pub struct MemoryKpiLedger {
    state: Mutex<LedgerState>,
}

impl MemoryKpiLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerState {
    fn apply(&mut self, key: &KpiKey, user_name: &str, delta: KpiDelta) -> AppliedDelta {
        let now = OffsetDateTime::now_utc();
        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| KpiRecord::empty(key, user_name, now));
        record.user_name = user_name.to_string();
        let clamped = record.apply(delta, now);
        AppliedDelta {
            record: record.clone(),
            clamped,
        }
    }
}

#[async_trait]
impl KpiLedger for MemoryKpiLedger {
    async fn apply(&self, key: &KpiKey, user_name: &str, delta: KpiDelta) -> Result<AppliedDelta> {
        Ok(self.state.lock().await.apply(key, user_name, delta))
    }

    async fn get(&self, key: &KpiKey) -> Result<Option<KpiRecord>> {
        Ok(self.state.lock().await.records.get(key).cloned())
    }

    async fn list_by_department(&self, department: &str) -> Result<Vec<KpiRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<KpiRecord> = state
            .records
            .values()
            .filter(|r| r.department == department)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.user_name.cmp(&b.user_name).then_with(|| a.user_id.cmp(&b.user_id)));
        Ok(records)
    }

    async fn award(&self, entry: &AwardHistoryEntry) -> Result<Option<AppliedDelta>> {
        let mut state = self.state.lock().await;
        let key = entry.key();
        let entries = state.history.entry(entry.work_unit_id.clone()).or_default();
        if entries.iter().any(|e| e.key() == key) {
            return Ok(None);
        }
        entries.push(entry.clone());
        Ok(Some(state.apply(&key, &entry.user_name, KpiDelta::award(entry.timeliness))))
    }

    async fn revoke(&self, work_unit_id: &str, key: &KpiKey) -> Result<Option<AppliedDelta>> {
        let mut state = self.state.lock().await;
        let Some(entries) = state.history.get_mut(work_unit_id) else {
            return Ok(None);
        };
        let (removed, kept): (Vec<_>, Vec<_>) = entries.drain(..).partition(|e| &e.key() == key);
        if kept.is_empty() {
            state.history.remove(work_unit_id);
        } else {
            *entries = kept;
        }

        let Some(first) = removed.first() else {
            return Ok(None);
        };
        let user_name = first.user_name.clone();
        Ok(Some(state.apply(key, &user_name, KpiDelta::reversal(&removed))))
    }

    async fn history_for(&self, work_unit_id: &str) -> Result<Vec<AwardHistoryEntry>> {
        Ok(self
            .state
            .lock()
            .await
            .history
            .get(work_unit_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<u64> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let before = state.records.len();
        state.records.retain(|k, _| k.user_id != user_id);
        let removed = (before - state.records.len()) as u64;
        for entries in state.history.values_mut() {
            entries.retain(|e| e.user_id != user_id);
        }
        state.history.retain(|_, entries| !entries.is_empty());
        Ok(removed)
    }
}

#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn insert(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict(
                "A user with that email already exists".into(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self, page: PaginationParams) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(users, page))
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<bool> {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.password_hash = hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}
