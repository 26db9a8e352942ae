use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

pub const ON_TIME_POINTS: f64 = 1.0;
pub const LATE_POINTS: f64 = 0.5;

/// Ledger key. One record per user per department; a user working in several
/// departments has independent records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KpiKey {
    pub user_id: Uuid,
    pub department: String,
}

impl KpiKey {
    pub fn new(user_id: Uuid, department: impl Into<String>) -> Self {
        Self {
            user_id,
            department: department.into(),
        }
    }
}

impl fmt::Display for KpiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.user_id, self.department)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "award_timeliness", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Timeliness {
    OnTime,
    Late,
}

impl Timeliness {
    /// Completing exactly at the deadline counts as on time.
    pub fn of(deadline: OffsetDateTime, completed_at: OffsetDateTime) -> Self {
        if completed_at <= deadline {
            Timeliness::OnTime
        } else {
            Timeliness::Late
        }
    }

    pub fn points(self) -> f64 {
        match self {
            Timeliness::OnTime => ON_TIME_POINTS,
            Timeliness::Late => LATE_POINTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct KpiRecord {
    pub user_id: Uuid,
    pub user_name: String,
    pub department: String,
    pub tasks_assigned: i64,
    pub tasks_completed_on_time: i64,
    pub tasks_completed_late: i64,
    pub effective_points: f64,
    pub score: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Signed change applied to one ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KpiDelta {
    pub tasks_assigned: i64,
    pub on_time: i64,
    pub late: i64,
    pub points: f64,
}

impl KpiDelta {
    pub fn award(timeliness: Timeliness) -> Self {
        let (on_time, late) = match timeliness {
            Timeliness::OnTime => (1, 0),
            Timeliness::Late => (0, 1),
        };
        Self {
            tasks_assigned: 1,
            on_time,
            late,
            points: timeliness.points(),
        }
    }

    /// Reversal of every award in `entries`.
    pub fn reversal<'a>(entries: impl IntoIterator<Item = &'a AwardHistoryEntry>) -> Self {
        entries.into_iter().fold(Self::default(), |acc, entry| {
            let award = Self::award(entry.timeliness);
            Self {
                tasks_assigned: acc.tasks_assigned - award.tasks_assigned,
                on_time: acc.on_time - award.on_time,
                late: acc.late - award.late,
                points: acc.points - entry.points,
            }
        })
    }
}

impl KpiRecord {
    pub fn empty(key: &KpiKey, user_name: &str, now: OffsetDateTime) -> Self {
        Self {
            user_id: key.user_id,
            user_name: user_name.to_string(),
            department: key.department.clone(),
            tasks_assigned: 0,
            tasks_completed_on_time: 0,
            tasks_completed_late: 0,
            effective_points: 0.0,
            score: 0.0,
            updated_at: now,
        }
    }

    pub fn key(&self) -> KpiKey {
        KpiKey::new(self.user_id, self.department.clone())
    }

    /// Applies `delta` and recomputes the score. Counters never go below zero;
    /// returns `true` when a value had to be clamped.
    pub fn apply(&mut self, delta: KpiDelta, now: OffsetDateTime) -> bool {
        let mut clamped = false;
        let mut add = |value: &mut i64, by: i64| {
            let next = *value + by;
            if next < 0 {
                clamped = true;
                *value = 0;
            } else {
                *value = next;
            }
        };
        add(&mut self.tasks_assigned, delta.tasks_assigned);
        add(&mut self.tasks_completed_on_time, delta.on_time);
        add(&mut self.tasks_completed_late, delta.late);

        let points = self.effective_points + delta.points;
        if points < 0.0 {
            clamped = true;
            self.effective_points = 0.0;
        } else {
            self.effective_points = points;
        }

        self.score = score_of(self.effective_points, self.tasks_assigned);
        self.updated_at = now;
        clamped
    }
}

pub fn score_of(effective_points: f64, tasks_assigned: i64) -> f64 {
    if tasks_assigned > 0 {
        effective_points / tasks_assigned as f64 * 100.0
    } else {
        0.0
    }
}

/// Result of an atomic ledger update.
#[derive(Debug, Clone)]
pub struct AppliedDelta {
    pub record: KpiRecord,
    pub clamped: bool,
}

/// One assignee's share of one award event. Unique per (work unit, user, department).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AwardHistoryEntry {
    pub work_unit_id: String,
    pub work_unit_title: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub department: String,
    pub timeliness: Timeliness,
    pub points: f64,
    pub period_month: i32,
    pub period_year: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
    pub awarded_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub awarded_at: OffsetDateTime,
}

impl AwardHistoryEntry {
    pub fn key(&self) -> KpiKey {
        KpiKey::new(self.user_id, self.department.clone())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Assignee {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AwardPointsRequest {
    #[validate(length(min = 1, message = "work unit id is required"))]
    pub work_unit_id: String,
    #[validate(length(min = 1, message = "work unit title is required"))]
    pub work_unit_title: String,
    #[validate(length(min = 1, message = "department is required"))]
    pub department: String,
    #[validate(length(min = 1, message = "at least one assignee is required"))]
    pub assignees: Vec<Assignee>,
    #[validate(range(min = 1, max = 12, message = "month must be between 1 and 12"))]
    pub period_month: i32,
    #[validate(range(min = 2000, max = 9999, message = "year is out of range"))]
    pub period_year: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct AwardFailure {
    pub user_id: Uuid,
    pub department: String,
    pub error: String,
}

/// Outcome of a best-effort fan-out over several ledger keys.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AwardReport {
    pub work_unit_id: String,
    pub timeliness: Option<Timeliness>,
    pub updated: Vec<KpiRecord>,
    /// Assignees that already hold an award for this work unit.
    pub skipped: Vec<Uuid>,
    pub failed: Vec<AwardFailure>,
}

impl AwardReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub struct DepartmentQuery {
    pub department: Option<String>,
}
