//! Postgres-backed stores. Schema lives in `backend/migrations`.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{KpiLedger, RequestFilter, RequestStore, UserDirectory};
use crate::{
    error::{AppError, Result},
    models::{
        common::PaginationParams,
        kpi::{AppliedDelta, AwardHistoryEntry, KpiDelta, KpiKey, KpiRecord},
        leave::{LeaveRequest, RequestKind, RequestStatus, ReviewState},
        user::User,
    },
};

const REQUEST_COLUMNS: &str = r#"
    id, user_id, user_name, user_email, department, kind, selected_days,
    start_date, end_date, number_of_days, reason, status,
    reviewed_by, reviewed_by_name, reviewed_at, rejection_reason, requested_at
"#;

/// Flat row; converted into the tagged review state on the way out.
#[derive(sqlx::FromRow)]
struct LeaveRequestRow {
    id: Uuid,
    user_id: Uuid,
    user_name: String,
    user_email: String,
    department: String,
    kind: RequestKind,
    selected_days: Vec<Date>,
    start_date: Date,
    end_date: Date,
    number_of_days: i64,
    reason: String,
    status: RequestStatus,
    reviewed_by: Option<Uuid>,
    reviewed_by_name: Option<String>,
    reviewed_at: Option<OffsetDateTime>,
    rejection_reason: Option<String>,
    requested_at: OffsetDateTime,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = AppError;

    fn try_from(r: LeaveRequestRow) -> Result<Self> {
        let review = match (
            r.status,
            r.reviewed_by,
            r.reviewed_by_name,
            r.reviewed_at,
            r.rejection_reason,
        ) {
            (RequestStatus::Pending, None, None, None, None) => ReviewState::Pending,
            (RequestStatus::Approved, Some(by), Some(name), Some(at), None) => ReviewState::Approved {
                reviewed_by: by,
                reviewed_by_name: name,
                reviewed_at: at,
            },
            (RequestStatus::Rejected, Some(by), Some(name), Some(at), Some(reason))
                if !reason.trim().is_empty() =>
            {
                ReviewState::Rejected {
                    reviewed_by: by,
                    reviewed_by_name: name,
                    reviewed_at: at,
                    rejection_reason: reason,
                }
            }
            (status, ..) => {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "Leave request {} has inconsistent review fields for status {:?}",
                    r.id,
                    status
                )))
            }
        };

        Ok(LeaveRequest {
            id: r.id,
            user_id: r.user_id,
            user_name: r.user_name,
            user_email: r.user_email,
            department: r.department,
            kind: r.kind,
            selected_days: r.selected_days,
            start_date: r.start_date,
            end_date: r.end_date,
            number_of_days: r.number_of_days,
            reason: r.reason,
            review,
            requested_at: r.requested_at,
        })
    }
}

pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn insert(&self, r: &LeaveRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leave_requests (id, user_id, user_name, user_email, department, kind,
                                        selected_days, start_date, end_date, number_of_days,
                                        reason, status, requested_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', $12)
            "#,
        )
        .bind(r.id)
        .bind(r.user_id)
        .bind(&r.user_name)
        .bind(&r.user_email)
        .bind(&r.department)
        .bind(r.kind)
        .bind(&r.selected_days)
        .bind(r.start_date)
        .bind(r.end_date)
        .bind(r.number_of_days)
        .bind(&r.reason)
        .bind(r.requested_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<LeaveRequest>> {
        let row = sqlx::query_as::<_, LeaveRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LeaveRequest::try_from).transpose()
    }

    async fn review_if_pending(&self, id: Uuid, review: &ReviewState) -> Result<Option<LeaveRequest>> {
        let (by, name, at, reason) = match review {
            ReviewState::Pending => {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "Refusing to write a pending review for {}",
                    id
                )))
            }
            ReviewState::Approved {
                reviewed_by,
                reviewed_by_name,
                reviewed_at,
            } => (*reviewed_by, reviewed_by_name.as_str(), *reviewed_at, None),
            ReviewState::Rejected {
                reviewed_by,
                reviewed_by_name,
                reviewed_at,
                rejection_reason,
            } => (
                *reviewed_by,
                reviewed_by_name.as_str(),
                *reviewed_at,
                Some(rejection_reason.as_str()),
            ),
        };

        let row = sqlx::query_as::<_, LeaveRequestRow>(&format!(
            r#"
            UPDATE leave_requests
            SET status           = $2,
                reviewed_by      = $3,
                reviewed_by_name = $4,
                reviewed_at      = $5,
                rejection_reason = $6
            WHERE id = $1 AND status = 'pending'
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(review.status())
        .bind(by)
        .bind(name)
        .bind(at)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LeaveRequest::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM leave_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    async fn list(&self, filter: RequestFilter) -> Result<Vec<LeaveRequest>> {
        let rows = sqlx::query_as::<_, LeaveRequestRow>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM leave_requests
            WHERE ($1::UUID IS NULL OR user_id = $1)
            ORDER BY requested_at DESC, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(filter.owner)
        .bind(filter.page.limit())
        .bind(filter.page.offset())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LeaveRequest::try_from).collect()
    }

    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM leave_requests WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows)
    }
}

const KPI_COLUMNS: &str = r#"
    user_id, user_name, department, tasks_assigned, tasks_completed_on_time,
    tasks_completed_late, effective_points, score, updated_at
"#;

const HISTORY_COLUMNS: &str = r#"
    work_unit_id, work_unit_title, user_id, user_name, department, timeliness,
    points, period_month, period_year, deadline, completed_at, awarded_by, awarded_at
"#;

/// Read-modify-write of one record inside the caller's transaction.
async fn apply_in(
    conn: &mut PgConnection,
    key: &KpiKey,
    user_name: &str,
    delta: KpiDelta,
) -> Result<AppliedDelta> {
    sqlx::query(
        r#"
        INSERT INTO kpi_records (user_id, department, user_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, department) DO NOTHING
        "#,
    )
    .bind(key.user_id)
    .bind(&key.department)
    .bind(user_name)
    .execute(&mut *conn)
    .await?;

    // Row lock serializes concurrent updates of the same key.
    let mut record = sqlx::query_as::<_, KpiRecord>(&format!(
        "SELECT {KPI_COLUMNS} FROM kpi_records WHERE user_id = $1 AND department = $2 FOR UPDATE"
    ))
    .bind(key.user_id)
    .bind(&key.department)
    .fetch_one(&mut *conn)
    .await?;

    record.user_name = user_name.to_string();
    let clamped = record.apply(delta, OffsetDateTime::now_utc());

    sqlx::query(
        r#"
        UPDATE kpi_records
        SET user_name               = $3,
            tasks_assigned          = $4,
            tasks_completed_on_time = $5,
            tasks_completed_late    = $6,
            effective_points        = $7,
            score                   = $8,
            updated_at              = $9
        WHERE user_id = $1 AND department = $2
        "#,
    )
    .bind(key.user_id)
    .bind(&key.department)
    .bind(&record.user_name)
    .bind(record.tasks_assigned)
    .bind(record.tasks_completed_on_time)
    .bind(record.tasks_completed_late)
    .bind(record.effective_points)
    .bind(record.score)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(AppliedDelta { record, clamped })
}

pub struct PgKpiLedger {
    pool: PgPool,
}

impl PgKpiLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KpiLedger for PgKpiLedger {
    async fn apply(&self, key: &KpiKey, user_name: &str, delta: KpiDelta) -> Result<AppliedDelta> {
        let mut tx = self.pool.begin().await?;
        let applied = apply_in(&mut *tx, key, user_name, delta).await?;
        tx.commit().await?;
        Ok(applied)
    }

    async fn get(&self, key: &KpiKey) -> Result<Option<KpiRecord>> {
        let record = sqlx::query_as::<_, KpiRecord>(&format!(
            "SELECT {KPI_COLUMNS} FROM kpi_records WHERE user_id = $1 AND department = $2"
        ))
        .bind(key.user_id)
        .bind(&key.department)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_by_department(&self, department: &str) -> Result<Vec<KpiRecord>> {
        let records = sqlx::query_as::<_, KpiRecord>(&format!(
            "SELECT {KPI_COLUMNS} FROM kpi_records WHERE department = $1 ORDER BY user_name, user_id"
        ))
        .bind(department)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn award(&self, e: &AwardHistoryEntry) -> Result<Option<AppliedDelta>> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(&format!(
            r#"
            INSERT INTO kpi_award_history ({HISTORY_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (work_unit_id, user_id, department) DO NOTHING
            "#
        ))
        .bind(&e.work_unit_id)
        .bind(&e.work_unit_title)
        .bind(e.user_id)
        .bind(&e.user_name)
        .bind(&e.department)
        .bind(e.timeliness)
        .bind(e.points)
        .bind(e.period_month)
        .bind(e.period_year)
        .bind(e.deadline)
        .bind(e.completed_at)
        .bind(e.awarded_by)
        .bind(e.awarded_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !claimed {
            tx.rollback().await?;
            return Ok(None);
        }

        let applied = apply_in(&mut *tx, &e.key(), &e.user_name, KpiDelta::award(e.timeliness)).await?;
        tx.commit().await?;
        Ok(Some(applied))
    }

    async fn revoke(&self, work_unit_id: &str, key: &KpiKey) -> Result<Option<AppliedDelta>> {
        let mut tx = self.pool.begin().await?;

        // A concurrent revoke blocks on these rows and then deletes nothing.
        let removed = sqlx::query_as::<_, AwardHistoryEntry>(&format!(
            r#"
            DELETE FROM kpi_award_history
            WHERE work_unit_id = $1 AND user_id = $2 AND department = $3
            RETURNING {HISTORY_COLUMNS}
            "#
        ))
        .bind(work_unit_id)
        .bind(key.user_id)
        .bind(&key.department)
        .fetch_all(&mut *tx)
        .await?;

        let Some(first) = removed.first() else {
            tx.rollback().await?;
            return Ok(None);
        };

        let applied = apply_in(&mut *tx, key, &first.user_name, KpiDelta::reversal(&removed)).await?;
        tx.commit().await?;
        Ok(Some(applied))
    }

    async fn history_for(&self, work_unit_id: &str) -> Result<Vec<AwardHistoryEntry>> {
        let entries = sqlx::query_as::<_, AwardHistoryEntry>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM kpi_award_history WHERE work_unit_id = $1 ORDER BY awarded_at, user_id"
        ))
        .bind(work_unit_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM kpi_award_history WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let rows = sqlx::query("DELETE FROM kpi_records WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(rows)
    }
}

const USER_COLUMNS: &str =
    r#"id, name, email, department, role, password_hash, is_active, created_at"#;

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn insert(&self, u: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, department, role, password_hash, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(u.id)
        .bind(&u.name)
        .bind(&u.email)
        .bind(&u.department)
        .bind(u.role)
        .bind(&u.password_hash)
        .bind(u.is_active)
        .bind(u.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list(&self, page: PaginationParams) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY name, id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<bool> {
        let rows = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }
}
