//! KPI award engine.
//!
//! Points are kept per `KpiKey` (user, department). An award event fans out to
//! every assignee independently; one assignee failing never blocks the others
//! and is reported back instead of being swallowed.

use std::collections::{BTreeSet, HashSet};

use futures::future::join_all;
use time::OffsetDateTime;
use validator::Validate;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::kpi::{
        AwardFailure, AwardHistoryEntry, AwardPointsRequest, AwardReport, KpiKey, KpiRecord,
        Timeliness,
    },
    policy,
    store::KpiLedger,
};

enum Outcome {
    Updated(KpiRecord),
    Skipped(KpiKey),
    Failed(AwardFailure),
}

fn failure(key: &KpiKey, err: &AppError) -> AwardFailure {
    AwardFailure {
        user_id: key.user_id,
        department: key.department.clone(),
        error: err.to_string(),
    }
}

fn collect(work_unit_id: &str, timeliness: Option<Timeliness>, outcomes: Vec<Outcome>) -> AwardReport {
    let mut report = AwardReport {
        work_unit_id: work_unit_id.to_string(),
        timeliness,
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            Outcome::Updated(record) => report.updated.push(record),
            Outcome::Skipped(key) => report.skipped.push(key.user_id),
            Outcome::Failed(f) => report.failed.push(f),
        }
    }
    report
}

pub async fn award_points(
    ledger: &dyn KpiLedger,
    actor: &AuthUser,
    input: AwardPointsRequest,
) -> Result<AwardReport> {
    if !policy::can_award(actor.role) {
        tracing::warn!(actor = %actor.id, role = ?actor.role, "Award denied");
        return Err(AppError::Forbidden);
    }
    input.validate()?;

    let work_unit_id = input.work_unit_id.trim();
    let title = input.work_unit_title.trim();
    let department = input.department.trim();
    for (field, value) in [
        ("work_unit_id", work_unit_id),
        ("work_unit_title", title),
        ("department", department),
    ] {
        if value.is_empty() {
            return Err(AppError::invalid(field, "must not be blank"));
        }
    }

    let timeliness = Timeliness::of(input.deadline, input.completed_at);
    let awarded_at = OffsetDateTime::now_utc();

    let mut seen = HashSet::new();
    let entries: Vec<AwardHistoryEntry> = input
        .assignees
        .iter()
        .filter(|a| seen.insert(a.id))
        .map(|a| AwardHistoryEntry {
            work_unit_id: work_unit_id.to_string(),
            work_unit_title: title.to_string(),
            user_id: a.id,
            user_name: a.name.clone(),
            department: department.to_string(),
            timeliness,
            points: timeliness.points(),
            period_month: input.period_month,
            period_year: input.period_year,
            deadline: input.deadline,
            completed_at: input.completed_at,
            awarded_by: actor.id,
            awarded_at,
        })
        .collect();

    let outcomes = join_all(entries.into_iter().map(|entry| award_one(ledger, entry))).await;
    let report = collect(work_unit_id, Some(timeliness), outcomes);

    tracing::info!(
        work_unit_id,
        department,
        ?timeliness,
        updated = report.updated.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "KPI points awarded"
    );
    if !report.is_complete() {
        tracing::warn!(work_unit_id, failed = report.failed.len(), "KPI award partially applied");
    }

    Ok(report)
}

async fn award_one(ledger: &dyn KpiLedger, entry: AwardHistoryEntry) -> Outcome {
    let key = entry.key();
    match ledger.award(&entry).await {
        Ok(Some(applied)) => Outcome::Updated(applied.record),
        Ok(None) => {
            tracing::debug!(work_unit_id = %entry.work_unit_id, key = %key, "Award already recorded");
            Outcome::Skipped(key)
        }
        Err(e) => {
            tracing::error!(work_unit_id = %entry.work_unit_id, key = %key, "KPI award failed: {}", e);
            Outcome::Failed(failure(&key, &e))
        }
    }
}

/// Reverses every award recorded for `work_unit_id`.
pub async fn remove_points(
    ledger: &dyn KpiLedger,
    actor: &AuthUser,
    work_unit_id: &str,
) -> Result<AwardReport> {
    if !policy::can_revoke(actor.role) {
        tracing::warn!(actor = %actor.id, role = ?actor.role, "Award reversal denied");
        return Err(AppError::Forbidden);
    }

    let history = ledger.history_for(work_unit_id).await?;
    if history.is_empty() {
        return Err(AppError::NotFound(format!(
            "No awards recorded for work unit {}",
            work_unit_id
        )));
    }

    let keys: BTreeSet<KpiKey> = history.iter().map(AwardHistoryEntry::key).collect();
    let outcomes = join_all(keys.into_iter().map(|key| revoke_one(ledger, work_unit_id, key))).await;
    let report = collect(work_unit_id, None, outcomes);

    tracing::info!(
        work_unit_id,
        reversed = report.updated.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "KPI points removed"
    );

    Ok(report)
}

async fn revoke_one(ledger: &dyn KpiLedger, work_unit_id: &str, key: KpiKey) -> Outcome {
    match ledger.revoke(work_unit_id, &key).await {
        Ok(Some(applied)) => {
            if applied.clamped {
                tracing::warn!(
                    work_unit_id,
                    key = %key,
                    "KPI counters would have gone negative; clamped at zero"
                );
            }
            Outcome::Updated(applied.record)
        }
        // Reversed by a concurrent removal between our history read and now.
        Ok(None) => Outcome::Skipped(key),
        Err(e) => {
            tracing::error!(work_unit_id, key = %key, "KPI reversal failed: {}", e);
            Outcome::Failed(failure(&key, &e))
        }
    }
}

/// Records of one department; defaults to the caller's own department.
pub async fn list_department(
    ledger: &dyn KpiLedger,
    actor: &AuthUser,
    department: Option<&str>,
) -> Result<Vec<KpiRecord>> {
    let department = department
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(actor.department.as_str());

    if !policy::can_view_department(actor.role, &actor.department, department) {
        return Err(AppError::Forbidden);
    }

    ledger.list_by_department(department).await
}
