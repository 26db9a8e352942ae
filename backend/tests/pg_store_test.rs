//! Store behaviour that only Postgres can show: conditional writes, row locks,
//! array columns and CHECK constraints. Every test returns early when
//! `TEST_DATABASE_URL` is unset. Isolation comes from fresh ids per test and
//! explicit cleanup.

use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};
use time::{macros::date, Date, OffsetDateTime};
use uuid::Uuid;

use officeflow_backend::{
    error::AppError,
    models::{
        kpi::{AwardHistoryEntry, KpiKey, Timeliness},
        leave::{LeaveRequest, RequestKind, ReviewState},
    },
    store::{
        postgres::{PgKpiLedger, PgRequestStore},
        KpiLedger, RequestStore,
    },
};

async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping Postgres store test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

/// Postgres keeps microseconds; drop the rest so round trips compare equal.
fn now_micros() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000).unwrap()
}

fn pending_request(user_id: Uuid, days: Vec<Date>) -> LeaveRequest {
    LeaveRequest {
        id: Uuid::new_v4(),
        user_id,
        user_name: "Ana".into(),
        user_email: "ana@office.test".into(),
        department: "Programming".into(),
        kind: RequestKind::Leave,
        start_date: days[0],
        end_date: days[days.len() - 1],
        number_of_days: days.len() as i64,
        selected_days: days,
        reason: "family event".into(),
        review: ReviewState::Pending,
        requested_at: now_micros(),
    }
}

fn history_entry(work_unit_id: &str, key: &KpiKey, timeliness: Timeliness) -> AwardHistoryEntry {
    let deadline = now_micros();
    AwardHistoryEntry {
        work_unit_id: work_unit_id.to_string(),
        work_unit_title: format!("Task {}", work_unit_id),
        user_id: key.user_id,
        user_name: "John".into(),
        department: key.department.clone(),
        timeliness,
        points: timeliness.points(),
        period_month: 3,
        period_year: 2026,
        deadline,
        completed_at: deadline,
        awarded_by: Uuid::new_v4(),
        awarded_at: now_micros(),
    }
}

async fn cleanup_requests(pool: &PgPool, user_id: Uuid) {
    sqlx::query("DELETE FROM leave_requests WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
}

async fn cleanup_ledger(pool: &PgPool, user_id: Uuid) {
    sqlx::query("DELETE FROM kpi_award_history WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM kpi_records WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn selected_days_survive_a_round_trip() {
    let Some(pool) = test_pool().await else { return };
    let store = PgRequestStore::new(pool.clone());
    let owner = Uuid::new_v4();

    let request = pending_request(
        owner,
        vec![date!(2026 - 02 - 27), date!(2026 - 03 - 02), date!(2026 - 03 - 03)],
    );
    store.insert(&request).await.unwrap();

    let stored = store.get(request.id).await.unwrap();
    assert_eq!(stored, Some(request));

    cleanup_requests(&pool, owner).await;
}

#[tokio::test]
async fn racing_reviewers_write_once() {
    let Some(pool) = test_pool().await else { return };
    let store = Arc::new(PgRequestStore::new(pool.clone()));
    let owner = Uuid::new_v4();

    let request = pending_request(owner, vec![date!(2026 - 04 - 06)]);
    store.insert(&request).await.unwrap();
    let id = request.id;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            let review = if i % 2 == 0 {
                ReviewState::Approved {
                    reviewed_by: Uuid::new_v4(),
                    reviewed_by_name: format!("Reviewer {}", i),
                    reviewed_at: now_micros(),
                }
            } else {
                ReviewState::Rejected {
                    reviewed_by: Uuid::new_v4(),
                    reviewed_by_name: format!("Reviewer {}", i),
                    reviewed_at: now_micros(),
                    rejection_reason: "team is short that week".into(),
                }
            };
            tokio::spawn(async move { store.review_if_pending(id, &review).await })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        if let Some(written) = handle.await.unwrap().unwrap() {
            winners.push(written);
        }
    }
    assert_eq!(winners.len(), 1, "exactly one reviewer should win");

    let stored = store.get(id).await.unwrap().unwrap();
    assert_eq!(stored.review, winners[0].review);

    cleanup_requests(&pool, owner).await;
}

#[tokio::test]
async fn inconsistent_review_row_is_rejected_on_read() {
    let Some(pool) = test_pool().await else { return };
    let store = PgRequestStore::new(pool.clone());
    let owner = Uuid::new_v4();
    let id = Uuid::new_v4();

    // Approved without a reviewer passes the table constraints but not the model.
    sqlx::query(
        r#"
        INSERT INTO leave_requests (id, user_id, user_name, user_email, department, kind,
                                    selected_days, start_date, end_date, number_of_days,
                                    reason, status)
        VALUES ($1, $2, 'Ana', 'ana@office.test', 'Programming', 'leave',
                ARRAY['2026-05-04'::DATE], '2026-05-04', '2026-05-04', 1,
                'moving house', 'approved')
        "#,
    )
    .bind(id)
    .bind(owner)
    .execute(&pool)
    .await
    .unwrap();

    let err = store.get(id).await.unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(err.kind(), "internal");

    cleanup_requests(&pool, owner).await;
}

#[tokio::test]
async fn table_constraints_reject_invalid_rows() {
    let Some(pool) = test_pool().await else { return };
    let owner = Uuid::new_v4();

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests (id, user_id, user_name, user_email, department, kind,
                                    selected_days, start_date, end_date, number_of_days,
                                    reason)
        VALUES ($1, $2, 'Ana', 'ana@office.test', 'Programming', 'leave',
                ARRAY['2026-05-04'::DATE, '2026-05-05'::DATE], '2026-05-04', '2026-05-05', 3,
                'moving house')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner)
    .execute(&pool)
    .await;

    match result {
        Err(sqlx::Error::Database(db_err)) => {
            assert_eq!(db_err.constraint(), Some("leave_requests_day_count"));
        }
        other => panic!("expected a CHECK violation, got {other:?}"),
    }

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests (id, user_id, user_name, user_email, department, kind,
                                    selected_days, start_date, end_date, number_of_days,
                                    reason, status)
        VALUES ($1, $2, 'Ana', 'ana@office.test', 'Programming', 'leave',
                ARRAY['2026-05-04'::DATE], '2026-05-04', '2026-05-04', 1,
                'moving house', 'rejected')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner)
    .execute(&pool)
    .await;

    match result {
        Err(sqlx::Error::Database(db_err)) => {
            assert_eq!(db_err.constraint(), Some("leave_requests_rejection_reason"));
        }
        other => panic!("expected a CHECK violation, got {other:?}"),
    }

    cleanup_requests(&pool, owner).await;
}

#[tokio::test]
async fn concurrent_awards_on_one_key_all_count() {
    let Some(pool) = test_pool().await else { return };
    let ledger = Arc::new(PgKpiLedger::new(pool.clone()));
    let key = KpiKey::new(Uuid::new_v4(), "Programming");

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let ledger = ledger.clone();
            let entry = history_entry(&format!("task-{}", i), &key, Timeliness::OnTime);
            tokio::spawn(async move { ledger.award(&entry).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_some());
    }

    let record = ledger.get(&key).await.unwrap().unwrap();
    assert_eq!(record.tasks_assigned, 16);
    assert_eq!(record.tasks_completed_on_time, 16);
    assert_eq!(record.effective_points, 16.0);
    assert_eq!(record.score, 100.0);

    cleanup_ledger(&pool, key.user_id).await;
}

#[tokio::test]
async fn repeated_award_is_claimed_once() {
    let Some(pool) = test_pool().await else { return };
    let ledger = PgKpiLedger::new(pool.clone());
    let key = KpiKey::new(Uuid::new_v4(), "UIUX");
    let entry = history_entry("task-login-page", &key, Timeliness::Late);

    let first = ledger.award(&entry).await.unwrap().expect("first award applies");
    assert_eq!(first.record.tasks_assigned, 1);
    assert!(ledger.award(&entry).await.unwrap().is_none());

    let record = ledger.get(&key).await.unwrap().unwrap();
    assert_eq!(record.tasks_assigned, 1);
    assert_eq!(record.tasks_completed_late, 1);
    assert_eq!(record.effective_points, 0.5);
    assert_eq!(ledger.history_for("task-login-page").await.unwrap(), vec![entry]);

    cleanup_ledger(&pool, key.user_id).await;
}

#[tokio::test]
async fn racing_revokes_reverse_once() {
    let Some(pool) = test_pool().await else { return };
    let ledger = Arc::new(PgKpiLedger::new(pool.clone()));
    let key = KpiKey::new(Uuid::new_v4(), "Programming");

    ledger
        .award(&history_entry("task-kickoff", &key, Timeliness::OnTime))
        .await
        .unwrap();
    ledger
        .award(&history_entry("task-sprint", &key, Timeliness::OnTime))
        .await
        .unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let ledger = ledger.clone();
            let key = key.clone();
            tokio::spawn(async move { ledger.revoke("task-sprint", &key).await })
        })
        .collect();
    let mut reversed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            reversed += 1;
        }
    }
    assert_eq!(reversed, 1);

    let record = ledger.get(&key).await.unwrap().unwrap();
    assert_eq!(record.tasks_assigned, 1);
    assert_eq!(record.tasks_completed_on_time, 1);
    assert_eq!(record.effective_points, 1.0);
    assert!(ledger.history_for("task-sprint").await.unwrap().is_empty());
    assert_eq!(ledger.history_for("task-kickoff").await.unwrap().len(), 1);

    cleanup_ledger(&pool, key.user_id).await;
}
