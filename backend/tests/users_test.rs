mod common;

use officeflow_backend::auth::Role;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn admin_creates_user_who_can_log_in() {
    let (addr, state) = common::setup_test_app().await;
    let admin = common::create_test_user(&state, "Root", Role::Admin, "Management").await;
    let client = common::http_client();
    let email = format!("sarah+{}@test.local", &Uuid::new_v4().to_string()[..8]);

    let resp = client
        .post(format!("http://{}/api/users", addr))
        .header("Authorization", format!("Bearer {}", common::token_for(admin, Role::Admin)))
        .json(&json!({
            "name": "Sarah",
            "email": email,
            "department": "UIUX",
            "role": "department_head",
            "password": "sarah-pass",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["role"], "specialist");

    let token = common::get_auth_token(addr, &email, "sarah-pass").await;
    assert!(!token.is_empty());

    let resp = client
        .post(format!("http://{}/api/users", addr))
        .header("Authorization", format!("Bearer {}", common::token_for(admin, Role::Admin)))
        .json(&json!({
            "name": "Sarah Again",
            "email": email,
            "department": "UIUX",
            "role": "viewer",
            "password": "sarah-pass",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn reset_password_replaces_login_secret() {
    let (addr, state) = common::setup_test_app().await;
    let admin = common::create_test_user(&state, "Root", Role::Admin, "Management").await;
    let email = format!("ana+{}@test.local", &Uuid::new_v4().to_string()[..8]);
    let ana = common::create_user_with_email(&state, Role::Viewer, &email).await;
    let client = common::http_client();
    let admin_token = common::token_for(admin, Role::Admin);

    let resp = client
        .post(format!("http://{}/api/users/{}/password", addr, ana))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&json!({ "new_password": "abc" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("http://{}/api/users/{}/password", addr, admin))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&json!({ "new_password": "brand-new-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400, "Admins cannot reset their own password here");

    let resp = client
        .post(format!("http://{}/api/users/{}/password", addr, ana))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&json!({ "new_password": "brand-new-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("http://{}/api/auth/login", addr))
        .json(&json!({ "email": email, "password": common::TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    common::get_auth_token(addr, &email, "brand-new-pass").await;
}

#[tokio::test]
async fn deleting_user_removes_their_requests_and_kpi() {
    let (addr, state) = common::setup_test_app().await;
    let admin = common::create_test_user(&state, "Root", Role::Admin, "Management").await;
    let ana = common::create_test_user(&state, "Ana", Role::Specialist, "Programming").await;
    let client = common::http_client();
    let admin_token = common::token_for(admin, Role::Admin);
    let ana_token = common::token_for(ana, Role::Specialist);

    let resp = client
        .post(format!("http://{}/api/requests", addr))
        .header("Authorization", format!("Bearer {}", ana_token))
        .json(&json!({
            "type": "leave",
            "selected_days": ["2026-07-01"],
            "number_of_days": 1,
            "reason": "wedding",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .post(format!("http://{}/api/kpi/awards", addr))
        .header("Authorization", format!("Bearer {}", ana_token))
        .json(&json!({
            "work_unit_id": "wu-1",
            "work_unit_title": "Landing page",
            "department": "Programming",
            "assignees": [{ "id": ana, "name": "Ana" }],
            "period_month": 6,
            "period_year": 2026,
            "deadline": "2026-06-30T17:00:00Z",
            "completed_at": "2026-06-29T17:00:00Z",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .delete(format!("http://{}/api/users/{}", addr, ana))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["requests_deleted"], 1);
    assert_eq!(body["kpi_records_deleted"], 1);

    let requests: Vec<serde_json::Value> = client
        .get(format!("http://{}/api/requests", addr))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(requests.is_empty());

    // The deleted user's token no longer authenticates.
    let resp = client
        .get(format!("http://{}/api/auth/me", addr))
        .header("Authorization", format!("Bearer {}", ana_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn managers_can_list_but_not_manage_users() {
    let (addr, state) = common::setup_test_app().await;
    let manager = common::create_test_user(&state, "Maria", Role::Manager, "Programming").await;
    let viewer = common::create_test_user(&state, "Vera", Role::Viewer, "Programming").await;
    let client = common::http_client();
    let token = common::token_for(manager, Role::Manager);

    let users: Vec<serde_json::Value> = client
        .get(format!("http://{}/api/users", addr))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));

    let resp = client
        .delete(format!("http://{}/api/users/{}", addr, viewer))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}
