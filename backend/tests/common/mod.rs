#![allow(dead_code)]
use std::{net::SocketAddr, sync::OnceLock};

use uuid::Uuid;

use officeflow_backend::{
    api,
    auth::{self, Role},
    models::user::User,
    AppState,
};

const JWT_SECRET: &str = "test-secret-that-is-at-least-32-chars-long!!";
const JWT_EXPIRY_HOURS: u64 = 12;
pub const TEST_PASSWORD: &str = "testpass123";

/// Spin up a real Axum server on a random port over in-memory stores. Every
/// test gets its own state, so nothing needs cleaning up afterwards.
pub async fn setup_test_app() -> (SocketAddr, AppState) {
    let state = test_state();
    let addr = serve(state.clone()).await;
    (addr, state)
}

/// In-memory state signed with the test secret, for tests that swap one store out.
pub fn test_state() -> AppState {
    AppState::in_memory(JWT_SECRET.to_string(), JWT_EXPIRY_HOURS)
}

/// Serve the router over `state` on a random port.
pub async fn serve(state: AppState) -> SocketAddr {
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Argon2 is slow in debug builds; every test user shares one hash.
fn test_password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| auth::hash_password(TEST_PASSWORD).expect("Failed to hash password"))
        .clone()
}

async fn insert_user(state: &AppState, name: &str, role: Role, department: &str, email: &str, active: bool) -> Uuid {
    let user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        department: department.to_string(),
        role,
        password_hash: test_password_hash(),
        is_active: active,
        created_at: time::OffsetDateTime::now_utc(),
    };
    state.users.insert(&user).await.expect("Failed to create test user");
    user.id
}

/// Create an active user whose password is `TEST_PASSWORD`. Returns the user id.
pub async fn create_test_user(state: &AppState, name: &str, role: Role, department: &str) -> Uuid {
    let email = format!("{}+{}@test.local", name.to_lowercase(), &Uuid::new_v4().to_string()[..8]);
    insert_user(state, name, role, department, &email, true).await
}

pub async fn create_inactive_user(state: &AppState, email: &str) -> Uuid {
    insert_user(state, "Inactive", Role::Viewer, "Programming", email, false).await
}

pub async fn create_user_with_email(state: &AppState, role: Role, email: &str) -> Uuid {
    insert_user(state, "Test", role, "Programming", email, true).await
}

/// Mint a token directly, skipping the login round trip.
pub fn token_for(user_id: Uuid, role: Role) -> String {
    auth::create_token(user_id, role, JWT_SECRET, JWT_EXPIRY_HOURS).expect("Failed to create token")
}

/// Log in via the HTTP API and return the JWT token.
pub async fn get_auth_token(addr: SocketAddr, email: &str, password: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/api/auth/login", addr))
        .json(&serde_json::json!({
            "email": email,
            "password": password,
        }))
        .send()
        .await
        .expect("Login request failed");

    assert_eq!(resp.status(), 200, "Login should return 200");

    let body: serde_json::Value = resp.json().await.expect("Failed to parse login response");
    body["token"]
        .as_str()
        .expect("Response should contain token")
        .to_string()
}

/// Create a JWT token that is already expired (exp in the past).
pub fn create_expired_token(user_id: Uuid) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use officeflow_backend::auth::Claims;

    let now = time::OffsetDateTime::now_utc();
    let claims = Claims {
        sub: user_id,
        role: Role::Viewer,
        exp: (now - time::Duration::hours(1)).unix_timestamp(),
        iat: (now - time::Duration::hours(2)).unix_timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to create expired token")
}

/// Build a reqwest client (reusable across requests in a test).
pub fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}
