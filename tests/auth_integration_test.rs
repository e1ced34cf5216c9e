//! Registration, login, token claims, profile and password flows.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{response_json, TestApp};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;
use stagepass_api::entities::user;
use uuid::Uuid;

#[tokio::test]
async fn register_login_round_trip_carries_username_and_role() {
    let app = TestApp::new().await;

    let token = app.register_and_login("alice", "pw1").await;

    let claims = app.state.auth.verify_token(&token).expect("claims");
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.role, "User");

    let response = app
        .request(Method::GET, "/api/auth/profile", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let app = TestApp::new().await;
    app.register_and_login("bob", "pw1pw1").await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "bob",
                "password": "pw2pw2",
                "full_name": "Bob Again",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Username already exists");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.register_and_login("carol", "pw1pw1").await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "carol", "password": "nope" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/auth/profile", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_requires_the_old_one_and_takes_effect() {
    let app = TestApp::new().await;
    let token = app.register_and_login("dave", "oldpass").await;

    let response = app
        .request(
            Method::PUT,
            "/api/auth/change-password",
            Some(&token),
            Some(json!({ "old_password": "wrong", "new_password": "newpass" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::PUT,
            "/api/auth/change-password",
            Some(&token),
            Some(json!({ "old_password": "oldpass", "new_password": "newpass" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "dave", "password": "oldpass" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    app.login("dave", "newpass").await;
}

#[tokio::test]
async fn legacy_sha256_account_logs_in_and_is_rehashed() {
    let app = TestApp::new().await;

    // SHA-256("legacy-pw") as an account created under the retired scheme.
    let legacy_hash = {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"legacy-pw");
        hex::encode(hasher.finalize())
    };

    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set("erin".to_string()),
        password_hash: Set(legacy_hash),
        full_name: Set("Erin Legacy".to_string()),
        email: Set(None),
        phone: Set(None),
        birth_date: Set(None),
        gender: Set(None),
        avatar_url: Set(None),
        address_line: Set(None),
        province_name: Set(None),
        district_name: Set(None),
        ward_name: Set(None),
        email_verified: Set(false),
        phone_verified: Set(false),
        role: Set("User".to_string()),
        created_at: Set(now),
        updated_at: Set(Some(now)),
    }
    .insert(&*app.state.db)
    .await
    .expect("seed legacy user");

    app.login("erin", "legacy-pw").await;

    let stored = user::Entity::find()
        .filter(user::Column::Username.eq("erin"))
        .one(&*app.state.db)
        .await
        .expect("query")
        .expect("row")
        .password_hash;
    assert!(
        stored.starts_with("$argon2"),
        "legacy hash should be upgraded on login, got {stored}"
    );

    // And the upgraded hash still verifies.
    app.login("erin", "legacy-pw").await;
}

#[tokio::test]
async fn profile_update_keeps_absent_fields() {
    let app = TestApp::new().await;
    let token = app.register_and_login("frank", "pw1pw1").await;

    let response = app
        .request(
            Method::PUT,
            "/api/auth/profile",
            Some(&token),
            Some(json!({ "phone": "0123456789" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["phone"], "0123456789");
    assert_eq!(body["full_name"], "frank test");

    // The same surface answers at the /api/profile alias.
    let response = app
        .request(Method::GET, "/api/profile", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["phone"], "0123456789");
}
