//! Admin management surface: role gating, uniform CRUD, list envelope,
//! paging cap, and scan validation.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn admin_routes_reject_user_and_anonymous_callers() {
    let app = TestApp::new().await;
    let user = app.register_and_login("alice", "pw1pw1").await;

    let response = app
        .request(Method::GET, "/api/admin/categories", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/admin/categories", Some(&user), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn category_crud_round_trip() {
    let app = TestApp::new().await;
    let admin = app.seed_admin("root", "adminpw").await;

    // Create.
    let response = app
        .request(
            Method::POST,
            "/api/admin/categories",
            Some(&admin),
            Some(json!({ "name": "Music", "slug": "music" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = response_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Missing required name.
    let response = app
        .request(
            Method::POST,
            "/api/admin/categories",
            Some(&admin),
            Some(json!({ "name": "" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // List envelope.
    let response = app
        .request(
            Method::GET,
            "/api/admin/categories?q=mus",
            Some(&admin),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["pageSize"], 20);
    assert_eq!(body["data"][0]["name"], "Music");

    // Update.
    let response = app
        .request(
            Method::PUT,
            &format!("/api/admin/categories/{id}"),
            Some(&admin),
            Some(json!({ "name": "Live Music", "slug": "live-music" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = response_json(response).await;
    assert_eq!(updated["name"], "Live Music");

    // Delete, then 404.
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/admin/categories/{id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .request(
            Method::GET,
            &format!("/api/admin/categories/{id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn page_size_is_capped_at_one_hundred() {
    let app = TestApp::new().await;
    let admin = app.seed_admin("root", "adminpw").await;

    let response = app
        .request(
            Method::GET,
            "/api/admin/categories?page=0&pageSize=5000",
            Some(&admin),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["page"], 1);
    assert_eq!(body["pageSize"], 100);
}

#[tokio::test]
async fn duplicate_event_performer_association_is_a_conflict() {
    let app = TestApp::new().await;
    let admin = app.seed_admin("root", "adminpw").await;
    let (event_id, _) = app.seed_ticket_type(dec!(10000), 10, 4).await;

    let response = app
        .request(
            Method::POST,
            "/api/admin/performers",
            Some(&admin),
            Some(json!({ "stage_name": "DJ Test" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let performer_id = response_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    // A performer without any name is invalid.
    let response = app
        .request(
            Method::POST,
            "/api/admin/performers",
            Some(&admin),
            Some(json!({ "bio": "anonymous" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let payload = json!({ "event_id": event_id, "performer_id": performer_id });
    let response = app
        .request(
            Method::POST,
            "/api/admin/event-performers",
            Some(&admin),
            Some(payload.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::POST,
            "/api/admin/event-performers",
            Some(&admin),
            Some(payload),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn public_catalog_only_shows_published_events() {
    let app = TestApp::new().await;
    let admin = app.seed_admin("root", "adminpw").await;

    // One published (seeded) and one draft event.
    app.seed_ticket_type(dec!(10000), 10, 4).await;
    let response = app
        .request(
            Method::POST,
            "/api/admin/events",
            Some(&admin),
            Some(json!({ "name": "Unreleased Show", "published": false })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let draft_id = response_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app.request(Method::GET, "/api/events", None, None).await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["name"], "Test Concert");

    let response = app
        .request(Method::GET, &format!("/api/events/{draft_id}"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Admin list sees both.
    let response = app
        .request(Method::GET, "/api/admin/events", Some(&admin), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn ticket_type_update_cannot_undercut_sold_quantity() {
    let app = TestApp::new().await;
    let admin = app.seed_admin("root", "adminpw").await;
    let (event_id, ticket_type_id) = app.seed_ticket_type(dec!(10000), 10, 4).await;
    let user = app.register_and_login("alice", "pw1pw1").await;

    let response = app
        .request(
            Method::POST,
            "/api/booking",
            Some(&user),
            Some(json!({
                "ticket_type_id": ticket_type_id,
                "quantity": 3,
                "payment_method": "Momo",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/admin/ticket-types/{ticket_type_id}"),
            Some(&admin),
            Some(json!({
                "event_id": event_id,
                "name": "Standard",
                "price": "10000",
                "total_quantity": 2,
                "per_order_limit": 4,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scan_validates_once_then_reports_already_used() {
    let app = TestApp::new().await;
    let admin = app.seed_admin("root", "adminpw").await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(10000), 10, 4).await;
    let user = app.register_and_login("alice", "pw1pw1").await;

    // Book and settle so a ticket exists.
    let response = app
        .request(
            Method::POST,
            "/api/booking",
            Some(&user),
            Some(json!({
                "ticket_type_id": ticket_type_id,
                "quantity": 1,
                "payment_method": "Momo",
            })),
        )
        .await;
    let order_id = response_json(response).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();
    let response = app
        .request(
            Method::POST,
            "/api/payments/initiate",
            Some(&user),
            Some(json!({ "order_id": order_id, "provider": "Momo" })),
        )
        .await;
    let provider_ref = response_json(response).await["provider_ref"]
        .as_str()
        .unwrap()
        .to_string();
    let response = app
        .request(
            Method::POST,
            "/api/payments/callback",
            None,
            Some(json!({ "provider_ref": provider_ref, "status": "Success" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/admin/tickets", Some(&admin), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    let ticket_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/admin/tickets/{ticket_id}/scan"),
            Some(&admin),
            Some(json!({ "gate": "A1", "device_id": "scanner-7" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["result"], "Valid");

    let response = app
        .request(
            Method::POST,
            &format!("/api/admin/tickets/{ticket_id}/scan"),
            Some(&admin),
            Some(json!({ "gate": "A1", "device_id": "scanner-7" })),
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["result"], "AlreadyUsed");
}

#[tokio::test]
async fn admin_can_create_users_with_roles() {
    let app = TestApp::new().await;
    let admin = app.seed_admin("root", "adminpw").await;

    let response = app
        .request(
            Method::POST,
            "/api/admin/users",
            Some(&admin),
            Some(json!({
                "username": "operator",
                "password": "oppass1",
                "full_name": "Gate Operator",
                "role": "Admin",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::POST,
            "/api/admin/users",
            Some(&admin),
            Some(json!({
                "username": "weird",
                "password": "oppass1",
                "full_name": "Weird Role",
                "role": "superuser",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The created admin can log in and reach the admin surface.
    let operator = app.login("operator", "oppass1").await;
    let response = app
        .request(Method::GET, "/api/admin/orders", Some(&operator), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_notifications_crud() {
    let app = TestApp::new().await;
    let admin = app.seed_admin("root", "adminpw").await;
    let user_token = app.register_and_login("alice", "pw1pw1").await;
    let claims = app.state.auth.verify_token(&user_token).unwrap();
    assert_eq!(claims.sub, "alice");

    // Look the user id up via the admin surface.
    let response = app
        .request(Method::GET, "/api/admin/users?q=alice", Some(&admin), None)
        .await;
    let body = response_json(response).await;
    let user_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            "/api/admin/notifications",
            Some(&admin),
            Some(json!({
                "user_id": user_id,
                "type": "System",
                "title": "Maintenance window",
                "content": "Saturday 02:00-03:00",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // The user sees it and can mark it read.
    let response = app
        .request(Method::GET, "/api/notifications", Some(&user_token), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    let notification_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/notifications/{notification_id}/read"),
            Some(&user_token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Another user cannot mark it.
    let other = app.register_and_login("bob", "pw1pw1").await;
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/notifications/{notification_id}/read"),
            Some(&other),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
