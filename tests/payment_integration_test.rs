//! Payment initiation and callback-driven settlement, including the
//! one-way idempotent transition and ticket issuance.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

async fn book(app: &TestApp, token: &str, ticket_type_id: Uuid, quantity: i32) -> Value {
    let response = app
        .request(
            Method::POST,
            "/api/booking",
            Some(token),
            Some(json!({
                "ticket_type_id": ticket_type_id,
                "quantity": quantity,
                "payment_method": "Momo",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await
}

async fn initiate(app: &TestApp, token: &str, order_id: &str) -> Value {
    let response = app
        .request(
            Method::POST,
            "/api/payments/initiate",
            Some(token),
            Some(json!({ "order_id": order_id, "provider": "Momo" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await
}

async fn callback(app: &TestApp, provider_ref: &str, status: &str) -> (StatusCode, Value) {
    let response = app
        .request(
            Method::POST,
            "/api/payments/callback",
            None,
            Some(json!({ "provider_ref": provider_ref, "status": status })),
        )
        .await;
    let code = response.status();
    (code, response_json(response).await)
}

#[tokio::test]
async fn full_booking_and_settlement_scenario() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(100000), 100, 4).await;
    let token = app.register_and_login("alice", "pw1pw1").await;

    // Book two tickets at 100000 each.
    let order = book(&app, &token, ticket_type_id, 2).await;
    assert_eq!(order["total_amount"], "200000");
    assert_eq!(order["status"], "Pending");
    assert_eq!(order["payment_status"], "Unpaid");
    let order_id = order["order_id"].as_str().unwrap().to_string();

    // Initiate a payment attempt.
    let payment = initiate(&app, &token, &order_id).await;
    assert_eq!(payment["amount"], "200000");
    assert_eq!(payment["currency"], "VND");
    let provider_ref = payment["provider_ref"].as_str().unwrap().to_string();
    assert!(provider_ref.starts_with("Momo-"));
    assert!(payment["redirect_url"]
        .as_str()
        .unwrap()
        .contains("/Momo/pay?"));

    // Provider reports success (case-insensitive match).
    let (code, body) = callback(&app, &provider_ref, "success").await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["status"], "Success");

    // The order settled and tickets were issued.
    let response = app
        .request(
            Method::GET,
            &format!("/api/booking/{order_id}"),
            Some(&token),
            None,
        )
        .await;
    let detail = response_json(response).await;
    assert_eq!(detail["status"], "Paid");
    assert_eq!(detail["payment_status"], "Paid");
    assert!(detail["paid_at"].is_string());
    let tickets = detail["items"][0]["tickets"].as_array().unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0]["status"], "Issued");
    let transactions = detail["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["status"], "Success");

    // The tickets show up on the caller's ticket surface.
    let response = app
        .request(Method::GET, "/api/tickets/my-tickets", Some(&token), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"][0]["event_name"], "Test Concert");

    // Settlement also notified the owner.
    let response = app
        .request(Method::GET, "/api/notifications", Some(&token), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["type"], "Payment");
    assert_eq!(body["data"][0]["is_read"], false);
}

#[tokio::test]
async fn unknown_provider_ref_is_not_found_and_mutates_nothing() {
    let app = TestApp::new().await;
    let (code, body) = callback(&app, "Momo-20250101000000000-missing", "Success").await;
    assert_eq!(code, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Transaction not found");
}

#[tokio::test]
async fn unknown_callback_status_is_rejected() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(50000), 10, 4).await;
    let token = app.register_and_login("bob", "pw1pw1").await;

    let order = book(&app, &token, ticket_type_id, 1).await;
    let payment = initiate(&app, &token, order["order_id"].as_str().unwrap()).await;
    let provider_ref = payment["provider_ref"].as_str().unwrap();

    let (code, _) = callback(&app, provider_ref, "Settled").await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    let (code, _) = callback(&app, provider_ref, "Pending").await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn replayed_success_is_acknowledged_without_reissuing_tickets() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(50000), 10, 4).await;
    let token = app.register_and_login("carol", "pw1pw1").await;

    let order = book(&app, &token, ticket_type_id, 2).await;
    let order_id = order["order_id"].as_str().unwrap().to_string();
    let payment = initiate(&app, &token, &order_id).await;
    let provider_ref = payment["provider_ref"].as_str().unwrap().to_string();

    let (code, _) = callback(&app, &provider_ref, "Success").await;
    assert_eq!(code, StatusCode::OK);
    let (code, _) = callback(&app, &provider_ref, "Success").await;
    assert_eq!(code, StatusCode::OK, "replay is acknowledged");

    let response = app
        .request(Method::GET, "/api/tickets/my-tickets", Some(&token), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 2, "replay must not mint more tickets");
}

#[tokio::test]
async fn failure_after_success_never_reverts_the_order() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(50000), 10, 4).await;
    let token = app.register_and_login("dave", "pw1pw1").await;

    let order = book(&app, &token, ticket_type_id, 1).await;
    let order_id = order["order_id"].as_str().unwrap().to_string();
    let payment = initiate(&app, &token, &order_id).await;
    let provider_ref = payment["provider_ref"].as_str().unwrap().to_string();

    let (code, _) = callback(&app, &provider_ref, "Success").await;
    assert_eq!(code, StatusCode::OK);

    // A late Failed delivery for the same attempt is refused outright.
    let (code, body) = callback(&app, &provider_ref, "Failed").await;
    assert_eq!(code, StatusCode::CONFLICT);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("already settled"));

    let response = app
        .request(
            Method::GET,
            &format!("/api/booking/{order_id}"),
            Some(&token),
            None,
        )
        .await;
    let detail = response_json(response).await;
    assert_eq!(detail["payment_status"], "Paid");
    assert_eq!(detail["status"], "Paid");
}

#[tokio::test]
async fn second_pending_attempt_can_fail_without_touching_a_paid_order() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(50000), 10, 4).await;
    let token = app.register_and_login("erin", "pw1pw1").await;

    let order = book(&app, &token, ticket_type_id, 1).await;
    let order_id = order["order_id"].as_str().unwrap().to_string();

    // Initiation is not idempotent: two attempts, two pending transactions.
    let first = initiate(&app, &token, &order_id).await;
    let second = initiate(&app, &token, &order_id).await;
    let ref1 = first["provider_ref"].as_str().unwrap().to_string();
    let ref2 = second["provider_ref"].as_str().unwrap().to_string();
    assert_ne!(ref1, ref2);

    let (code, _) = callback(&app, &ref1, "Success").await;
    assert_eq!(code, StatusCode::OK);

    // The abandoned attempt settles as Failed; the paid order is untouched.
    let (code, _) = callback(&app, &ref2, "Failed").await;
    assert_eq!(code, StatusCode::OK);

    let response = app
        .request(
            Method::GET,
            &format!("/api/booking/{order_id}"),
            Some(&token),
            None,
        )
        .await;
    let detail = response_json(response).await;
    assert_eq!(detail["payment_status"], "Paid");
    let transactions = detail["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
}

#[tokio::test]
async fn initiating_against_a_paid_order_is_a_conflict() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(50000), 10, 4).await;
    let token = app.register_and_login("frank", "pw1pw1").await;

    let order = book(&app, &token, ticket_type_id, 1).await;
    let order_id = order["order_id"].as_str().unwrap().to_string();
    let payment = initiate(&app, &token, &order_id).await;
    let (code, _) = callback(&app, payment["provider_ref"].as_str().unwrap(), "Success").await;
    assert_eq!(code, StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/payments/initiate",
            Some(&token),
            Some(json!({ "order_id": order_id, "provider": "Momo" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancelling_a_paid_order_is_rejected() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(50000), 10, 4).await;
    let token = app.register_and_login("grace", "pw1pw1").await;

    let order = book(&app, &token, ticket_type_id, 1).await;
    let order_id = order["order_id"].as_str().unwrap().to_string();
    let payment = initiate(&app, &token, &order_id).await;
    let (code, _) = callback(&app, payment["provider_ref"].as_str().unwrap(), "Success").await;
    assert_eq!(code, StatusCode::OK);

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/booking/{order_id}/cancel"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Cannot cancel a paid order");

    let response = app
        .request(
            Method::GET,
            &format!("/api/booking/{order_id}"),
            Some(&token),
            None,
        )
        .await;
    let detail = response_json(response).await;
    assert_eq!(detail["status"], "Paid", "state must be unchanged");
}

#[tokio::test]
async fn my_payments_is_scoped_and_newest_first() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(50000), 10, 4).await;
    let alice = app.register_and_login("alice", "pw1pw1").await;
    let bob = app.register_and_login("bob", "pw1pw1").await;

    let order = book(&app, &alice, ticket_type_id, 1).await;
    initiate(&app, &alice, order["order_id"].as_str().unwrap()).await;

    let response = app
        .request(Method::GET, "/api/payments/my", Some(&alice), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["status"], "Pending");
    assert!(body["data"][0]["order_code"].is_string());

    let response = app
        .request(Method::GET, "/api/payments/my", Some(&bob), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 0);
}
