//! End-to-end order lifecycle: booking, quantity/limit validation, atomic
//! stock reservation, cancellation rules.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use stagepass_api::entities::order;

#[tokio::test]
async fn booking_creates_a_pending_order_with_one_item() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(100000), 100, 4).await;
    let token = app.register_and_login("alice", "pw1pw1").await;

    let response = app
        .request(
            Method::POST,
            "/api/booking",
            Some(&token),
            Some(json!({
                "ticket_type_id": ticket_type_id,
                "quantity": 2,
                "payment_method": "Momo",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["status"], "Pending");
    assert_eq!(body["payment_status"], "Unpaid");
    assert_eq!(body["total_amount"], "200000");
    assert!(body["order_code"].as_str().unwrap().starts_with("ORD"));

    // Reservation happened with the booking.
    assert_eq!(app.sold_quantity(ticket_type_id).await, 2);

    let order_id = body["order_id"].as_str().unwrap().to_string();
    let response = app
        .request(
            Method::GET,
            &format!("/api/booking/{order_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = response_json(response).await;
    let items = detail["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["unit_price"], "100000");
    assert_eq!(items[0]["subtotal"], "200000");
    assert_eq!(items[0]["event_name"], "Test Concert");
}

#[tokio::test]
async fn invalid_quantities_are_rejected_without_creating_orders() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(50000), 100, 4).await;
    let token = app.register_and_login("bob", "pw1pw1").await;

    for quantity in [0, -1, 5] {
        let response = app
            .request(
                Method::POST,
                "/api/booking",
                Some(&token),
                Some(json!({
                    "ticket_type_id": ticket_type_id,
                    "quantity": quantity,
                    "payment_method": "Momo",
                })),
            )
            .await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "quantity {quantity} should be rejected"
        );
        let body = response_json(response).await;
        assert_eq!(body["message"], "Invalid quantity");
    }

    let orders = order::Entity::find()
        .count(&*app.state.db)
        .await
        .expect("count");
    assert_eq!(orders, 0, "no order rows should exist");
    assert_eq!(app.sold_quantity(ticket_type_id).await, 0);
}

#[tokio::test]
async fn unknown_ticket_type_is_rejected() {
    let app = TestApp::new().await;
    let token = app.register_and_login("carol", "pw1pw1").await;

    let response = app
        .request(
            Method::POST,
            "/api/booking",
            Some(&token),
            Some(json!({
                "ticket_type_id": uuid::Uuid::new_v4(),
                "quantity": 1,
                "payment_method": "Momo",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Ticket type not found");
}

#[tokio::test]
async fn booking_past_remaining_stock_is_rejected() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(80000), 3, 3).await;
    let token = app.register_and_login("dave", "pw1pw1").await;

    let first = app
        .request(
            Method::POST,
            "/api/booking",
            Some(&token),
            Some(json!({
                "ticket_type_id": ticket_type_id,
                "quantity": 2,
                "payment_method": "Momo",
            })),
        )
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    // Two left minus two sold: a further two-ticket booking must fail.
    let second = app
        .request(
            Method::POST,
            "/api/booking",
            Some(&token),
            Some(json!({
                "ticket_type_id": ticket_type_id,
                "quantity": 2,
                "payment_method": "Momo",
            })),
        )
        .await;
    assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // The last unit is still available.
    let third = app
        .request(
            Method::POST,
            "/api/booking",
            Some(&token),
            Some(json!({
                "ticket_type_id": ticket_type_id,
                "quantity": 1,
                "payment_method": "Momo",
            })),
        )
        .await;
    assert_eq!(third.status(), StatusCode::CREATED);
    assert_eq!(app.sold_quantity(ticket_type_id).await, 3);
}

#[tokio::test]
async fn cancelling_releases_stock_and_is_not_repeatable() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(60000), 10, 4).await;
    let token = app.register_and_login("erin", "pw1pw1").await;

    let response = app
        .request(
            Method::POST,
            "/api/booking",
            Some(&token),
            Some(json!({
                "ticket_type_id": ticket_type_id,
                "quantity": 3,
                "payment_method": "Momo",
            })),
        )
        .await;
    let order_id = response_json(response).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(app.sold_quantity(ticket_type_id).await, 3);

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/booking/{order_id}/cancel"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.sold_quantity(ticket_type_id).await, 0);

    // Idempotent rejection, not re-cancellation.
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
    assert_eq!(body["message"], "Order already cancelled");
    assert_eq!(app.sold_quantity(ticket_type_id).await, 0);

    let response = app
        .request(
            Method::GET,
            &format!("/api/booking/{order_id}"),
            Some(&token),
            None,
        )
        .await;
    let detail = response_json(response).await;
    assert_eq!(detail["status"], "Cancelled");
    assert!(detail["cancelled_at"].is_string());
}

#[tokio::test]
async fn orders_are_scoped_to_their_owner() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(70000), 10, 4).await;
    let owner = app.register_and_login("frank", "pw1pw1").await;
    let other = app.register_and_login("grace", "pw1pw1").await;

    let response = app
        .request(
            Method::POST,
            "/api/booking",
            Some(&owner),
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
            Method::GET,
            &format!("/api/booking/{order_id}"),
            Some(&other),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/booking/{order_id}/cancel"),
            Some(&other),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(Method::GET, "/api/booking/my-orders", Some(&other), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn booking_requires_the_user_role() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(70000), 10, 4).await;

    // Anonymous.
    let response = app
        .request(
            Method::POST,
            "/api/booking",
            None,
            Some(json!({
                "ticket_type_id": ticket_type_id,
                "quantity": 1,
                "payment_method": "Momo",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Role gating is an exact match: admins do not book.
    let admin = app.seed_admin("root", "adminpw").await;
    let response = app
        .request(
            Method::POST,
            "/api/booking",
            Some(&admin),
            Some(json!({
                "ticket_type_id": ticket_type_id,
                "quantity": 1,
                "payment_method": "Momo",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn my_orders_lists_newest_first_with_items() {
    let app = TestApp::new().await;
    let (_, ticket_type_id) = app.seed_ticket_type(dec!(40000), 10, 4).await;
    let token = app.register_and_login("henry", "pw1pw1").await;

    for quantity in [1, 2] {
        let response = app
            .request(
                Method::POST,
                "/api/booking",
                Some(&token),
                Some(json!({
                    "ticket_type_id": ticket_type_id,
                    "quantity": quantity,
                    "payment_method": "Momo",
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .request(Method::GET, "/api/booking/my-orders", Some(&token), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["page"], 1);
    assert_eq!(body["pageSize"], 20);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["items"].as_array().unwrap().len(), 1);
}
