use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::errors::ServiceError;
use crate::services::orders::{
    CreateOrderRequest, OrderCreatedResponse, OrderDetail, OrderSummary,
};
use crate::{AppState, ListQuery, MessageResponse, Paginated};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/my-orders", get(my_orders))
        .route("/:id", get(order_detail))
        .route("/:id/cancel", patch(cancel_order))
}

/// Book tickets: one order for one ticket-type selection.
#[utoipa::path(
    post,
    path = "/api/booking",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderCreatedResponse),
        (status = 400, description = "Unknown ticket type or invalid quantity", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough tickets left", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Booking"
)]
pub async fn create_order(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ServiceError> {
    current.require_role(Role::User)?;
    let created = state.services.orders.create_order(current.id(), req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// The caller's orders, newest first.
#[utoipa::path(
    get,
    path = "/api/booking/my-orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("pageSize" = Option<u64>, Query, description = "Page size (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Own orders", body = Paginated<OrderSummary>),
    ),
    security(("bearer_auth" = [])),
    tag = "Booking"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<OrderSummary>>, ServiceError> {
    current.require_role(Role::User)?;
    let page = state
        .services
        .orders
        .list_my_orders(current.id(), &query)
        .await?;
    Ok(Json(page))
}

/// Detail of one of the caller's orders: items, tickets, transactions.
#[utoipa::path(
    get,
    path = "/api/booking/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order detail", body = OrderDetail),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Booking"
)]
pub async fn order_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetail>, ServiceError> {
    current.require_role(Role::User)?;
    let detail = state.services.orders.order_detail(current.id(), id).await?;
    Ok(Json(detail))
}

/// Cancel one of the caller's orders; rejected once paid or cancelled.
#[utoipa::path(
    patch,
    path = "/api/booking/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = MessageResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already paid or cancelled", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Booking"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::User)?;
    state.services.orders.cancel_order(current.id(), id).await?;
    Ok(Json(MessageResponse::new("Order cancelled")))
}
