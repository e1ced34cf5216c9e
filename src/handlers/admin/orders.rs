use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::errors::ServiceError;
use crate::services::orders::{
    AdminOrderDetail, AdminOrderFilter, AdminOrderRow, AdminUpdateOrderRequest, OrderDetail,
};
use crate::{AppState, ListQuery, MessageResponse, Paginated};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/:id", get(get_one).put(update).delete(delete_one))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<AdminOrderFilter>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<AdminOrderRow>>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.orders.admin_list(&filter, &query).await?))
}

async fn get_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminOrderDetail>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.orders.admin_detail(id).await?))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateOrderRequest>,
) -> Result<Json<OrderDetail>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.orders.admin_update(id, req).await?))
}

async fn delete_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    state.services.orders.admin_delete(id).await?;
    Ok(Json(MessageResponse::new("Deleted successfully")))
}
