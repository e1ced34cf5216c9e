use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::entities::ticket;
use crate::errors::ServiceError;
use crate::services::tickets::{
    AdminTicketFilter, AdminUpdateTicketRequest, ScanOutcome, ScanRequest, TicketRow,
};
use crate::{AppState, ListQuery, MessageResponse, Paginated};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/:id", get(get_one).put(update).delete(delete_one))
        .route("/:id/scan", post(scan))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<AdminTicketFilter>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<TicketRow>>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.tickets.admin_list(&filter, &query).await?))
}

async fn get_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ticket::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.tickets.admin_get(id).await?))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateTicketRequest>,
) -> Result<Json<ticket::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.tickets.admin_update(id, req).await?))
}

async fn delete_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    state.services.tickets.admin_delete(id).await?;
    Ok(Json(MessageResponse::new("Deleted successfully")))
}

/// Gate scan validation: flips an Issued ticket to Used on its first valid
/// scan and appends to the scan log either way.
async fn scan(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<ScanOutcome>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.tickets.scan(id, req).await?))
}
