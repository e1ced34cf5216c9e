use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::entities::event_ticket_type;
use crate::errors::ServiceError;
use crate::services::catalog::{TicketTypeInfo, TicketTypeRequest};
use crate::{AppState, ListQuery, MessageResponse, Paginated};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update).delete(delete_one))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    event_id: Option<Uuid>,
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<ListParams>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<TicketTypeInfo>>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(
        state
            .services
            .catalog
            .list_ticket_types(params.event_id, &query)
            .await?,
    ))
}

async fn get_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<event_ticket_type::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.catalog.get_ticket_type(id).await?))
}

async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<TicketTypeRequest>,
) -> Result<(StatusCode, Json<event_ticket_type::Model>), ServiceError> {
    current.require_role(Role::Admin)?;
    let created = state.services.catalog.create_ticket_type(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TicketTypeRequest>,
) -> Result<Json<event_ticket_type::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.catalog.update_ticket_type(id, req).await?))
}

async fn delete_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    state.services.catalog.delete_ticket_type(id).await?;
    Ok(Json(MessageResponse::new("Deleted successfully")))
}
