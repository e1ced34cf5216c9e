use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::entities::event;
use crate::errors::ServiceError;
use crate::services::catalog::{AdminEventFilter, AdminEventRow, EventRequest};
use crate::{AppState, ListQuery, MessageResponse, Paginated};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update).delete(delete_one))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<AdminEventFilter>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<AdminEventRow>>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(
        state
            .services
            .catalog
            .admin_list_events(&filter, &query)
            .await?,
    ))
}

async fn get_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<event::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.catalog.get_event(id).await?))
}

async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<EventRequest>,
) -> Result<(StatusCode, Json<event::Model>), ServiceError> {
    current.require_role(Role::Admin)?;
    let created = state.services.catalog.create_event(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<EventRequest>,
) -> Result<Json<event::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.catalog.update_event(id, req).await?))
}

async fn delete_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    state.services.catalog.delete_event(id).await?;
    Ok(Json(MessageResponse::new("Deleted successfully")))
}
