use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::entities::performer;
use crate::errors::ServiceError;
use crate::services::catalog::PerformerRequest;
use crate::{AppState, ListQuery, MessageResponse, Paginated};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update).delete(delete_one))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<performer::Model>>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.catalog.list_performers(&query).await?))
}

async fn get_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<performer::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.catalog.get_performer(id).await?))
}

async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<PerformerRequest>,
) -> Result<(StatusCode, Json<performer::Model>), ServiceError> {
    current.require_role(Role::Admin)?;
    let created = state.services.catalog.create_performer(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<PerformerRequest>,
) -> Result<Json<performer::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.catalog.update_performer(id, req).await?))
}

async fn delete_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    state.services.catalog.delete_performer(id).await?;
    Ok(Json(MessageResponse::new("Deleted successfully")))
}
