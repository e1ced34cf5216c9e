use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::entities::category;
use crate::errors::ServiceError;
use crate::services::catalog::CategoryRequest;
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
) -> Result<Json<Paginated<category::Model>>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.catalog.list_categories(&query).await?))
}

async fn get_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<category::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.catalog.get_category(id).await?))
}

async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<category::Model>), ServiceError> {
    current.require_role(Role::Admin)?;
    let created = state.services.catalog.create_category(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CategoryRequest>,
) -> Result<Json<category::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.catalog.update_category(id, req).await?))
}

async fn delete_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    state.services.catalog.delete_category(id).await?;
    Ok(Json(MessageResponse::new("Deleted successfully")))
}
