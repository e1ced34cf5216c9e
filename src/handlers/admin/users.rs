use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::errors::ServiceError;
use crate::services::users::{
    AdminCreateUserRequest, AdminUpdateUserRequest, ProfileResponse,
};
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
) -> Result<Json<Paginated<ProfileResponse>>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.users.admin_list(&query).await?))
}

async fn get_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.users.admin_get(id).await?))
}

async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<AdminCreateUserRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>), ServiceError> {
    current.require_role(Role::Admin)?;
    let created = state.services.users.admin_create(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateUserRequest>,
) -> Result<Json<ProfileResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.users.admin_update(id, req).await?))
}

async fn delete_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    state.services.users.admin_delete(id).await?;
    Ok(Json(MessageResponse::new("Deleted successfully")))
}
