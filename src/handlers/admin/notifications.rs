use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::entities::notification;
use crate::errors::ServiceError;
use crate::services::notifications::{
    AdminCreateNotificationRequest, AdminNotificationFilter, AdminUpdateNotificationRequest,
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
    Query(filter): Query<AdminNotificationFilter>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<notification::Model>>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(
        state
            .services
            .notifications
            .admin_list(&filter, &query)
            .await?,
    ))
}

async fn get_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<notification::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.notifications.admin_get(id).await?))
}

async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<AdminCreateNotificationRequest>,
) -> Result<(StatusCode, Json<notification::Model>), ServiceError> {
    current.require_role(Role::Admin)?;
    let created = state.services.notifications.admin_create(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateNotificationRequest>,
) -> Result<Json<notification::Model>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(state.services.notifications.admin_update(id, req).await?))
}

async fn delete_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    state.services.notifications.admin_delete(id).await?;
    Ok(Json(MessageResponse::new("Deleted successfully")))
}
