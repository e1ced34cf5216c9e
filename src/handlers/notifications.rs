use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::errors::ServiceError;
use crate::services::notifications::NotificationView;
use crate::{AppState, ListQuery, MessageResponse, Paginated};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(my_notifications))
        .route("/:id/read", patch(mark_read))
}

/// The caller's notifications, newest first.
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("pageSize" = Option<u64>, Query, description = "Page size (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Own notifications", body = Paginated<NotificationView>),
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn my_notifications(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<NotificationView>>, ServiceError> {
    current.require_role(Role::User)?;
    let page = state
        .services
        .notifications
        .list_for_user(current.id(), &query)
        .await?;
    Ok(Json(page))
}

/// Mark one of the caller's notifications as read.
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read", body = MessageResponse),
        (status = 404, description = "Notification not found or not owned", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::User)?;
    state
        .services
        .notifications
        .mark_read(current.id(), id)
        .await?;
    Ok(Json(MessageResponse::new("Marked as read successfully")))
}
