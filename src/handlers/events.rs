use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::catalog::{EventDetail, EventListFilter, EventSummary};
use crate::{AppState, ListQuery, Paginated};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route("/:id", get(event_detail))
}

/// Public catalog browse over published events.
#[utoipa::path(
    get,
    path = "/api/events",
    params(
        ("hot" = Option<bool>, Query, description = "Only hot events"),
        ("new" = Option<bool>, Query, description = "Only new events"),
        ("category_id" = Option<Uuid>, Query, description = "Filter by category"),
        ("q" = Option<String>, Query, description = "Free-text filter on name and description"),
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("pageSize" = Option<u64>, Query, description = "Page size (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Published events", body = Paginated<EventSummary>),
    ),
    tag = "Catalog"
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventListFilter>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<EventSummary>>, ServiceError> {
    let page = state
        .services
        .catalog
        .list_published_events(&filter, &query)
        .await?;
    Ok(Json(page))
}

/// Public detail of a published event, with performers and ticket types.
#[utoipa::path(
    get,
    path = "/api/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event detail", body = EventDetail),
        (status = 404, description = "Event not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalog"
)]
pub async fn event_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventDetail>, ServiceError> {
    let detail = state.services.catalog.published_event_detail(id).await?;
    Ok(Json(detail))
}
