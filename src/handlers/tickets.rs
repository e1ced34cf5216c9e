use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::errors::ServiceError;
use crate::services::tickets::{TicketDetail, TicketRow};
use crate::{AppState, ListQuery, Paginated};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/my-tickets", get(my_tickets))
        .route("/:id", get(ticket_detail))
}

/// The caller's tickets across all orders, newest issued first.
#[utoipa::path(
    get,
    path = "/api/tickets/my-tickets",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("pageSize" = Option<u64>, Query, description = "Page size (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Own tickets", body = Paginated<TicketRow>),
    ),
    security(("bearer_auth" = [])),
    tag = "Tickets"
)]
pub async fn my_tickets(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<TicketRow>>, ServiceError> {
    current.require_role(Role::User)?;
    let page = state
        .services
        .tickets
        .my_tickets(current.id(), &query)
        .await?;
    Ok(Json(page))
}

/// Single-ticket detail with the QR payload; ownership enforced.
#[utoipa::path(
    get,
    path = "/api/tickets/{id}",
    params(("id" = Uuid, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Ticket detail", body = TicketDetail),
        (status = 404, description = "Ticket not found or not owned", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Tickets"
)]
pub async fn ticket_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetail>, ServiceError> {
    current.require_role(Role::User)?;
    let detail = state.services.tickets.ticket_detail(current.id(), id).await?;
    Ok(Json(detail))
}
