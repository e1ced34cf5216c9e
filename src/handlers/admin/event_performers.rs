use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{CurrentUser, Role};
use crate::entities::event_performer;
use crate::errors::ServiceError;
use crate::services::catalog::{AssociatePerformerRequest, EventPerformerInfo};
use crate::{AppState, MessageResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(associate))
        .route("/:event_id/:performer_id", delete(dissociate))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    event_id: Uuid,
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<EventPerformerInfo>>, ServiceError> {
    current.require_role(Role::Admin)?;
    Ok(Json(
        state
            .services
            .catalog
            .list_event_performers(params.event_id)
            .await?,
    ))
}

async fn associate(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<AssociatePerformerRequest>,
) -> Result<(StatusCode, Json<event_performer::Model>), ServiceError> {
    current.require_role(Role::Admin)?;
    let created = state.services.catalog.associate_performer(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn dissociate(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((event_id, performer_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, ServiceError> {
    current.require_role(Role::Admin)?;
    state
        .services
        .catalog
        .dissociate_performer(event_id, performer_id)
        .await?;
    Ok(Json(MessageResponse::new("Deleted successfully")))
}
