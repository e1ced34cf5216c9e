//! Admin management surface: uniform list/get/create/update/delete over the
//! catalog and operational tables, gated on the Admin role.

pub mod categories;
pub mod event_performers;
pub mod events;
pub mod notifications;
pub mod orders;
pub mod performers;
pub mod ticket_types;
pub mod tickets;
pub mod users;

use axum::Router;

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/categories", categories::routes())
        .nest("/events", events::routes())
        .nest("/performers", performers::routes())
        .nest("/event-performers", event_performers::routes())
        .nest("/ticket-types", ticket_types::routes())
        .nest("/orders", orders::routes())
        .nest("/tickets", tickets::routes())
        .nest("/users", users::routes())
        .nest("/notifications", notifications::routes())
}
