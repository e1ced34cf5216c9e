//! StagePass API library
//!
//! Ticket-booking backend: catalog browsing, order placement, simulated
//! payment settlement, and ticket issuance behind a role-gated REST API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

/// Shared application state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<auth::AuthService>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Hard cap on `pageSize` for every list endpoint.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Common query parameters for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(
        default = "default_page_size",
        rename = "pageSize",
        alias = "page_size"
    )]
    pub page_size: u64,
    pub q: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
            q: None,
        }
    }
}

impl ListQuery {
    /// Effective (page, page_size): 1-based page, size capped at
    /// [`MAX_PAGE_SIZE`].
    pub fn clamp(&self) -> (u64, u64) {
        (self.page.max(1), self.page_size.clamp(1, MAX_PAGE_SIZE))
    }

    /// Trimmed, non-empty free-text filter.
    pub fn term(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn default_page() -> u64 {
    1
}
fn default_page_size() -> u64 {
    20
}

/// List envelope: `{ total, page, pageSize, data }`.
#[derive(Debug, Serialize, ToSchema)]
pub struct Paginated<T> {
    pub total: u64,
    pub page: u64,
    #[serde(rename = "pageSize")]
    pub page_size: u64,
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(total: u64, page: u64, page_size: u64, data: Vec<T>) -> Self {
        Self {
            total,
            page,
            page_size,
            data,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The full `/api` surface.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", handlers::auth::routes())
        .nest("/profile", handlers::auth::profile_routes())
        .nest("/events", handlers::events::routes())
        .nest("/booking", handlers::booking::routes())
        .nest("/payments", handlers::payments::routes())
        .nest("/tickets", handlers::tickets::routes())
        .nest("/notifications", handlers::notifications::routes())
        .nest("/admin", handlers::admin::routes())
}

/// Root + health + API + docs, ready to be layered by the binary.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .merge(openapi::swagger_ui())
        .with_state(state)
}

async fn root() -> &'static str {
    "stagepass-api up"
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.db.ping().await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(json!({
        "status": db_status,
        "checks": { "database": db_status },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod list_query_tests {
    use super::*;

    #[test]
    fn page_size_is_capped_at_one_hundred() {
        let q = ListQuery {
            page: 0,
            page_size: 5000,
            q: None,
        };
        assert_eq!(q.clamp(), (1, MAX_PAGE_SIZE));
    }

    #[test]
    fn defaults_are_page_one_size_twenty() {
        let q = ListQuery::default();
        assert_eq!(q.clamp(), (1, 20));
    }

    #[test]
    fn blank_search_terms_are_ignored() {
        let q = ListQuery {
            q: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(q.term(), None);
    }
}
