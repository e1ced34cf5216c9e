//! Test harness: an application router backed by a file-based SQLite
//! database in a temp directory, driven through `tower::ServiceExt::oneshot`.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use stagepass_api::{
    app_router,
    auth::{password, AuthService, Role},
    config::AppConfig,
    db,
    entities::{event, event_ticket_type, user},
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};

pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("stagepass_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only_32chars",
            "test",
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool).await.expect("migrations");
        let db = Arc::new(pool);

        let (event_tx, event_rx) = tokio::sync::mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth = Arc::new(AuthService::from_config(&cfg));
        let services = AppServices::new(db.clone(), event_sender.clone(), auth.clone(), &cfg);

        let state = AppState {
            db,
            config: cfg,
            auth,
            event_sender,
            services,
        };
        let router = app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _db_dir: dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Register through the API and log in, returning the bearer token.
    pub async fn register_and_login(&self, username: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "password": password,
                    "full_name": format!("{username} test"),
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "register {username}");

        self.login(username, password).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login {username}");
        let body = response_json(response).await;
        body["token"].as_str().expect("token").to_string()
    }

    /// Seed an Admin account directly and log in.
    pub async fn seed_admin(&self, username: &str, plain: &str) -> String {
        let now = Utc::now();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            password_hash: Set(password::hash_password(plain).expect("hash")),
            full_name: Set(format!("{username} admin")),
            email: Set(None),
            phone: Set(None),
            birth_date: Set(None),
            gender: Set(None),
            avatar_url: Set(None),
            address_line: Set(None),
            province_name: Set(None),
            district_name: Set(None),
            ward_name: Set(None),
            email_verified: Set(false),
            phone_verified: Set(false),
            role: Set(Role::Admin.to_string()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed admin");

        self.login(username, plain).await
    }

    /// Seed a published event with one ticket type and return their ids.
    pub async fn seed_ticket_type(
        &self,
        price: Decimal,
        total_quantity: i32,
        per_order_limit: i32,
    ) -> (Uuid, Uuid) {
        let now = Utc::now();
        let ev = event::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test Concert".to_string()),
            title: Set(Some("Test Concert Night".to_string())),
            description: Set(None),
            location: Set(Some("Arena 1".to_string())),
            start_time: Set(Some(now)),
            end_time: Set(Some(now)),
            banner_url: Set(None),
            category_id: Set(None),
            base_price: Set(Some(price)),
            is_hot: Set(false),
            is_new: Set(true),
            published: Set(true),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed event");

        let tt = event_ticket_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            event_id: Set(ev.id),
            name: Set("Standard".to_string()),
            price: Set(Some(price)),
            total_quantity: Set(total_quantity),
            sold_quantity: Set(0),
            per_order_limit: Set(per_order_limit),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed ticket type");

        (ev.id, tt.id)
    }

    pub async fn sold_quantity(&self, ticket_type_id: Uuid) -> i32 {
        use sea_orm::EntityTrait;
        event_ticket_type::Entity::find_by_id(ticket_type_id)
            .one(&*self.state.db)
            .await
            .expect("query ticket type")
            .expect("ticket type row")
            .sold_quantity
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
