pub mod admin;
pub mod auth;
pub mod booking;
pub mod events;
pub mod notifications;
pub mod payments;
pub mod tickets;

use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::catalog::CatalogService;
use crate::services::notifications::NotificationService;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentService;
use crate::services::tickets::TicketService;
use crate::services::users::UserService;

/// Services layer that encapsulates the business logic used by handlers.
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<UserService>,
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub tickets: Arc<TicketService>,
    pub notifications: Arc<NotificationService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        auth: Arc<AuthService>,
        cfg: &AppConfig,
    ) -> Self {
        let users = Arc::new(UserService::new(db.clone(), auth, event_sender.clone()));
        let catalog = Arc::new(CatalogService::new(db.clone()));
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
        let tickets = Arc::new(TicketService::new(db.clone()));
        let notifications = Arc::new(NotificationService::new(db.clone()));
        let payments = Arc::new(PaymentService::new(
            db,
            event_sender,
            tickets.clone(),
            notifications.clone(),
            cfg,
        ));

        Self {
            users,
            catalog,
            orders,
            payments,
            tickets,
            notifications,
        }
    }
}
