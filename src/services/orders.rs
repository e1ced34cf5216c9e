use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{
    event, event_ticket_type, order, order_item, payment_transaction, ticket, user,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::{ListQuery, Paginated};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum PaymentState {
    Unpaid,
    Paid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderCreatedResponse {
    pub order_id: Uuid,
    pub order_code: String,
    pub status: String,
    pub payment_status: String,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemView {
    pub id: Uuid,
    pub event_id: Uuid,
    pub event_name: Option<String>,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_code: String,
    pub status: String,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IssuedTicketView {
    pub id: Uuid,
    pub ticket_code: String,
    pub status: String,
    pub qr_image_url: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetailItem {
    pub id: Uuid,
    pub event_id: Uuid,
    pub event_name: Option<String>,
    pub event_location: Option<String>,
    pub event_start_time: Option<DateTime<Utc>>,
    pub event_end_time: Option<DateTime<Utc>>,
    pub ticket_type_id: Uuid,
    pub ticket_type_name: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
    pub tickets: Vec<IssuedTicketView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionView {
    pub id: Uuid,
    pub provider: String,
    pub provider_ref: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub id: Uuid,
    pub order_code: String,
    pub status: String,
    pub payment_method: Option<String>,
    pub payment_status: String,
    pub total_amount: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderDetailItem>,
    pub transactions: Vec<TransactionView>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminOrderFilter {
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminOrderRow {
    pub id: Uuid,
    pub order_code: String,
    pub user_name: Option<String>,
    pub total_amount: Decimal,
    pub status: String,
    pub payment_method: Option<String>,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AdminOrderDetail {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub user_full_name: Option<String>,
    #[serde(flatten)]
    pub order: OrderDetail,
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateOrderRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub payment_method: Option<String>,
    pub note: Option<String>,
}

/// Order workflow: booking with atomic stock reservation, caller-scoped
/// projections, cancellation, and the admin order surface.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    events: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Create an order for one ticket-type selection.
    ///
    /// The stock reservation is a conditional increment of `sold_quantity`
    /// executed in the same transaction as the order and item inserts, so
    /// two concurrent bookings for the last unit cannot both succeed and an
    /// order is never visible without its item.
    #[instrument(skip(self, req), fields(user_id = %user_id, ticket_type_id = %req.ticket_type_id))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        req: CreateOrderRequest,
    ) -> Result<OrderCreatedResponse, ServiceError> {
        req.validate()?;

        let txn = self.db.begin().await?;

        let ticket_type = event_ticket_type::Entity::find_by_id(req.ticket_type_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::ValidationError("Ticket type not found".to_string()))?;

        if req.quantity <= 0 || req.quantity > ticket_type.per_order_limit {
            return Err(ServiceError::ValidationError("Invalid quantity".to_string()));
        }

        let now = Utc::now();
        let reserved = event_ticket_type::Entity::update_many()
            .col_expr(
                event_ticket_type::Column::SoldQuantity,
                Expr::col(event_ticket_type::Column::SoldQuantity).add(req.quantity),
            )
            .col_expr(event_ticket_type::Column::UpdatedAt, Expr::value(now))
            .filter(event_ticket_type::Column::Id.eq(ticket_type.id))
            .filter(
                event_ticket_type::Column::SoldQuantity
                    .lte(ticket_type.total_quantity - req.quantity),
            )
            .exec(&txn)
            .await?;
        if reserved.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "Not enough tickets left for {}",
                ticket_type.name
            )));
        }

        let unit_price = ticket_type.price.unwrap_or(Decimal::ZERO);
        let subtotal = unit_price * Decimal::from(req.quantity);

        let created = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_code: Set(generate_order_code(now)),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending.to_string()),
            payment_method: Set(Some(req.payment_method)),
            payment_status: Set(PaymentState::Unpaid.to_string()),
            total_amount: Set(subtotal),
            note: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            paid_at: Set(None),
            cancelled_at: Set(None),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(created.id),
            event_id: Set(ticket_type.event_id),
            ticket_type_id: Set(ticket_type.id),
            quantity: Set(req.quantity),
            unit_price: Set(unit_price),
            subtotal: Set(subtotal),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(order_id = %created.id, order_code = %created.order_code, "order created");
        self.events
            .publish(Event::OrderCreated {
                order_id: created.id,
                order_code: created.order_code.clone(),
            })
            .await;

        Ok(OrderCreatedResponse {
            order_id: created.id,
            order_code: created.order_code,
            status: created.status,
            payment_status: created.payment_status,
            total_amount: created.total_amount,
        })
    }

    pub async fn list_my_orders(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<Paginated<OrderSummary>, ServiceError> {
        let (page, page_size) = query.clamp();

        let paginator = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order = self.load_items(&*self.db, order_ids).await?;

        let data = orders
            .into_iter()
            .map(|o| {
                let items = items_by_order.remove(&o.id).unwrap_or_default();
                OrderSummary {
                    id: o.id,
                    order_code: o.order_code,
                    status: o.status,
                    payment_status: o.payment_status,
                    payment_method: o.payment_method,
                    total_amount: o.total_amount,
                    created_at: o.created_at,
                    updated_at: o.updated_at,
                    items,
                }
            })
            .collect();

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn order_detail(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let found = order::Entity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        self.build_detail(found).await
    }

    /// Cancel an unpaid, not-yet-cancelled order owned by the caller and
    /// release its reserved stock.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let found = order::Entity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if found.payment_status == PaymentState::Paid.to_string() {
            return Err(ServiceError::Conflict(
                "Cannot cancel a paid order".to_string(),
            ));
        }
        if found.status == OrderStatus::Cancelled.to_string() {
            return Err(ServiceError::Conflict("Order already cancelled".to_string()));
        }

        let now = Utc::now();
        let cancelled = order::Entity::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::Cancelled.to_string()),
            )
            .col_expr(order::Column::CancelledAt, Expr::value(now))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .col_expr(order::Column::Version, Expr::col(order::Column::Version).add(1))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending.to_string()))
            .exec(&txn)
            .await?;
        if cancelled.rows_affected == 0 {
            // Lost a race with a concurrent cancel or settlement.
            return Err(ServiceError::Conflict(
                "Order can no longer be cancelled".to_string(),
            ));
        }

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        for item in items {
            event_ticket_type::Entity::update_many()
                .col_expr(
                    event_ticket_type::Column::SoldQuantity,
                    Expr::col(event_ticket_type::Column::SoldQuantity).sub(item.quantity),
                )
                .col_expr(event_ticket_type::Column::UpdatedAt, Expr::value(now))
                .filter(event_ticket_type::Column::Id.eq(item.ticket_type_id))
                .filter(event_ticket_type::Column::SoldQuantity.gte(item.quantity))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        info!(%order_id, "order cancelled");
        self.events.publish(Event::OrderCancelled { order_id }).await;

        Ok(())
    }

    // -- admin surface ------------------------------------------------------

    pub async fn admin_list(
        &self,
        filter: &AdminOrderFilter,
        query: &ListQuery,
    ) -> Result<Paginated<AdminOrderRow>, ServiceError> {
        let (page, page_size) = query.clamp();

        let mut select = order::Entity::find().find_also_related(user::Entity);
        if let Some(q) = query.term() {
            select = select.filter(
                Condition::any()
                    .add(order::Column::OrderCode.contains(q.as_str()))
                    .add(user::Column::FullName.contains(q.as_str())),
            );
        }
        if let Some(status) = filter.status.as_deref() {
            select = select.filter(order::Column::Status.eq(status));
        }
        if let Some(payment_status) = filter.payment_status.as_deref() {
            select = select.filter(order::Column::PaymentStatus.eq(payment_status));
        }

        let paginator = select
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let data = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(|(o, u)| AdminOrderRow {
                id: o.id,
                order_code: o.order_code,
                user_name: u.map(|u| u.full_name),
                total_amount: o.total_amount,
                status: o.status,
                payment_method: o.payment_method,
                payment_status: o.payment_status,
                created_at: o.created_at,
                paid_at: o.paid_at,
            })
            .collect();

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn admin_detail(&self, order_id: Uuid) -> Result<AdminOrderDetail, ServiceError> {
        let (found, owner) = order::Entity::find_by_id(order_id)
            .find_also_related(user::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let user_id = found.user_id;
        let order = self.build_detail(found).await?;
        Ok(AdminOrderDetail {
            user_id,
            username: owner.as_ref().map(|u| u.username.clone()),
            user_full_name: owner.map(|u| u.full_name),
            order,
        })
    }

    pub async fn admin_update(
        &self,
        order_id: Uuid,
        req: AdminUpdateOrderRequest,
    ) -> Result<OrderDetail, ServiceError> {
        let found = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let status = match req.status.as_deref() {
            None => None,
            Some(raw) => Some(raw.parse::<OrderStatus>().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown order status: {raw}"))
            })?),
        };
        let payment_status = match req.payment_status.as_deref() {
            None => None,
            Some(raw) => Some(raw.parse::<PaymentState>().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown payment status: {raw}"))
            })?),
        };

        let version = found.version;
        let mut active: order::ActiveModel = found.into();
        if let Some(s) = status {
            active.status = Set(s.to_string());
        }
        if let Some(p) = payment_status {
            active.payment_status = Set(p.to_string());
        }
        if let Some(m) = req.payment_method {
            active.payment_method = Set(Some(m));
        }
        if let Some(n) = req.note {
            active.note = Set(Some(n));
        }
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active.update(&*self.db).await?;
        self.build_detail(updated).await
    }

    pub async fn admin_delete(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let found = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let item_ids: Vec<Uuid> = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();

        if !item_ids.is_empty() {
            ticket::Entity::delete_many()
                .filter(ticket::Column::OrderItemId.is_in(item_ids))
                .exec(&txn)
                .await?;
        }
        payment_transaction::Entity::delete_many()
            .filter(payment_transaction::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        order::Entity::delete_by_id(found.id).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    // -- projection helpers -------------------------------------------------

    async fn load_items<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, Vec<OrderItemView>>, ServiceError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(conn)
            .await?;

        let event_ids: Vec<Uuid> = items.iter().map(|i| i.event_id).collect();
        let event_names: HashMap<Uuid, String> = if event_ids.is_empty() {
            HashMap::new()
        } else {
            event::Entity::find()
                .filter(event::Column::Id.is_in(event_ids))
                .all(conn)
                .await?
                .into_iter()
                .map(|e| (e.id, e.name))
                .collect()
        };

        let mut grouped: HashMap<Uuid, Vec<OrderItemView>> = HashMap::new();
        for item in items {
            grouped.entry(item.order_id).or_default().push(OrderItemView {
                id: item.id,
                event_id: item.event_id,
                event_name: event_names.get(&item.event_id).cloned(),
                ticket_type_id: item.ticket_type_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal,
            });
        }
        Ok(grouped)
    }

    async fn build_detail(&self, found: order::Model) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(found.id))
            .all(db)
            .await?;

        let event_ids: Vec<Uuid> = items.iter().map(|i| i.event_id).collect();
        let events: HashMap<Uuid, event::Model> = if event_ids.is_empty() {
            HashMap::new()
        } else {
            event::Entity::find()
                .filter(event::Column::Id.is_in(event_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|e| (e.id, e))
                .collect()
        };

        let type_ids: Vec<Uuid> = items.iter().map(|i| i.ticket_type_id).collect();
        let type_names: HashMap<Uuid, String> = if type_ids.is_empty() {
            HashMap::new()
        } else {
            event_ticket_type::Entity::find()
                .filter(event_ticket_type::Column::Id.is_in(type_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|t| (t.id, t.name))
                .collect()
        };

        let item_ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        let mut tickets_by_item: HashMap<Uuid, Vec<IssuedTicketView>> = HashMap::new();
        if !item_ids.is_empty() {
            let tickets = ticket::Entity::find()
                .filter(ticket::Column::OrderItemId.is_in(item_ids))
                .all(db)
                .await?;
            for t in tickets {
                tickets_by_item
                    .entry(t.order_item_id)
                    .or_default()
                    .push(IssuedTicketView {
                        id: t.id,
                        ticket_code: t.ticket_code,
                        status: t.status,
                        qr_image_url: t.qr_image_url,
                        issued_at: t.issued_at,
                        used_at: t.used_at,
                        cancelled_at: t.cancelled_at,
                    });
            }
        }

        let transactions = payment_transaction::Entity::find()
            .filter(payment_transaction::Column::OrderId.eq(found.id))
            .order_by_desc(payment_transaction::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|t| TransactionView {
                id: t.id,
                provider: t.provider,
                provider_ref: t.provider_ref,
                amount: t.amount,
                currency: t.currency,
                status: t.status,
                created_at: t.created_at,
                updated_at: t.updated_at,
            })
            .collect();

        let detail_items = items
            .into_iter()
            .map(|item| {
                let ev = events.get(&item.event_id);
                OrderDetailItem {
                    id: item.id,
                    event_id: item.event_id,
                    event_name: ev.map(|e| e.name.clone()),
                    event_location: ev.and_then(|e| e.location.clone()),
                    event_start_time: ev.and_then(|e| e.start_time),
                    event_end_time: ev.and_then(|e| e.end_time),
                    ticket_type_id: item.ticket_type_id,
                    ticket_type_name: type_names.get(&item.ticket_type_id).cloned(),
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    subtotal: item.subtotal,
                    tickets: tickets_by_item.remove(&item.id).unwrap_or_default(),
                }
            })
            .collect();

        Ok(OrderDetail {
            id: found.id,
            order_code: found.order_code,
            status: found.status,
            payment_method: found.payment_method,
            payment_status: found.payment_status,
            total_amount: found.total_amount,
            note: found.note,
            created_at: found.created_at,
            updated_at: found.updated_at,
            paid_at: found.paid_at,
            cancelled_at: found.cancelled_at,
            items: detail_items,
            transactions,
        })
    }
}

/// Human-facing order code: a UTC timestamp with a short random suffix so
/// the unique index holds under concurrent booking.
fn generate_order_code(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("ORD{}{:04}", now.format("%Y%m%d%H%M%S%3f"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn order_code_is_timestamp_derived() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();
        let code = generate_order_code(at);
        assert!(code.starts_with("ORD20250314150926"));
        // timestamp (17 digits incl. millis) + 4-digit suffix
        assert_eq!(code.len(), "ORD".len() + 17 + 4);
    }

    #[test]
    fn order_status_round_trips_through_strings() {
        assert_eq!(OrderStatus::Pending.to_string(), "Pending");
        assert_eq!("Cancelled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert_eq!(PaymentState::Unpaid.to_string(), "Unpaid");
    }
}
