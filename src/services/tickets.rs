use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{event, event_ticket_type, order, order_item, ticket, ticket_scan};
use crate::errors::ServiceError;
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
pub enum TicketStatus {
    Issued,
    Used,
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
pub enum ScanResult {
    Valid,
    AlreadyUsed,
    Cancelled,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketRow {
    pub id: Uuid,
    pub ticket_code: String,
    pub event_name: Option<String>,
    pub ticket_type_name: Option<String>,
    pub status: String,
    pub qr_image_url: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketDetail {
    pub id: Uuid,
    pub ticket_code: String,
    pub event_name: Option<String>,
    pub event_location: Option<String>,
    pub event_time: Option<DateTime<Utc>>,
    pub ticket_type_name: Option<String>,
    pub qr_payload: Option<String>,
    pub qr_image_url: Option<String>,
    pub status: String,
    pub issued_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    pub gate: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScanOutcome {
    pub ticket_id: Uuid,
    pub ticket_code: String,
    pub result: String,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminTicketFilter {
    pub event_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateTicketRequest {
    pub status: Option<String>,
    pub qr_image_url: Option<String>,
}

/// Ticketing component: issuance downstream of payment settlement, the
/// caller-scoped ticket surface, scan validation, and admin CRUD.
#[derive(Clone)]
pub struct TicketService {
    db: Arc<DbPool>,
}

impl TicketService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Issue tickets for every item of a paid order, exactly once per item.
    ///
    /// Items that already have tickets are skipped, which makes re-delivery
    /// of a settlement callback a no-op. Returns the number of tickets
    /// created by this invocation.
    pub async fn issue_for_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(conn)
            .await?;

        let now = Utc::now();
        let mut issued = 0u64;
        for item in items {
            let existing = ticket::Entity::find()
                .filter(ticket::Column::OrderItemId.eq(item.id))
                .count(conn)
                .await?;
            if existing > 0 {
                continue;
            }

            for _ in 0..item.quantity {
                let code = format!("TKT-{}", Uuid::new_v4().simple());
                let qr_payload = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", code, item.event_id));
                ticket::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    ticket_code: Set(code),
                    order_item_id: Set(item.id),
                    event_id: Set(item.event_id),
                    ticket_type_id: Set(item.ticket_type_id),
                    qr_payload: Set(Some(qr_payload)),
                    qr_image_url: Set(None),
                    status: Set(TicketStatus::Issued.to_string()),
                    issued_at: Set(now),
                    used_at: Set(None),
                    cancelled_at: Set(None),
                }
                .insert(conn)
                .await?;
                issued += 1;
            }
        }

        if issued > 0 {
            info!(%order_id, issued, "tickets issued");
        }
        Ok(issued)
    }

    pub async fn my_tickets(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<Paginated<TicketRow>, ServiceError> {
        let (page, page_size) = query.clamp();

        let paginator = ticket::Entity::find()
            .join(JoinType::InnerJoin, ticket::Relation::OrderItem.def())
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(ticket::Column::IssuedAt)
            .paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let tickets = paginator.fetch_page(page - 1).await?;

        let (event_names, type_names) = self.name_maps(&tickets).await?;
        let data = tickets
            .into_iter()
            .map(|t| TicketRow {
                id: t.id,
                ticket_code: t.ticket_code,
                event_name: event_names.get(&t.event_id).cloned(),
                ticket_type_name: type_names.get(&t.ticket_type_id).cloned(),
                status: t.status,
                qr_image_url: t.qr_image_url,
                issued_at: t.issued_at,
                used_at: t.used_at,
                cancelled_at: t.cancelled_at,
            })
            .collect();

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn ticket_detail(
        &self,
        user_id: Uuid,
        ticket_id: Uuid,
    ) -> Result<TicketDetail, ServiceError> {
        let not_owned =
            || ServiceError::NotFound("Ticket not found or not owned by user".to_string());

        let found = ticket::Entity::find_by_id(ticket_id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_owned)?;

        // Ownership runs through the item's order.
        let item = order_item::Entity::find_by_id(found.order_item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_owned)?;
        let owner = order::Entity::find_by_id(item.order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_owned)?;
        if owner.user_id != user_id {
            return Err(not_owned());
        }

        let ev = event::Entity::find_by_id(found.event_id).one(&*self.db).await?;
        let tt = event_ticket_type::Entity::find_by_id(found.ticket_type_id)
            .one(&*self.db)
            .await?;

        Ok(TicketDetail {
            id: found.id,
            ticket_code: found.ticket_code,
            event_name: ev.as_ref().map(|e| e.name.clone()),
            event_location: ev.as_ref().and_then(|e| e.location.clone()),
            event_time: ev.and_then(|e| e.start_time),
            ticket_type_name: tt.map(|t| t.name),
            qr_payload: found.qr_payload,
            qr_image_url: found.qr_image_url,
            status: found.status,
            issued_at: found.issued_at,
            used_at: found.used_at,
            cancelled_at: found.cancelled_at,
        })
    }

    /// Validate a ticket at the gate. The first valid scan flips the ticket
    /// to Used; every attempt, valid or not, lands in the append-only scan
    /// log.
    #[instrument(skip(self, req), fields(ticket_id = %ticket_id))]
    pub async fn scan(
        &self,
        ticket_id: Uuid,
        req: ScanRequest,
    ) -> Result<ScanOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let found = ticket::Entity::find_by_id(ticket_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Ticket not found".to_string()))?;

        let status: TicketStatus = found.status.parse().map_err(|_| {
            ServiceError::InternalError(format!("ticket {ticket_id} has unknown status"))
        })?;

        let now = Utc::now();
        let result = match status {
            TicketStatus::Cancelled => ScanResult::Cancelled,
            TicketStatus::Used => ScanResult::AlreadyUsed,
            TicketStatus::Issued => {
                let flipped = ticket::Entity::update_many()
                    .col_expr(
                        ticket::Column::Status,
                        Expr::value(TicketStatus::Used.to_string()),
                    )
                    .col_expr(ticket::Column::UsedAt, Expr::value(now))
                    .filter(ticket::Column::Id.eq(ticket_id))
                    .filter(ticket::Column::Status.eq(TicketStatus::Issued.to_string()))
                    .exec(&txn)
                    .await?;
                if flipped.rows_affected > 0 {
                    ScanResult::Valid
                } else {
                    // A concurrent scan won the transition.
                    ScanResult::AlreadyUsed
                }
            }
        };

        ticket_scan::ActiveModel {
            id: Set(Uuid::new_v4()),
            ticket_id: Set(ticket_id),
            scanned_at: Set(now),
            gate: Set(req.gate),
            device_id: Set(req.device_id),
            result: Set(result.to_string()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(ticket_code = %found.ticket_code, %result, "ticket scanned");
        Ok(ScanOutcome {
            ticket_id,
            ticket_code: found.ticket_code,
            result: result.to_string(),
            scanned_at: now,
        })
    }

    // -- admin surface ------------------------------------------------------

    pub async fn admin_list(
        &self,
        filter: &AdminTicketFilter,
        query: &ListQuery,
    ) -> Result<Paginated<TicketRow>, ServiceError> {
        let (page, page_size) = query.clamp();

        let mut select = ticket::Entity::find().order_by_desc(ticket::Column::IssuedAt);
        if let Some(event_id) = filter.event_id {
            select = select.filter(ticket::Column::EventId.eq(event_id));
        }
        if let Some(status) = filter.status.as_deref() {
            select = select.filter(ticket::Column::Status.eq(status));
        }
        if let Some(q) = query.term() {
            select = select.filter(ticket::Column::TicketCode.contains(q.as_str()));
        }

        let paginator = select.paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let tickets = paginator.fetch_page(page - 1).await?;

        let (event_names, type_names) = self.name_maps(&tickets).await?;
        let data = tickets
            .into_iter()
            .map(|t| TicketRow {
                id: t.id,
                ticket_code: t.ticket_code,
                event_name: event_names.get(&t.event_id).cloned(),
                ticket_type_name: type_names.get(&t.ticket_type_id).cloned(),
                status: t.status,
                qr_image_url: t.qr_image_url,
                issued_at: t.issued_at,
                used_at: t.used_at,
                cancelled_at: t.cancelled_at,
            })
            .collect();

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn admin_get(&self, id: Uuid) -> Result<ticket::Model, ServiceError> {
        ticket::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Ticket not found".to_string()))
    }

    pub async fn admin_update(
        &self,
        id: Uuid,
        req: AdminUpdateTicketRequest,
    ) -> Result<ticket::Model, ServiceError> {
        let found = self.admin_get(id).await?;

        let status = match req.status.as_deref() {
            None => None,
            Some(raw) => Some(raw.parse::<TicketStatus>().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown ticket status: {raw}"))
            })?),
        };

        let now = Utc::now();
        let mut active: ticket::ActiveModel = found.into();
        if let Some(s) = status {
            active.status = Set(s.to_string());
            match s {
                TicketStatus::Used => active.used_at = Set(Some(now)),
                TicketStatus::Cancelled => active.cancelled_at = Set(Some(now)),
                TicketStatus::Issued => {
                    active.used_at = Set(None);
                    active.cancelled_at = Set(None);
                }
            }
        }
        if let Some(url) = req.qr_image_url {
            active.qr_image_url = Set(Some(url));
        }

        Ok(active.update(&*self.db).await?)
    }

    pub async fn admin_delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        ticket_scan::Entity::delete_many()
            .filter(ticket_scan::Column::TicketId.eq(id))
            .exec(&txn)
            .await?;
        let res = ticket::Entity::delete_by_id(id).exec(&txn).await?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound("Ticket not found".to_string()));
        }
        txn.commit().await?;
        Ok(())
    }

    async fn name_maps(
        &self,
        tickets: &[ticket::Model],
    ) -> Result<(HashMap<Uuid, String>, HashMap<Uuid, String>), ServiceError> {
        let event_ids: Vec<Uuid> = tickets.iter().map(|t| t.event_id).collect();
        let type_ids: Vec<Uuid> = tickets.iter().map(|t| t.ticket_type_id).collect();

        let event_names = if event_ids.is_empty() {
            HashMap::new()
        } else {
            event::Entity::find()
                .filter(event::Column::Id.is_in(event_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|e| (e.id, e.name))
                .collect()
        };
        let type_names = if type_ids.is_empty() {
            HashMap::new()
        } else {
            event_ticket_type::Entity::find()
                .filter(event_ticket_type::Column::Id.is_in(type_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|t| (t.id, t.name))
                .collect()
        };

        Ok((event_names, type_names))
    }
}
