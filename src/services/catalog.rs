use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{category, event, event_performer, event_ticket_type, performer};
use crate::errors::ServiceError;
use crate::{ListQuery, Paginated};

// ---------------------------------------------------------------------------
// Public browse DTOs

#[derive(Debug, Default, Deserialize)]
pub struct EventListFilter {
    pub hot: Option<bool>,
    #[serde(rename = "new")]
    pub is_new: Option<bool>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventSummary {
    pub id: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub banner_url: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub category_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketTypeInfo {
    pub id: Uuid,
    pub name: String,
    pub price: Option<Decimal>,
    pub total_quantity: i32,
    pub sold_quantity: i32,
    pub per_order_limit: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventPerformerInfo {
    pub performer_id: Uuid,
    pub stage_name: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role_note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventDetail {
    pub id: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub banner_url: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub category_name: Option<String>,
    pub ticket_types: Vec<TicketTypeInfo>,
    pub performers: Vec<EventPerformerInfo>,
}

// ---------------------------------------------------------------------------
// Admin DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, message = "Category name is required"))]
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EventRequest {
    #[validate(length(min = 1, message = "Event name is required"))]
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub banner_url: Option<String>,
    pub category_id: Option<Uuid>,
    pub base_price: Option<Decimal>,
    #[serde(default)]
    pub is_hot: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminEventFilter {
    pub category_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AdminEventRow {
    pub id: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub base_price: Option<Decimal>,
    pub is_hot: bool,
    pub is_new: bool,
    pub published: bool,
    pub category_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PerformerRequest {
    pub stage_name: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TicketTypeRequest {
    pub event_id: Uuid,
    #[validate(length(min = 1, message = "Ticket type name is required"))]
    pub name: String,
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Total quantity must not be negative"))]
    #[serde(default)]
    pub total_quantity: i32,
    #[validate(range(min = 1, message = "Per-order limit must be at least 1"))]
    #[serde(default = "default_per_order_limit")]
    pub per_order_limit: i32,
}

fn default_per_order_limit() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AssociatePerformerRequest {
    pub event_id: Uuid,
    pub performer_id: Uuid,
    pub role_note: Option<String>,
}

/// Catalog store: public browse surface plus the admin mutation surface for
/// categories, events, performers, ticket types and their associations.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    // -- public browse ------------------------------------------------------

    pub async fn list_published_events(
        &self,
        filter: &EventListFilter,
        query: &ListQuery,
    ) -> Result<Paginated<EventSummary>, ServiceError> {
        let (page, page_size) = query.clamp();

        let mut select = event::Entity::find()
            .find_also_related(category::Entity)
            .filter(event::Column::Published.eq(true));

        if filter.hot == Some(true) {
            select = select.filter(event::Column::IsHot.eq(true));
        }
        if filter.is_new == Some(true) {
            select = select.filter(event::Column::IsNew.eq(true));
        }
        if let Some(category_id) = filter.category_id {
            select = select.filter(event::Column::CategoryId.eq(category_id));
        }
        if let Some(q) = query.term() {
            select = select.filter(
                Condition::any()
                    .add(event::Column::Name.contains(q.as_str()))
                    .add(event::Column::Description.contains(q.as_str())),
            );
        }

        let paginator = select
            .order_by_desc(event::Column::StartTime)
            .paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let data = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(|(e, c)| EventSummary {
                id: e.id,
                name: e.name,
                title: e.title,
                banner_url: e.banner_url,
                location: e.location,
                start_time: e.start_time,
                end_time: e.end_time,
                category_name: c.map(|c| c.name),
            })
            .collect();

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn published_event_detail(&self, id: Uuid) -> Result<EventDetail, ServiceError> {
        let (event, category) = event::Entity::find_by_id(id)
            .find_also_related(category::Entity)
            .filter(event::Column::Published.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Event not found".to_string()))?;

        let performers = event_performer::Entity::find()
            .find_also_related(performer::Entity)
            .filter(event_performer::Column::EventId.eq(id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|(ep, p)| {
                let p = p.unwrap_or(performer::Model {
                    id: ep.performer_id,
                    stage_name: None,
                    full_name: None,
                    avatar_url: None,
                    bio: None,
                });
                EventPerformerInfo {
                    performer_id: ep.performer_id,
                    stage_name: p.stage_name,
                    full_name: p.full_name,
                    avatar_url: p.avatar_url,
                    role_note: ep.role_note,
                }
            })
            .collect();

        let ticket_types = event_ticket_type::Entity::find()
            .filter(event_ticket_type::Column::EventId.eq(id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(ticket_type_info)
            .collect();

        Ok(EventDetail {
            id: event.id,
            name: event.name,
            title: event.title,
            description: event.description,
            banner_url: event.banner_url,
            location: event.location,
            start_time: event.start_time,
            end_time: event.end_time,
            category_name: category.map(|c| c.name),
            ticket_types,
            performers,
        })
    }

    // -- categories ---------------------------------------------------------

    pub async fn list_categories(
        &self,
        query: &ListQuery,
    ) -> Result<Paginated<category::Model>, ServiceError> {
        let (page, page_size) = query.clamp();

        let mut select = category::Entity::find().order_by_asc(category::Column::Name);
        if let Some(q) = query.term() {
            select = select.filter(
                Condition::any()
                    .add(category::Column::Name.contains(q.as_str()))
                    .add(category::Column::Slug.contains(q.as_str())),
            );
        }

        let paginator = select.paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page - 1).await?;

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn get_category(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Category not found".to_string()))
    }

    pub async fn create_category(
        &self,
        req: CategoryRequest,
    ) -> Result<category::Model, ServiceError> {
        req.validate()?;
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(req.name),
            slug: Set(req.slug),
            description: Set(req.description),
        }
        .insert(&*self.db)
        .await?;
        Ok(model)
    }

    pub async fn update_category(
        &self,
        id: Uuid,
        req: CategoryRequest,
    ) -> Result<category::Model, ServiceError> {
        req.validate()?;
        let found = self.get_category(id).await?;
        let mut active: category::ActiveModel = found.into();
        active.name = Set(req.name);
        active.slug = Set(req.slug);
        active.description = Set(req.description);
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<(), ServiceError> {
        let res = category::Entity::delete_by_id(id).exec(&*self.db).await?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound("Category not found".to_string()));
        }
        Ok(())
    }

    // -- events (admin) -----------------------------------------------------

    pub async fn admin_list_events(
        &self,
        filter: &AdminEventFilter,
        query: &ListQuery,
    ) -> Result<Paginated<AdminEventRow>, ServiceError> {
        let (page, page_size) = query.clamp();

        let mut select = event::Entity::find().find_also_related(category::Entity);

        if let Some(q) = query.term() {
            select = select.filter(
                Condition::any()
                    .add(event::Column::Name.contains(q.as_str()))
                    .add(event::Column::Title.contains(q.as_str()))
                    .add(event::Column::Description.contains(q.as_str())),
            );
        }
        if let Some(category_id) = filter.category_id {
            select = select.filter(event::Column::CategoryId.eq(category_id));
        }
        if let Some(from) = filter.from {
            select = select.filter(event::Column::StartTime.gte(from));
        }
        if let Some(to) = filter.to {
            select = select.filter(event::Column::EndTime.lte(to));
        }

        let paginator = select
            .order_by_desc(event::Column::CreatedAt)
            .paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let data = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(|(e, c)| AdminEventRow {
                id: e.id,
                name: e.name,
                title: e.title,
                location: e.location,
                start_time: e.start_time,
                end_time: e.end_time,
                base_price: e.base_price,
                is_hot: e.is_hot,
                is_new: e.is_new,
                published: e.published,
                category_name: c.map(|c| c.name),
            })
            .collect();

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn get_event(&self, id: Uuid) -> Result<event::Model, ServiceError> {
        event::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Event not found".to_string()))
    }

    pub async fn create_event(&self, req: EventRequest) -> Result<event::Model, ServiceError> {
        req.validate()?;
        let now = Utc::now();
        let model = event::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(req.name),
            title: Set(req.title),
            description: Set(req.description),
            location: Set(req.location),
            start_time: Set(req.start_time),
            end_time: Set(req.end_time),
            banner_url: Set(req.banner_url),
            category_id: Set(req.category_id),
            base_price: Set(req.base_price),
            is_hot: Set(req.is_hot),
            is_new: Set(req.is_new),
            published: Set(req.published),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db)
        .await?;
        Ok(model)
    }

    pub async fn update_event(
        &self,
        id: Uuid,
        req: EventRequest,
    ) -> Result<event::Model, ServiceError> {
        req.validate()?;
        let found = self.get_event(id).await?;
        let mut active: event::ActiveModel = found.into();
        active.name = Set(req.name);
        active.title = Set(req.title);
        active.description = Set(req.description);
        active.location = Set(req.location);
        active.start_time = Set(req.start_time);
        active.end_time = Set(req.end_time);
        active.banner_url = Set(req.banner_url);
        active.category_id = Set(req.category_id);
        active.base_price = Set(req.base_price);
        active.is_hot = Set(req.is_hot);
        active.is_new = Set(req.is_new);
        active.published = Set(req.published);
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete_event(&self, id: Uuid) -> Result<(), ServiceError> {
        let res = event::Entity::delete_by_id(id).exec(&*self.db).await?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound("Event not found".to_string()));
        }
        Ok(())
    }

    // -- performers ---------------------------------------------------------

    pub async fn list_performers(
        &self,
        query: &ListQuery,
    ) -> Result<Paginated<performer::Model>, ServiceError> {
        let (page, page_size) = query.clamp();

        let mut select = performer::Entity::find().order_by_asc(performer::Column::StageName);
        if let Some(q) = query.term() {
            select = select.filter(
                Condition::any()
                    .add(performer::Column::StageName.contains(q.as_str()))
                    .add(performer::Column::FullName.contains(q.as_str())),
            );
        }

        let paginator = select.paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page - 1).await?;

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn get_performer(&self, id: Uuid) -> Result<performer::Model, ServiceError> {
        performer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Performer not found".to_string()))
    }

    pub async fn create_performer(
        &self,
        req: PerformerRequest,
    ) -> Result<performer::Model, ServiceError> {
        validate_performer_name(&req)?;
        let model = performer::ActiveModel {
            id: Set(Uuid::new_v4()),
            stage_name: Set(req.stage_name),
            full_name: Set(req.full_name),
            avatar_url: Set(req.avatar_url),
            bio: Set(req.bio),
        }
        .insert(&*self.db)
        .await?;
        Ok(model)
    }

    pub async fn update_performer(
        &self,
        id: Uuid,
        req: PerformerRequest,
    ) -> Result<performer::Model, ServiceError> {
        validate_performer_name(&req)?;
        let found = self.get_performer(id).await?;
        let mut active: performer::ActiveModel = found.into();
        active.stage_name = Set(req.stage_name);
        active.full_name = Set(req.full_name);
        active.avatar_url = Set(req.avatar_url);
        active.bio = Set(req.bio);
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete_performer(&self, id: Uuid) -> Result<(), ServiceError> {
        let res = performer::Entity::delete_by_id(id).exec(&*self.db).await?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound("Performer not found".to_string()));
        }
        Ok(())
    }

    // -- event <-> performer associations -----------------------------------

    pub async fn list_event_performers(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<EventPerformerInfo>, ServiceError> {
        let rows = event_performer::Entity::find()
            .find_also_related(performer::Entity)
            .filter(event_performer::Column::EventId.eq(event_id))
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(ep, p)| EventPerformerInfo {
                performer_id: ep.performer_id,
                stage_name: p.as_ref().and_then(|p| p.stage_name.clone()),
                full_name: p.as_ref().and_then(|p| p.full_name.clone()),
                avatar_url: p.and_then(|p| p.avatar_url),
                role_note: ep.role_note,
            })
            .collect())
    }

    pub async fn associate_performer(
        &self,
        req: AssociatePerformerRequest,
    ) -> Result<event_performer::Model, ServiceError> {
        self.get_event(req.event_id).await?;
        self.get_performer(req.performer_id).await?;

        let exists = event_performer::Entity::find()
            .filter(event_performer::Column::EventId.eq(req.event_id))
            .filter(event_performer::Column::PerformerId.eq(req.performer_id))
            .count(&*self.db)
            .await?;
        if exists > 0 {
            return Err(ServiceError::Conflict(
                "Performer is already associated with this event".to_string(),
            ));
        }

        let model = event_performer::ActiveModel {
            event_id: Set(req.event_id),
            performer_id: Set(req.performer_id),
            role_note: Set(req.role_note),
        }
        .insert(&*self.db)
        .await?;
        Ok(model)
    }

    pub async fn dissociate_performer(
        &self,
        event_id: Uuid,
        performer_id: Uuid,
    ) -> Result<(), ServiceError> {
        let res = event_performer::Entity::delete_many()
            .filter(event_performer::Column::EventId.eq(event_id))
            .filter(event_performer::Column::PerformerId.eq(performer_id))
            .exec(&*self.db)
            .await?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound("Association not found".to_string()));
        }
        Ok(())
    }

    // -- ticket types -------------------------------------------------------

    pub async fn list_ticket_types(
        &self,
        event_id: Option<Uuid>,
        query: &ListQuery,
    ) -> Result<Paginated<TicketTypeInfo>, ServiceError> {
        let (page, page_size) = query.clamp();

        let mut select = event_ticket_type::Entity::find()
            .order_by_desc(event_ticket_type::Column::CreatedAt);
        if let Some(event_id) = event_id {
            select = select.filter(event_ticket_type::Column::EventId.eq(event_id));
        }
        if let Some(q) = query.term() {
            select = select.filter(event_ticket_type::Column::Name.contains(q.as_str()));
        }

        let paginator = select.paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let data = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(ticket_type_info)
            .collect();

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn get_ticket_type(
        &self,
        id: Uuid,
    ) -> Result<event_ticket_type::Model, ServiceError> {
        event_ticket_type::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Ticket type not found".to_string()))
    }

    pub async fn create_ticket_type(
        &self,
        req: TicketTypeRequest,
    ) -> Result<event_ticket_type::Model, ServiceError> {
        req.validate()?;
        self.get_event(req.event_id).await?;

        let now = Utc::now();
        let model = event_ticket_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            event_id: Set(req.event_id),
            name: Set(req.name),
            price: Set(req.price),
            total_quantity: Set(req.total_quantity),
            sold_quantity: Set(0),
            per_order_limit: Set(req.per_order_limit),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db)
        .await?;
        Ok(model)
    }

    /// `sold_quantity` is deliberately not updatable here: it only moves
    /// through the booking workflow's conditional updates.
    pub async fn update_ticket_type(
        &self,
        id: Uuid,
        req: TicketTypeRequest,
    ) -> Result<event_ticket_type::Model, ServiceError> {
        req.validate()?;
        let found = self.get_ticket_type(id).await?;
        if req.total_quantity < found.sold_quantity {
            return Err(ServiceError::ValidationError(format!(
                "Total quantity cannot drop below the {} already sold",
                found.sold_quantity
            )));
        }

        let mut active: event_ticket_type::ActiveModel = found.into();
        active.name = Set(req.name);
        active.price = Set(req.price);
        active.total_quantity = Set(req.total_quantity);
        active.per_order_limit = Set(req.per_order_limit);
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete_ticket_type(&self, id: Uuid) -> Result<(), ServiceError> {
        let res = event_ticket_type::Entity::delete_by_id(id)
            .exec(&*self.db)
            .await?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound("Ticket type not found".to_string()));
        }
        Ok(())
    }

    /// Bulk name lookup used when projecting order items and tickets.
    pub async fn event_names(
        &self,
        ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, String>, ServiceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let events = event::Entity::find()
            .filter(event::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?;
        Ok(events.into_iter().map(|e| (e.id, e.name)).collect())
    }
}

fn ticket_type_info(m: event_ticket_type::Model) -> TicketTypeInfo {
    TicketTypeInfo {
        id: m.id,
        name: m.name,
        price: m.price,
        total_quantity: m.total_quantity,
        sold_quantity: m.sold_quantity,
        per_order_limit: m.per_order_limit,
    }
}

fn validate_performer_name(req: &PerformerRequest) -> Result<(), ServiceError> {
    let has_name = req
        .stage_name
        .as_deref()
        .map(str::trim)
        .is_some_and(|s| !s.is_empty())
        || req
            .full_name
            .as_deref()
            .map(str::trim)
            .is_some_and(|s| !s.is_empty());
    if has_name {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(
            "Performer needs a stage name or a full name".to_string(),
        ))
    }
}
