use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::notification;
use crate::errors::ServiceError;
use crate::{ListQuery, Paginated};

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<notification::Model> for NotificationView {
    fn from(m: notification::Model) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            title: m.title,
            content: m.content,
            is_read: m.is_read,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminCreateNotificationRequest {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateNotificationRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_read: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminNotificationFilter {
    pub user_id: Option<Uuid>,
}

/// Per-user message store with read/unread state. Written by the payment
/// workflow on settlement and by the admin surface.
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DbPool>,
}

impl NotificationService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<Paginated<NotificationView>, ServiceError> {
        let (page, page_size) = query.clamp();

        let paginator = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let data = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(NotificationView::from)
            .collect();

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let found = notification::Entity::find_by_id(id)
            .filter(notification::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("Notification not found or not owned by user".to_string())
            })?;

        let mut active: notification::ActiveModel = found.into();
        active.is_read = Set(true);
        active.update(&*self.db).await?;
        Ok(())
    }

    /// Insert a notification on an arbitrary connection so workflows can
    /// write inside their own transactions.
    pub async fn create_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
        kind: &str,
        title: &str,
        content: String,
    ) -> Result<notification::Model, ServiceError> {
        let model = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            kind: Set(Some(kind.to_string())),
            title: Set(Some(title.to_string())),
            content: Set(Some(content)),
            is_read: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;
        Ok(model)
    }

    // -- admin surface ------------------------------------------------------

    pub async fn admin_list(
        &self,
        filter: &AdminNotificationFilter,
        query: &ListQuery,
    ) -> Result<Paginated<notification::Model>, ServiceError> {
        let (page, page_size) = query.clamp();

        let mut select =
            notification::Entity::find().order_by_desc(notification::Column::CreatedAt);
        if let Some(user_id) = filter.user_id {
            select = select.filter(notification::Column::UserId.eq(user_id));
        }
        if let Some(q) = query.term() {
            select = select.filter(notification::Column::Title.contains(q.as_str()));
        }

        let paginator = select.paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page - 1).await?;

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn admin_get(&self, id: Uuid) -> Result<notification::Model, ServiceError> {
        notification::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Notification not found".to_string()))
    }

    pub async fn admin_create(
        &self,
        req: AdminCreateNotificationRequest,
    ) -> Result<notification::Model, ServiceError> {
        let model = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(req.user_id),
            kind: Set(req.kind),
            title: Set(req.title),
            content: Set(req.content),
            is_read: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;
        Ok(model)
    }

    pub async fn admin_update(
        &self,
        id: Uuid,
        req: AdminUpdateNotificationRequest,
    ) -> Result<notification::Model, ServiceError> {
        let found = notification::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Notification not found".to_string()))?;

        let mut active: notification::ActiveModel = found.into();
        if let Some(t) = req.title {
            active.title = Set(Some(t));
        }
        if let Some(c) = req.content {
            active.content = Set(Some(c));
        }
        if let Some(r) = req.is_read {
            active.is_read = Set(r);
        }
        Ok(active.update(&*self.db).await?)
    }

    pub async fn admin_delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let res = notification::Entity::delete_by_id(id).exec(&*self.db).await?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }
}
