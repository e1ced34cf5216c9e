use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{self, PasswordMatch};
use crate::auth::{AuthService, Role};
use crate::db::DbPool;
use crate::entities::user;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::{ListQuery, Paginated};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
}

impl From<user::Model> for UserSummary {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            full_name: m.full_name,
            email: m.email,
            role: m.role,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub avatar_url: Option<String>,
    pub address_line: Option<String>,
    pub province_name: Option<String>,
    pub district_name: Option<String>,
    pub ward_name: Option<String>,
    pub role: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<user::Model> for ProfileResponse {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            full_name: m.full_name,
            email: m.email,
            phone: m.phone,
            gender: m.gender,
            birth_date: m.birth_date,
            avatar_url: m.avatar_url,
            address_line: m.address_line,
            province_name: m.province_name,
            district_name: m.district_name,
            ward_name: m.ward_name,
            role: m.role,
            created_at: m.created_at,
        }
    }
}

/// Absent fields keep their current value.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub avatar_url: Option<String>,
    pub address_line: Option<String>,
    pub province_name: Option<String>,
    pub district_name: Option<String>,
    pub ward_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Old password is required"))]
    pub old_password: String,
    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
}

/// Identity component: registration, credential verification, profile
/// management, and the admin user surface.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
    auth: Arc<AuthService>,
    events: EventSender,
}

impl UserService {
    pub fn new(db: Arc<DbPool>, auth: Arc<AuthService>, events: EventSender) -> Self {
        Self { db, auth, events }
    }

    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn register(&self, req: RegisterRequest) -> Result<UserSummary, ServiceError> {
        req.validate()?;

        let exists = user::Entity::find()
            .filter(user::Column::Username.eq(req.username.as_str()))
            .count(&*self.db)
            .await?;
        if exists > 0 {
            return Err(ServiceError::Conflict("Username already exists".to_string()));
        }

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(req.username),
            password_hash: Set(password::hash_password(&req.password)?),
            full_name: Set(req.full_name),
            email: Set(req.email),
            phone: Set(req.phone),
            birth_date: Set(None),
            gender: Set(None),
            avatar_url: Set(None),
            address_line: Set(None),
            province_name: Set(None),
            district_name: Set(None),
            ward_name: Set(None),
            email_verified: Set(false),
            phone_verified: Set(false),
            role: Set(Role::User.to_string()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = %model.id, "user registered");
        self.events
            .publish(Event::UserRegistered { user_id: model.id })
            .await;

        Ok(model.into())
    }

    /// Verify credentials and issue a bearer token. A legacy SHA-256 hash
    /// that verifies is upgraded to argon2 in place before the token is
    /// returned.
    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
        req.validate()?;

        let found = user::Entity::find()
            .filter(user::Column::Username.eq(req.username.as_str()))
            .one(&*self.db)
            .await?;

        let Some(found) = found else {
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        };

        let verdict = password::verify_password(&req.password, &found.password_hash)?;
        if !verdict.is_match() {
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        }

        let found = if verdict == PasswordMatch::YesLegacy {
            info!(user_id = %found.id, "upgrading legacy password hash");
            let mut active: user::ActiveModel = found.into();
            active.password_hash = Set(password::hash_password(&req.password)?);
            active.updated_at = Set(Some(Utc::now()));
            active.update(&*self.db).await?
        } else {
            found
        };

        let token = self.auth.issue_token(&found.username, &found.role)?;

        Ok(LoginResponse {
            token,
            user: found.into(),
        })
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<ProfileResponse, ServiceError> {
        let found = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let mut active: user::ActiveModel = found.into();
        if let Some(v) = req.full_name {
            active.full_name = Set(v);
        }
        if let Some(v) = req.email {
            active.email = Set(Some(v));
        }
        if let Some(v) = req.phone {
            active.phone = Set(Some(v));
        }
        if let Some(v) = req.gender {
            active.gender = Set(Some(v));
        }
        if let Some(v) = req.birth_date {
            active.birth_date = Set(Some(v));
        }
        if let Some(v) = req.avatar_url {
            active.avatar_url = Set(Some(v));
        }
        if let Some(v) = req.address_line {
            active.address_line = Set(Some(v));
        }
        if let Some(v) = req.province_name {
            active.province_name = Set(Some(v));
        }
        if let Some(v) = req.district_name {
            active.district_name = Set(Some(v));
        }
        if let Some(v) = req.ward_name {
            active.ward_name = Set(Some(v));
        }
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(&*self.db).await?.into())
    }

    /// Verify the old password under the unified verify path, then store an
    /// argon2 hash of the new one.
    #[instrument(skip_all, fields(user_id = %current.id))]
    pub async fn change_password(
        &self,
        current: &user::Model,
        req: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        req.validate()?;

        let verdict = password::verify_password(&req.old_password, &current.password_hash)?;
        if !verdict.is_match() {
            return Err(ServiceError::ValidationError(
                "Old password incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = current.clone().into();
        active.password_hash = Set(password::hash_password(&req.new_password)?);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db).await?;

        Ok(())
    }

    pub async fn admin_list(
        &self,
        query: &ListQuery,
    ) -> Result<Paginated<ProfileResponse>, ServiceError> {
        let (page, page_size) = query.clamp();

        let mut select = user::Entity::find().order_by_desc(user::Column::CreatedAt);
        if let Some(q) = query.term() {
            select = select.filter(
                Condition::any()
                    .add(user::Column::Username.contains(q.as_str()))
                    .add(user::Column::FullName.contains(q.as_str()))
                    .add(user::Column::Email.contains(q.as_str())),
            );
        }

        let paginator = select.paginate(&*self.db, page_size);
        let total = paginator.num_items().await?;
        let data = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(ProfileResponse::from)
            .collect();

        Ok(Paginated::new(total, page, page_size, data))
    }

    pub async fn admin_get(&self, id: Uuid) -> Result<ProfileResponse, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .map(ProfileResponse::from)
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    pub async fn admin_create(
        &self,
        req: AdminCreateUserRequest,
    ) -> Result<ProfileResponse, ServiceError> {
        req.validate()?;

        let role = match req.role.as_deref() {
            None => Role::User,
            Some(raw) => raw.parse::<Role>().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown role: {raw}"))
            })?,
        };

        let exists = user::Entity::find()
            .filter(user::Column::Username.eq(req.username.as_str()))
            .count(&*self.db)
            .await?;
        if exists > 0 {
            return Err(ServiceError::Conflict("Username already exists".to_string()));
        }

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(req.username),
            password_hash: Set(password::hash_password(&req.password)?),
            full_name: Set(req.full_name),
            email: Set(req.email),
            phone: Set(req.phone),
            birth_date: Set(None),
            gender: Set(None),
            avatar_url: Set(None),
            address_line: Set(None),
            province_name: Set(None),
            district_name: Set(None),
            ward_name: Set(None),
            email_verified: Set(false),
            phone_verified: Set(false),
            role: Set(role.to_string()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db)
        .await?;

        Ok(model.into())
    }

    pub async fn admin_update(
        &self,
        id: Uuid,
        req: AdminUpdateUserRequest,
    ) -> Result<ProfileResponse, ServiceError> {
        let found = user::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let role = match req.role.as_deref() {
            None => None,
            Some(raw) => Some(raw.parse::<Role>().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown role: {raw}"))
            })?),
        };

        let mut active: user::ActiveModel = found.into();
        if let Some(v) = req.full_name {
            active.full_name = Set(v);
        }
        if let Some(v) = req.email {
            active.email = Set(Some(v));
        }
        if let Some(v) = req.phone {
            active.phone = Set(Some(v));
        }
        if let Some(r) = role {
            active.role = Set(r.to_string());
        }
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(&*self.db).await?.into())
    }

    pub async fn admin_delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let res = user::Entity::delete_by_id(id).exec(&*self.db).await?;
        if res.rows_affected == 0 {
            warn!(%id, "delete of missing user requested");
            return Err(ServiceError::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}
