use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::auth::CurrentUser;
use crate::errors::ServiceError;
use crate::services::users::{
    ChangePasswordRequest, LoginRequest, LoginResponse, ProfileResponse, RegisterRequest,
    UpdateProfileRequest, UserSummary,
};
use crate::{AppState, MessageResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-password", put(change_password))
}

/// The same profile surface, also mounted at `/api/profile`.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/change-password", put(change_password))
}

/// Create a user account with the default role.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = UserSummary),
        (status = 400, description = "Missing or invalid fields", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username already exists", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserSummary>), ServiceError> {
    let user = state.services.users.register(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Verify credentials and issue a bearer token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let response = state.services.users.login(req).await?;
    Ok(Json(response))
}

pub async fn get_profile(current: CurrentUser) -> Json<ProfileResponse> {
    Json(current.0.into())
}

pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ServiceError> {
    let profile = state
        .services
        .users
        .update_profile(current.id(), req)
        .await?;
    Ok(Json(profile))
}

pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ServiceError> {
    state
        .services
        .users
        .change_password(&current.0, req)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}
