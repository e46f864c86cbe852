use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use uptime_core::{Check, Phone, RegisterUserRequest, UpdateUserRequest, UserProfile, UserRemoval};

use super::{session_token, PhoneQuery};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            post(register_user)
                .get(get_user)
                .put(update_user)
                .delete(delete_user),
        )
        .route("/users/checks", get(list_user_checks))
}

fn phone_param(query: Result<Query<PhoneQuery>, QueryRejection>) -> Result<Phone, ApiError> {
    let Query(query) = query?;
    Ok(Phone::parse(query.phone.as_deref().unwrap_or_default())?)
}

/// POST /users
async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let new_user = body.validate()?;
    let profile = state.services.users.register(new_user).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /users?phone=
async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PhoneQuery>, QueryRejection>,
) -> Result<Json<UserProfile>, ApiError> {
    let phone = phone_param(query)?;
    let profile = state
        .services
        .users
        .fetch(&phone, session_token(&headers))
        .await?;
    Ok(Json(profile))
}

/// PUT /users
async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserProfile>, ApiError> {
    let Json(body) = payload?;
    let (phone, changes) = body.validate()?;
    let profile = state
        .services
        .users
        .update(&phone, session_token(&headers), changes)
        .await?;
    Ok(Json(profile))
}

/// DELETE /users?phone=
async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PhoneQuery>, QueryRejection>,
) -> Result<Json<UserRemoval>, ApiError> {
    let phone = phone_param(query)?;
    let removal = state
        .services
        .users
        .remove(&phone, session_token(&headers))
        .await?;
    Ok(Json(removal))
}

/// GET /users/checks?phone=
async fn list_user_checks(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PhoneQuery>, QueryRejection>,
) -> Result<Json<Vec<Check>>, ApiError> {
    let phone = phone_param(query)?;
    let checks = state
        .services
        .checks
        .owned(&phone, session_token(&headers))
        .await?;
    Ok(Json(checks))
}
