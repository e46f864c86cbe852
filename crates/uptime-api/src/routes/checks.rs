use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use uptime_core::{Check, CreateCheckRequest, UpdateCheckRequest};

use super::tokens::id_param;
use super::{session_token, IdQuery, MessageResponse};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/checks",
        post(create_check)
            .get(get_check)
            .put(update_check)
            .delete(delete_check),
    )
}

/// POST /checks
async fn create_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateCheckRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let spec = body.validate()?;
    let check = state
        .services
        .checks
        .create(session_token(&headers), spec)
        .await?;
    Ok((StatusCode::CREATED, Json(check)))
}

/// GET /checks?id=
async fn get_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Json<Check>, ApiError> {
    let id = id_param(query)?;
    let check = state
        .services
        .checks
        .fetch(&id, session_token(&headers))
        .await?;
    Ok(Json(check))
}

/// PUT /checks
async fn update_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpdateCheckRequest>, JsonRejection>,
) -> Result<Json<Check>, ApiError> {
    let Json(body) = payload?;
    let (id, changes) = body.validate()?;
    let check = state
        .services
        .checks
        .update(&id, session_token(&headers), changes)
        .await?;
    Ok(Json(check))
}

/// DELETE /checks?id=
async fn delete_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = id_param(query)?;
    state
        .services
        .checks
        .remove(&id, session_token(&headers))
        .await?;
    Ok(Json(MessageResponse {
        message: format!("check {id} deleted"),
    }))
}
