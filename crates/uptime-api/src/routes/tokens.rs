use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use uptime_core::{CreateTokenRequest, ExtendTokenRequest, RecordId, Token};

use super::{IdQuery, MessageResponse};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/tokens",
        post(create_token)
            .get(get_token)
            .put(extend_token)
            .delete(delete_token),
    )
}

pub(super) fn id_param(query: Result<Query<IdQuery>, QueryRejection>) -> Result<RecordId, ApiError> {
    let Query(query) = query?;
    Ok(RecordId::parse(query.id.as_deref().unwrap_or_default())?)
}

/// POST /tokens
async fn create_token(
    State(state): State<AppState>,
    payload: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let credentials = body.validate()?;
    let token = state.services.auth.issue(&credentials).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

/// GET /tokens?id=
async fn get_token(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Json<Token>, ApiError> {
    let id = id_param(query)?;
    Ok(Json(state.services.auth.lookup(&id).await?))
}

/// PUT /tokens
async fn extend_token(
    State(state): State<AppState>,
    payload: Result<Json<ExtendTokenRequest>, JsonRejection>,
) -> Result<Json<Token>, ApiError> {
    let Json(body) = payload?;
    let id = body.validate()?;
    Ok(Json(state.services.auth.extend(&id).await?))
}

/// DELETE /tokens?id=
async fn delete_token(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = id_param(query)?;
    state.services.auth.revoke(&id).await?;
    Ok(Json(MessageResponse {
        message: format!("token {id} deleted"),
    }))
}
