mod checks;
mod tokens;
mod users;

use axum::http::HeaderMap;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Header carrying the session token id.
pub const TOKEN_HEADER: &str = "token";

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(tokens::router())
        .merge(checks::router())
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok())
}

#[derive(Debug, Deserialize)]
pub struct PhoneQuery {
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}
