//! Short link redirects

use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::get,
    Router,
};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /go/:code
pub async fn follow_short_link(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Redirect> {
    let target = db::short_links::resolve(&state.db, &code)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Short link {}", code)))?;
    Ok(Redirect::temporary(&target))
}

pub fn short_link_routes() -> Router<AppState> {
    Router::new().route("/go/:code", get(follow_short_link))
}
