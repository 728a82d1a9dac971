// Purse handlers

use super::{ApiResponse, ApiResult, AppState, CurrentUser};
use crate::entities::Purse;
use crate::forms::{PurseForm, PurseShareForm};
use crate::query::{ListParams, Page};
use crate::tracker::{Member, PurseRow, Tracker};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct DeleteResponse {
    /// The purse had no member left and is gone
    deleted: bool,
}

/// GET /api/tracker/purses
pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Page<PurseRow>> {
    let page = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).list_purses(&params))?;
    Ok(Json(ApiResponse::ok(page)))
}

/// POST /api/tracker/purses/create
pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<PurseForm>,
) -> ApiResult<Purse> {
    let purse = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).create_purse(&form))?;
    Ok(Json(ApiResponse::ok(purse)))
}

/// POST /api/tracker/purses/update/:id
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(form): Json<PurseForm>,
) -> ApiResult<Purse> {
    let purse = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).update_purse(id, &form))?;
    Ok(Json(ApiResponse::ok(purse)))
}

/// POST /api/tracker/purses/share/:id
pub async fn share(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(form): Json<PurseShareForm>,
) -> ApiResult<Member> {
    let member = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).share_purse(id, &form))?;
    Ok(Json(ApiResponse::ok(member)))
}

/// POST /api/tracker/purses/delete/:id
pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<DeleteResponse> {
    let deleted = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).delete_purse(id))?;
    Ok(Json(ApiResponse::ok(DeleteResponse { deleted })))
}
