// Expenditure and tag handlers

use super::{ApiResponse, ApiResult, AppState, CurrentUser};
use crate::forms::ExpenditureForm;
use crate::query::ListParams;
use crate::summary::YearSummary;
use crate::tags::TagWeight;
use crate::tracker::{self, MonthList, PurseContext, SavedExpenditure, SearchList, Tracker};
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct TagParams {
    pub filter: Option<String>,
}

/// A tag with the search listing its expenditures
#[derive(Serialize)]
pub struct TagEntry {
    #[serde(flatten)]
    tag: TagWeight,
    search_url: String,
}

#[derive(Serialize)]
pub struct TagsResponse {
    purse: PurseContext,
    tags: Vec<TagEntry>,
}

fn search_url(tag: &str) -> String {
    format!(
        "/api/tracker/expenditures/search?filter={}",
        urlencoding::encode(tag)
    )
}

/// GET /api/tracker/expenditures - Redirect to the current month
pub async fn home() -> Redirect {
    let (year, month) = tracker::current_month(Utc::now());
    Redirect::temporary(&format!("/api/tracker/expenditures/{}/{:02}", year, month))
}

/// POST /api/tracker/expenditures/add
pub async fn add(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<ExpenditureForm>,
) -> ApiResult<SavedExpenditure> {
    let saved = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).add_expenditure(&form))?;
    Ok(Json(ApiResponse::ok(saved)))
}

/// POST /api/tracker/expenditures/update/:id
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(form): Json<ExpenditureForm>,
) -> ApiResult<SavedExpenditure> {
    let saved =
        state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).update_expenditure(id, &form))?;
    Ok(Json(ApiResponse::ok(saved)))
}

/// POST /api/tracker/expenditures/delete/:id
pub async fn delete(State(state): State<AppState>, current: CurrentUser, Path(id): Path<i64>) -> ApiResult<()> {
    state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).delete_expenditure(id))?;
    Ok(Json(ApiResponse::ok(())))
}

/// GET /api/tracker/expenditures/:year/:month
pub async fn month_list(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((year, month)): Path<(i32, u32)>,
    Query(params): Query<ListParams>,
) -> ApiResult<MonthList> {
    let list =
        state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).month_list(year, month, &params))?;
    Ok(Json(ApiResponse::ok(list)))
}

/// GET /api/tracker/expenditures/summary/:year
pub async fn year_summary(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(year): Path<i32>,
) -> ApiResult<YearSummary> {
    let summary = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).year_summary(year))?;
    Ok(Json(ApiResponse::ok(summary)))
}

/// GET /api/tracker/expenditures/search
pub async fn search(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<ListParams>,
) -> ApiResult<SearchList> {
    let list = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).search(&params))?;
    Ok(Json(ApiResponse::ok(list)))
}

/// GET /api/tracker/tags
pub async fn tags(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<TagParams>,
) -> ApiResult<TagsResponse> {
    let list = state
        .with_conn(|conn| Tracker::new(conn, &state.config, &current.user).tags(params.filter.as_deref()))?;

    let tags = list
        .tags
        .into_iter()
        .map(|tag| TagEntry {
            search_url: search_url(&tag.name),
            tag,
        })
        .collect();
    Ok(Json(ApiResponse::ok(TagsResponse {
        purse: list.purse,
        tags,
    })))
}

/// GET /api/tracker/tags/names
pub async fn tag_names(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Vec<String>> {
    let names = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).tag_names())?;
    Ok(Json(ApiResponse::ok(names)))
}
