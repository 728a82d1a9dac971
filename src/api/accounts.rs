// Account handlers: login, registration, profile and passwords

use super::{blocking, ApiResponse, ApiResult, AppState, CurrentUser, SESSION_COOKIE};
use crate::auth;
use crate::entities::{user, Purse, User};
use crate::error::TrackerError;
use crate::forms::{
    LoginForm, PasswordChangeForm, PasswordResetForm, SetPasswordForm, UserChangeForm,
    UserCreationForm,
};
use crate::tracker::Tracker;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    user: User,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    user: User,
    purses: Vec<Purse>,
}

fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

/// POST /api/tracker/login
pub async fn login(State(state): State<AppState>, Json(form): Json<LoginForm>) -> Result<Response, TrackerError> {
    form.validate()?;
    let candidate = state.with_conn(|conn| user::find_by_username(conn, form.username.trim()))?;
    let user = blocking(move || auth::verify_credentials(candidate, &form.password)).await?;
    let token = state.with_conn(|conn| auth::create_session(conn, user.id, state.config.session_days))?;
    tracing::info!(username = %user.username, "logged in");

    let cookie = session_cookie(&token, state.config.session_days * 24 * 3600);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::ok(LoginResponse { token, user })),
    )
        .into_response())
}

/// POST /api/tracker/logout
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> Result<Response, TrackerError> {
    state.with_conn(|conn| auth::delete_session(conn, &current.token))?;
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie("", 0))],
        Json(ApiResponse::ok(())),
    )
        .into_response())
}

/// POST /api/tracker/user_creation
pub async fn user_creation(State(state): State<AppState>, Json(form): Json<UserCreationForm>) -> ApiResult<User> {
    let clean = state.with_conn(|conn| form.validate(conn))?;
    let password = clean.password.clone();
    let iterations = state.config.password_iterations;
    let password_hash = blocking(move || Ok(auth::hash_password(&password, iterations))).await?;
    let (user, _) = state.with_conn(|conn| {
        auth::create_pending_account(conn, state.mailer.as_ref(), &state.config, &clean, &password_hash)
    })?;
    Ok(Json(ApiResponse::ok(user)))
}

/// GET /api/tracker/user_activation/:key
pub async fn user_activation(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<User> {
    let user = state.with_conn(|conn| {
        auth::activate_account(conn, &key, Utc::now(), state.config.registration_days)
    })?;
    Ok(Json(ApiResponse::ok(user)))
}

/// GET /api/tracker/user_change
pub async fn user_profile(State(state): State<AppState>, current: CurrentUser) -> ApiResult<ProfileResponse> {
    let (user, purses) =
        state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).user_profile())?;
    Ok(Json(ApiResponse::ok(ProfileResponse { user, purses })))
}

/// POST /api/tracker/user_change
pub async fn user_change(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<UserChangeForm>,
) -> ApiResult<User> {
    let user = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).change_user(&form))?;
    Ok(Json(ApiResponse::ok(user)))
}

/// POST /api/tracker/user_deletion
pub async fn user_deletion(State(state): State<AppState>, current: CurrentUser) -> Result<Response, TrackerError> {
    state.with_conn(|conn| auth::delete_account(conn, state.mailer.as_ref(), &state.config, &current.user))?;
    tracing::info!(username = %current.user.username, "account deactivated");
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie("", 0))],
        Json(ApiResponse::ok(())),
    )
        .into_response())
}

/// POST /api/tracker/user_default_purse/:id
pub async fn user_default_purse(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(purse_id): Path<i64>,
) -> ApiResult<Purse> {
    let purse = state.with_conn(|conn| Tracker::new(conn, &state.config, &current.user).set_default_purse(purse_id))?;
    Ok(Json(ApiResponse::ok(purse)))
}

/// POST /api/tracker/password_change
pub async fn password_change(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<PasswordChangeForm>,
) -> ApiResult<()> {
    let config = state.config.clone();
    let user = current.user.clone();
    let password_hash = blocking(move || auth::password_change_hash(&config, &user, &form)).await?;
    state.with_conn(|conn| auth::store_password(conn, &current.user, &password_hash))?;
    Ok(Json(ApiResponse::ok(())))
}

/// POST /api/tracker/password_reset
pub async fn password_reset(State(state): State<AppState>, Json(form): Json<PasswordResetForm>) -> ApiResult<()> {
    let email = form.validate()?;
    state.with_conn(|conn| auth::request_password_reset(conn, state.mailer.as_ref(), &state.config, &email))?;
    Ok(Json(ApiResponse::ok(())))
}

/// POST /api/tracker/password_reset_confirm/:key
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(form): Json<SetPasswordForm>,
) -> ApiResult<User> {
    let registration = state.with_conn(|conn| auth::find_password_reset(conn, &state.config, &key, Utc::now()))?;
    let config = state.config.clone();
    let password_hash = blocking(move || auth::password_reset_hash(&config, &form)).await?;
    let user = state.with_conn(|conn| auth::complete_password_reset(conn, &registration, &password_hash))?;
    Ok(Json(ApiResponse::ok(user)))
}
