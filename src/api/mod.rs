// 🌐 HTTP JSON API
//
// Every handler locks the shared connection for its synchronous work only;
// no guard is held across an `.await`. Password hashing runs on the
// blocking pool with the connection unlocked.

mod accounts;
mod expenditures;
mod extract;
mod purses;
mod response;

pub use extract::{CurrentUser, SESSION_COOKIE};
pub use response::{ApiResponse, ApiResult};

use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::mail::Mailer;
use axum::{
    routing::{get, post},
    Json, Router,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(conn: Connection, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            mailer,
        }
    }

    /// Run `f` with the locked connection
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.db.lock().map_err(|_| TrackerError::LockPoisoned)?;
        f(&conn)
    }
}

/// Run CPU-heavy work off the async workers
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TrackerError::Background(e.to_string()))?
}

/// GET /api/health - Health check
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::ok("OK"))
}

/// The `/api` router
pub fn router(state: AppState) -> Router {
    let tracker_routes = Router::new()
        // Accounts
        .route("/login", post(accounts::login))
        .route("/logout", post(accounts::logout))
        .route("/user_creation", post(accounts::user_creation))
        .route("/user_activation/:key", get(accounts::user_activation))
        .route("/user_change", get(accounts::user_profile).post(accounts::user_change))
        .route("/user_deletion", post(accounts::user_deletion))
        .route("/user_default_purse/:id", post(accounts::user_default_purse))
        .route("/password_change", post(accounts::password_change))
        .route("/password_reset", post(accounts::password_reset))
        .route("/password_reset_confirm/:key", post(accounts::password_reset_confirm))
        // Purses
        .route("/purses", get(purses::list))
        .route("/purses/create", post(purses::create))
        .route("/purses/update/:id", post(purses::update))
        .route("/purses/share/:id", post(purses::share))
        .route("/purses/delete/:id", post(purses::delete))
        // Expenditures
        .route("/expenditures", get(expenditures::home))
        .route("/expenditures/add", post(expenditures::add))
        .route("/expenditures/update/:id", post(expenditures::update))
        .route("/expenditures/delete/:id", post(expenditures::delete))
        .route("/expenditures/search", get(expenditures::search))
        .route("/expenditures/summary/:year", get(expenditures::year_summary))
        .route("/expenditures/:year/:month", get(expenditures::month_list))
        // Tags
        .route("/tags", get(expenditures::tags))
        .route("/tags/names", get(expenditures::tag_names));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .nest("/tracker", tracker_routes)
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
