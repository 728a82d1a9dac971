use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Datelike, Utc};
use purse_tracker::api::{router, AppState};
use purse_tracker::{open_in_memory, Config, MemoryMailer};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    mailer: Arc<MemoryMailer>,
}

impl TestApp {
    fn new() -> Self {
        let mailer = Arc::new(MemoryMailer::new());
        let state = AppState::new(open_in_memory().unwrap(), Config::for_tests(), mailer.clone());
        TestApp {
            app: router(state),
            mailer,
        }
    }

    async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Key at the end of the last mailed URL
    fn last_mailed_key(&self) -> String {
        let mail = self.mailer.last().expect("no mail sent");
        let url = mail
            .body
            .split_whitespace()
            .find(|word| word.starts_with("http"))
            .expect("no URL in mail");
        url.rsplit('/').next().unwrap().to_string()
    }

    /// Register, activate and log in; returns the session token
    async fn signup(&self, username: &str) -> String {
        let (status, _) = self
            .post(
                "/api/tracker/user_creation",
                None,
                json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password1": "correct horse",
                    "password2": "correct horse",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let key = self.last_mailed_key();
        let (status, body) = self.get(&format!("/api/tracker/user_activation/{}", key), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_active"], true);

        let (status, body) = self
            .post(
                "/api/tracker/login",
                None,
                json!({ "username": username, "password": "correct horse" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn create_purse(&self, token: &str, name: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/tracker/purses/create",
                Some(token),
                json!({ "name": name, "description": "" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "OK");
}

#[tokio::test]
async fn test_requires_authentication() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/tracker/purses", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/api/tracker/purses", Some("not-a-session")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_inactive_account_cannot_log_in() {
    let app = TestApp::new();
    app.post(
        "/api/tracker/user_creation",
        None,
        json!({
            "username": "bob",
            "email": "bob@example.com",
            "password1": "pw",
            "password2": "pw",
        }),
    )
    .await;

    let (status, _) = app
        .post("/api/tracker/login", None, json!({ "username": "bob", "password": "pw" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_creation_validation() {
    let app = TestApp::new();
    app.signup("alice").await;

    let (status, body) = app
        .post(
            "/api/tracker/user_creation",
            None,
            json!({
                "username": "alice",
                "email": "not-an-email",
                "password1": "one",
                "password2": "two",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["username"].is_array());
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["password2"].is_array());
}

#[tokio::test]
async fn test_expenditures_need_a_purse() {
    let app = TestApp::new();
    let token = app.signup("alice").await;

    let (status, body) = app.get("/api/tracker/expenditures/2024/05", Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["redirect"], "/api/tracker/purses/create");
}

#[tokio::test]
async fn test_expenditure_flow() {
    let app = TestApp::new();
    let token = app.signup("alice").await;
    let purse_id = app.create_purse(&token, "Home").await;

    let today = Utc::now().date_naive();
    let (status, body) = app
        .post(
            "/api/tracker/expenditures/add",
            Some(&token),
            json!({
                "amount": "12,50",
                "date": today.format("%Y-%m-%d").to_string(),
                "description": "Bread and cheese",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["expenditure"]["amount"], 12.5);
    assert_eq!(body["data"]["expenditure"]["purse_id"], purse_id);
    let id = body["data"]["expenditure"]["id"].as_i64().unwrap();

    let uri = format!("/api/tracker/expenditures/{}/{:02}", today.year(), today.month());
    let (status, body) = app.get(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["expenditures"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["editable"], true);
    assert_eq!(body["data"]["total_amount"], 12.5);
    assert_eq!(body["data"]["user_amount"], 12.5);

    // Tags were extracted from the description
    let (status, body) = app.get("/api/tracker/tags", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"bread"));
    assert!(names.contains(&"cheese"));

    let (status, body) = app
        .get("/api/tracker/expenditures/search?filter=CHEESE", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["expenditures"]["total"], 1);
    assert_eq!(body["data"]["keywords"], "keyword CHEESE");

    let (status, _) = app
        .post(&format!("/api/tracker/expenditures/delete/{}", id), Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&uri, Some(&token)).await;
    assert_eq!(body["data"]["expenditures"]["total"], 0);
}

#[tokio::test]
async fn test_month_list_pagination() {
    let app = TestApp::new();
    let token = app.signup("alice").await;
    app.create_purse(&token, "Home").await;
    for (day, description) in [(3, "bread"), (12, "cinema"), (25, "books")] {
        let (status, _) = app
            .post(
                "/api/tracker/expenditures/add",
                Some(&token),
                json!({
                    "amount": "10",
                    "date": format!("2024-05-{:02}", day),
                    "description": description,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .get("/api/tracker/expenditures/2024/05?paginate_by=2&page=last", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"]["expenditures"];
    assert_eq!(page["number"], 2);
    assert_eq!(page["num_pages"], 2);
    assert_eq!(page["has_previous"], true);
    assert_eq!(page["has_next"], false);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    // Newest first, so the oldest lands on the last page
    assert_eq!(items[0]["description"], "bread");

    let (status, _) = app
        .get("/api/tracker/expenditures/2024/05?paginate_by=2&page=5", Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .get("/api/tracker/expenditures/2024/05?page=first", Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // An unusable page size falls back to the configured default
    for size in ["abc", "0"] {
        let (status, body) = app
            .get(&format!("/api/tracker/expenditures/2024/05?paginate_by={}", size), Some(&token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["expenditures"]["per_page"], 15);
        assert_eq!(body["data"]["expenditures"]["items"].as_array().unwrap().len(), 3);
    }
}

#[tokio::test]
async fn test_invalid_expenditure_is_rejected() {
    let app = TestApp::new();
    let token = app.signup("alice").await;
    app.create_purse(&token, "Home").await;

    let (status, body) = app
        .post(
            "/api/tracker/expenditures/add",
            Some(&token),
            json!({ "amount": "0", "date": "2024-13-40", "description": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["amount"].is_array());
    assert!(body["errors"]["date"].is_array());
    assert!(body["errors"]["description"].is_array());
}

#[tokio::test]
async fn test_foreign_purse_is_forbidden() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let purse_id = app.create_purse(&alice, "Alice's").await;
    app.create_purse(&bob, "Bob's").await;

    let (status, _) = app
        .post(
            &format!("/api/tracker/purses/update/{}", purse_id),
            Some(&bob),
            json!({ "name": "Mine now", "description": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_shared_purse() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let purse_id = app.create_purse(&alice, "Flat").await;

    let (status, body) = app
        .post(
            &format!("/api/tracker/purses/share/{}", purse_id),
            Some(&alice),
            json!({ "user": "bob" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "bob");
    assert_eq!(body["data"]["display_name"], "bob");
    // Sharing must not disclose the new member's address
    assert!(body["data"].get("email").is_none());
    assert!(body["data"].get("is_active").is_none());

    let (status, _) = app
        .post(
            &format!("/api/tracker/user_default_purse/{}", purse_id),
            Some(&bob),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/tracker/purses", Some(&bob)).await;
    assert_eq!(status, StatusCode::OK);
    let purses = body["data"]["items"].as_array().unwrap();
    assert_eq!(purses.len(), 1);
    assert_eq!(purses[0]["shared"], true);
    assert_eq!(purses[0]["is_default"], true);

    // Leaving keeps the purse for the remaining member
    let (status, body) = app
        .post(&format!("/api/tracker/purses/delete/{}", purse_id), Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], false);

    let (_, body) = app.get("/api/tracker/purses", Some(&alice)).await;
    assert_eq!(body["data"]["items"][0]["shared"], false);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    let token = app.signup("alice").await;

    let (status, _) = app.post("/api/tracker/logout", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/tracker/user_change", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset() {
    let app = TestApp::new();
    app.signup("alice").await;

    let (status, _) = app
        .post("/api/tracker/password_reset", None, json!({ "email": "alice@example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let key = app.last_mailed_key();

    let (status, _) = app
        .post(
            &format!("/api/tracker/password_reset_confirm/{}", key),
            None,
            json!({ "new_password1": "battery staple", "new_password2": "battery staple" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/tracker/login",
            None,
            json!({ "username": "alice", "password": "battery staple" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
