use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use books_scraper::{utils, Book, CatalogSnapshot, ScrapeError};
use books_server::{
    app::build_router,
    catalog::Catalog,
    db,
    handlers::jwt::JwtService,
    scrape_job::{ScrapeJobController, ScrapeReport, ScraperTask},
    state::AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

/// Writes a fixed catalogue once released.
struct GatedTask {
    output: PathBuf,
    release: Notify,
}

#[async_trait]
impl ScraperTask for GatedTask {
    async fn run(&self) -> Result<ScrapeReport, ScrapeError> {
        self.release.notified().await;
        let books = vec![book(10, "Scraped", "Travel", 12.5, 2)];
        utils::save_json(&CatalogSnapshot::new("test", books), &self.output).await?;
        Ok(ScrapeReport {
            output: self.output.clone(),
        })
    }
}

struct TestApp {
    router: Router,
    controller: ScrapeJobController,
    task: Arc<GatedTask>,
    _dir: TempDir,
}

fn book(id: u32, title: &str, category: &str, price: f64, rating: u8) -> Book {
    Book {
        id,
        title: title.into(),
        category: category.into(),
        price,
        rating,
        in_stock: true,
        product_url: format!("https://books.toscrape.com/catalogue/{id}/index.html"),
        image_url: None,
    }
}

async fn setup() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let books_path = dir.path().join("books.json");
    let books = vec![
        book(1, "Dom Casmurro", "Fiction", 29.90, 4),
        book(2, "1984", "Fiction", 35.00, 5),
        book(3, "A Light in the Attic", "Poetry", 51.77, 3),
    ];
    utils::save_json(&CatalogSnapshot::new("test", books), &books_path)
        .await
        .unwrap();

    let pool = db::init_db("sqlite::memory:").await.unwrap();
    db::create_user(&pool, "admin", "password").await.unwrap();

    let task = Arc::new(GatedTask {
        output: books_path.clone(),
        release: Notify::new(),
    });
    let controller = ScrapeJobController::with_max_run_duration(
        task.clone(),
        Duration::from_secs(30),
    );
    let jwt = JwtService::new(
        "test_secret",
        Duration::from_secs(15 * 60),
        Duration::from_secs(24 * 60 * 60),
    );

    let state = AppState::new(pool, jwt, Catalog::new(&books_path), controller.clone());
    TestApp {
        router: build_router(state, None),
        controller,
        task,
        _dir: dir,
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn login(app: &Router) -> (String, String) {
    let (status, body) = send(
        app,
        post(
            "/api/v1/auth/login",
            None,
            json!({ "username": "admin", "password": "password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn public_routes_need_no_token() {
    let app = setup().await;

    let (status, _) = send(&app.router, get("/", None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app.router, get("/api/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = setup().await;

    for payload in [
        json!({ "username": "admin", "password": "wrong" }),
        json!({ "username": "ghost", "password": "password" }),
    ] {
        let (status, body) = send(&app.router, post("/api/v1/auth/login", None, payload)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
    }
}

#[tokio::test]
async fn protected_routes_require_a_valid_access_token() {
    let app = setup().await;

    let (status, _) = send(&app.router, get("/api/v1/books", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, get("/api/v1/scraping/status", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, refresh) = login(&app.router).await;
    let (status, body) = send(&app.router, get("/api/v1/books", Some(&refresh))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Expected an access token");
}

#[tokio::test]
async fn login_cookie_authenticates() {
    let app = setup().await;

    let res = app
        .router
        .clone()
        .oneshot(post(
            "/api/v1/auth/login",
            None,
            json!({ "username": "admin", "password": "password" }),
        ))
        .await
        .unwrap();
    let cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("axtoken="));

    let req = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "admin");
}

#[tokio::test]
async fn refresh_issues_a_new_access_token() {
    let app = setup().await;
    let (access, refresh) = login(&app.router).await;

    let (status, _) = send(&app.router, post("/api/v1/auth/refresh", Some(&access), json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) =
        send(&app.router, post("/api/v1/auth/refresh", Some(&refresh), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let renewed = body["access_token"].as_str().unwrap();

    let (status, body) = send(&app.router, get("/api/v1/auth/me", Some(renewed))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "admin");
}

#[tokio::test]
async fn trigger_is_single_flight_over_http() {
    let app = setup().await;
    let (token, _) = login(&app.router).await;

    let (status, body) =
        send(&app.router, post("/api/v1/scraping/trigger", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Scraping started");
    assert_eq!(body["status"]["running"], true);
    assert_eq!(body["status"]["started_by"], "admin");

    let (status, body) =
        send(&app.router, post("/api/v1/scraping/trigger", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already running"));

    let (status, body) = send(&app.router, get("/api/v1/scraping/status", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], true);

    app.task.release.notify_one();
    let mut rx = app.controller.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| !s.running))
        .await
        .unwrap()
        .unwrap();

    let (_, body) = send(&app.router, get("/api/v1/scraping/status", Some(&token))).await;
    assert_eq!(body["running"], false);
    assert_eq!(body["books_scraped"], 1);
    assert!(body["error"].is_null());
    assert!(body["end_time"].is_string());

    // the catalogue now serves the scraped file
    let (_, body) = send(&app.router, get("/api/v1/books", Some(&token))).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Scraped");
}

#[tokio::test]
async fn book_queries() {
    let app = setup().await;
    let (token, _) = login(&app.router).await;
    let t = Some(token.as_str());

    let (status, body) = send(&app.router, get("/api/v1/books", t)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = send(&app.router, get("/api/v1/books/2", t)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "1984");

    let (status, body) = send(&app.router, get("/api/v1/books/99", t)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Book not found");

    let (_, body) = send(&app.router, get("/api/v1/books/search?title=attic", t)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app.router, get("/api/v1/books/search?category=FICTION", t)).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = send(&app.router, get("/api/v1/books/top-rated?limit=5", t)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["rating"], 5);

    let (status, body) = send(&app.router, get("/api/v1/books/price-range?min=30", t)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = send(&app.router, get("/api/v1/books/price-range", t)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app.router, get("/api/v1/categories", t)).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["categories"], json!(["Fiction", "Poetry"]));

    let (_, body) = send(&app.router, get("/api/v1/stats/overview", t)).await;
    assert_eq!(body["total_books"], 3);

    let (_, body) = send(&app.router, get("/api/v1/stats/categories", t)).await;
    assert_eq!(body[0]["category"], "Fiction");
    assert_eq!(body[0]["total_books"], 2);
}

#[tokio::test]
async fn unknown_routes_get_a_json_404() {
    let app = setup().await;

    let (status, body) = send(&app.router, get("/api/v1/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn analytics_counts_requests_per_route() {
    let app = setup().await;
    let (token, _) = login(&app.router).await;

    send(&app.router, get("/api/v1/books/1", Some(&token))).await;
    send(&app.router, get("/api/v1/books/99", Some(&token))).await;

    let (status, body) = send(&app.router, get("/api/v1/analytics", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let routes = body["routes"].as_array().unwrap();
    let books = routes
        .iter()
        .find(|r| r["route"] == "GET /api/v1/books/{id}")
        .unwrap();
    assert_eq!(books["requests"], 2);
    assert_eq!(books["errors"], 1);
    assert!(body["total_requests"].as_u64().unwrap() >= 3);
}
