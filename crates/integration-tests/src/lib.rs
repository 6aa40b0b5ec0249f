//! Integration test harness for the Morada portal.
//!
//! Each test gets its own fake listings backend on a loopback port and a
//! portal router pointed at it, with sessions kept in memory. Requests are
//! driven through the router with `tower::ServiceExt::oneshot`; the backend
//! records every hit so tests can assert which calls were (not) made.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p morada-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::body::{Body, Bytes, to_bytes};
use axum::extract::{Path, RawQuery, Request, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use morada_web::config::{ApiConfig, IdentityConfig, PortalConfig};
use morada_web::middleware::{SESSION_COOKIE_NAME, session_layer, signing_key};
use morada_web::state::AppState;

/// Bearer token issued by the fake backend.
pub const TOKEN: &str = "tok-1";
/// The only password the fake backend accepts.
pub const PASSWORD: &str = "senha-correta";
pub const EMAIL: &str = "maria@example.com";

/// Rate limiters key on the client address; oneshot requests have none.
const CLIENT_IP: &str = "203.0.113.9";

const FORM_TYPE: &str = "application/x-www-form-urlencoded";
const BOUNDARY: &str = "morada-test-boundary";

const SESSION_SECRET: &str = "k7Qp2vX9mZ4rT8wL1nB6cY3hJ5fD0sGaE9uR2iO7pK4lM1qW8eN3tV6xC5zA0bHy";

// =============================================================================
// Fake backend
// =============================================================================

/// One request received by the fake backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
}

/// Shared log of backend hits.
#[derive(Debug, Clone, Default)]
pub struct Hits(Arc<Mutex<Vec<Hit>>>);

impl Hits {
    /// Whether the backend saw `method path`.
    pub async fn contains(&self, method: &Method, path: &str) -> bool {
        self.0
            .lock()
            .await
            .iter()
            .any(|hit| hit.method == *method && hit.path == path)
    }

    /// Query string of the latest hit on `path`.
    pub async fn last_query(&self, path: &str) -> Option<String> {
        self.0
            .lock()
            .await
            .iter()
            .rev()
            .find(|hit| hit.path == path)
            .and_then(|hit| hit.query.clone())
    }
}

async fn record(State(hits): State<Hits>, request: Request, next: Next) -> Response {
    hits.0.lock().await.push(Hit {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
    });
    next.run(request).await
}

/// Listing fixture with two photos.
#[must_use]
pub fn property_json(id: i64) -> Value {
    json!({
        "id": id,
        "title": "Apartamento no Cambuí",
        "description": "Dois quartos perto do parque.",
        "property_type": "apartment",
        "purpose": "rent",
        "rent_price": "2500",
        "condo_fee": "450",
        "address": {
            "street": "Rua Maria Monteiro",
            "number": "100",
            "bairro": "Cambuí",
            "city": "Campinas",
            "state": "SP",
            "cep": "13025-151"
        },
        "bedrooms": 2,
        "bathrooms": 1,
        "parking_spots": 1,
        "area": 68,
        "amenities": { "pool": true, "gym": true },
        "images": [
            "https://img.example/img1.jpg",
            "https://img.example/img2.jpg"
        ],
        "status": "approved",
        "created_at": "2026-03-02T14:00:00Z",
        "updated_at": "2026-03-02T14:00:00Z"
    })
}

/// Client account fixture.
#[must_use]
pub fn user_json() -> Value {
    json!({
        "id": 7,
        "name": "Maria Silva",
        "email": EMAIL,
        "phone": "(19) 99876-5432",
        "address": {
            "street": "Rua Maria Monteiro",
            "number": "100",
            "bairro": "Cambuí",
            "city": "Campinas",
            "state": "SP",
            "cep": "13025-151"
        },
        "user_type": "client",
        "created_at": "2026-01-05T09:30:00Z"
    })
}

/// Account created by the fake `POST /auth/register`, echoing the request.
fn registered_user_json(body: &Value) -> Value {
    json!({
        "id": 8,
        "name": body.get("name").cloned().unwrap_or_default(),
        "email": body.get("email").cloned().unwrap_or_default(),
        "phone": body.get("phone").cloned().unwrap_or_default(),
        "address": body.get("address").cloned().unwrap_or_default(),
        "user_type": body.get("user_type").cloned().unwrap_or_default(),
        "created_at": "2026-03-10T12:00:00Z"
    })
}

/// Switches that make the fake backend fail on purpose.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    documents: Arc<AtomicBool>,
    favorites_list: Arc<AtomicBool>,
    expired_token: Arc<AtomicBool>,
}

impl Faults {
    /// `POST /auth/broker-documents` answers 500.
    pub fn fail_documents(&self, fail: bool) {
        self.documents.store(fail, Ordering::SeqCst);
    }

    /// `GET /favorites` answers 500.
    pub fn fail_favorites_list(&self, fail: bool) {
        self.favorites_list.store(fail, Ordering::SeqCst);
    }

    /// Every bearer token is rejected with 401.
    pub fn expire_token(&self, expired: bool) {
        self.expired_token.store(expired, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct Backend {
    faults: Faults,
    favorites: Arc<Mutex<BTreeSet<i64>>>,
    registrations: Arc<Mutex<Vec<Value>>>,
}

impl Backend {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        !self.faults.expired_token.load(Ordering::SeqCst)
            && headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == format!("Bearer {TOKEN}"))
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Falha interna" })),
    )
        .into_response()
}

async fn backend_properties() -> Json<Value> {
    Json(json!({
        "items": [property_json(1)],
        "total": 1,
        "page": 1,
        "limit": 12
    }))
}

async fn backend_property(Path(id): Path<i64>) -> Response {
    match id {
        1 => Json(property_json(1)).into_response(),
        500 => internal_error(),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response(),
    }
}

async fn backend_login(Json(body): Json<Value>) -> Response {
    if body.get("password").and_then(Value::as_str) == Some(PASSWORD) {
        Json(json!({ "token": TOKEN, "user": user_json() })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "invalid credentials" })),
        )
            .into_response()
    }
}

async fn backend_register(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    let user = registered_user_json(&body);
    backend.registrations.lock().await.push(body);
    (StatusCode::CREATED, Json(json!({ "token": TOKEN, "user": user }))).into_response()
}

async fn backend_email_status(RawQuery(query): RawQuery) -> Json<Value> {
    let exists = query.is_some_and(|q| q.contains("maria%40example.com"));
    Json(json!({ "exists": exists }))
}

async fn backend_me(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if backend.authorized(&headers) {
        Json(user_json()).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn backend_broker_upgrade(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut user = user_json();
    user["creci"] = body.get("creci").cloned().unwrap_or_default();
    user["broker_status"] = json!("pending_verification");
    Json(user).into_response()
}

async fn backend_broker_documents(
    State(backend): State<Backend>,
    headers: HeaderMap,
    _files: Bytes,
) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if backend.faults.documents.load(Ordering::SeqCst) {
        return internal_error();
    }
    Json(json!({
        "creci_front_url": "https://img.example/docs/front.jpg",
        "creci_back_url": "https://img.example/docs/back.jpg",
        "selfie_url": "https://img.example/docs/selfie.jpg",
        "status": "pending"
    }))
    .into_response()
}

async fn backend_favorites(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if backend.faults.favorites_list.load(Ordering::SeqCst) {
        return internal_error();
    }
    let favorites = backend.favorites.lock().await;
    Json(favorites.iter().map(|id| property_json(*id)).collect::<Vec<_>>()).into_response()
}

async fn backend_add_favorite(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if id == 500 {
        return internal_error();
    }
    backend.favorites.lock().await.insert(id);
    StatusCode::NO_CONTENT.into_response()
}

async fn backend_remove_favorite(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    backend.favorites.lock().await.remove(&id);
    StatusCode::NO_CONTENT.into_response()
}

async fn backend_notifications(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if backend.authorized(&headers) {
        Json(json!([])).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn backend_mark_read(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !backend.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if id == 500 {
        return internal_error();
    }
    StatusCode::NO_CONTENT.into_response()
}

fn backend_router(hits: Hits, backend: Backend) -> Router {
    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/properties", get(backend_properties))
        .route("/properties/{id}", get(backend_property))
        .route(
            "/brokers/{id}",
            get(|| async { StatusCode::NOT_FOUND }),
        )
        .route("/auth/login", post(backend_login))
        .route("/auth/register", post(backend_register))
        .route("/auth/email-status", get(backend_email_status))
        .route("/auth/me", get(backend_me))
        .route("/auth/profile", put(backend_me))
        .route("/auth/broker-upgrade", post(backend_broker_upgrade))
        .route("/auth/broker-documents", post(backend_broker_documents))
        .route("/favorites", get(backend_favorites))
        .route(
            "/favorites/{id}",
            post(backend_add_favorite).delete(backend_remove_favorite),
        )
        .route("/notifications", get(backend_notifications))
        .route("/notifications/{id}/read", patch(backend_mark_read))
        .with_state(backend)
        .layer(from_fn_with_state(hits, record))
}

/// A fake listings backend listening on a loopback port.
pub struct FakeBackend {
    pub base_url: String,
    pub hits: Hits,
    pub faults: Faults,
    favorites: Arc<Mutex<BTreeSet<i64>>>,
    registrations: Arc<Mutex<Vec<Value>>>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let hits = Hits::default();
        let backend = Backend {
            faults: Faults::default(),
            favorites: Arc::default(),
            registrations: Arc::default(),
        };
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let app = backend_router(hits.clone(), backend.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}"),
            hits,
            faults: backend.faults,
            favorites: backend.favorites,
            registrations: backend.registrations,
        }
    }

    /// Base URL of a port nothing listens on.
    #[must_use]
    pub fn unreachable_url() -> String {
        "http://127.0.0.1:9".to_string()
    }

    /// Mark a property as already favorited by the fixture account.
    pub async fn seed_favorite(&self, id: i64) {
        self.favorites.lock().await.insert(id);
    }

    /// Body of the latest `POST /auth/register`.
    pub async fn last_registration(&self) -> Option<Value> {
        self.registrations.lock().await.last().cloned()
    }
}

// =============================================================================
// Portal
// =============================================================================

/// Portal configuration pointed at `api_base_url`, without identity provider
/// or image hosting.
#[must_use]
pub fn test_config(api_base_url: &str) -> PortalConfig {
    PortalConfig {
        database_url: SecretString::from("postgres://unused@localhost/morada"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from(SESSION_SECRET),
        api: ApiConfig {
            base_url: api_base_url.to_string(),
            timeout: Duration::from_secs(5),
        },
        identity: IdentityConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            google_client_id: None,
        },
        upload: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Portal router plus the backend it talks to.
pub struct TestPortal {
    pub app: Router,
    pub backend: FakeBackend,
}

impl TestPortal {
    pub async fn start() -> Self {
        let backend = FakeBackend::start().await;
        let app = portal_app(&backend.base_url);
        Self { app, backend }
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        self.send(Method::GET, path, cookie, None, false).await
    }

    /// Post a urlencoded form.
    pub async fn post_form(&self, path: &str, body: &str, cookie: Option<&str>) -> Response {
        self.send(Method::POST, path, cookie, Some((FORM_TYPE, body.to_string())), false)
            .await
    }

    /// Post a urlencoded form as HTMX.
    pub async fn post_htmx(&self, path: &str, body: &str, cookie: Option<&str>) -> Response {
        self.send(Method::POST, path, cookie, Some((FORM_TYPE, body.to_string())), true)
            .await
    }

    /// Post a multipart form. `files` are `(field, file name, content type)`
    /// and carry a few placeholder bytes each.
    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &str)],
        cookie: Option<&str>,
    ) -> Response {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        for (name, file_name, content_type) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: {content_type}\r\n\r\nplaceholder-bytes\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
        self.send(Method::POST, path, cookie, Some((content_type.as_str(), body)), false)
            .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        cookie: Option<&str>,
        body: Option<(&str, String)>,
        htmx: bool,
    ) -> Response {
        let mut builder = axum::http::Request::builder()
            .method(method)
            .uri(path)
            .header("x-forwarded-for", CLIENT_IP);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if htmx {
            builder = builder.header("hx-request", "true");
        }
        let body = match body {
            Some((content_type, body)) => {
                builder = builder.header(header::CONTENT_TYPE, content_type);
                Body::from(body)
            }
            None => Body::empty(),
        };
        self.app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    /// Sign in with the fixture account; returns the session cookie.
    pub async fn sign_in(&self) -> String {
        let body = format!("email=maria%40example.com&password={PASSWORD}");
        let response = self.post_form("/login", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).unwrap()
    }
}

/// Build the portal router against a backend, with in-memory sessions.
#[must_use]
pub fn portal_app(api_base_url: &str) -> Router {
    let config = test_config(api_base_url);
    let key = signing_key(&config.session_secret).unwrap();
    let sessions = session_layer(MemoryStore::default(), key, false);
    let state = AppState::new(config).unwrap();
    morada_web::build_app(state, sessions)
}

/// `morada_session=<value>` from a response's `Set-Cookie`, if any.
#[must_use]
pub fn session_cookie(response: &Response) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Response header as a string, or `""`.
#[must_use]
pub fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
