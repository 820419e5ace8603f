#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use sekolah_portal::api::PortalClient;
use sekolah_portal::auth::SessionKeys;
use sekolah_portal::handlers::{self, AppState};
use sekolah_portal::middleware::SessionGuard;
use sekolah_portal::network::NetworkActivity;

pub const SECRET: &str = "integration-secret-integration-secret";
pub const COOKIE: &str = "portal.session-token";
pub const ADMIN_EMAIL: &str = "admin@sekolah.sch.id";
pub const GURU_EMAIL: &str = "guru@sekolah.sch.id";
pub const PASSWORD: &str = "rahasia123";
pub const ACTIVATION_CODE: &str = "246810";

struct Account {
    id: &'static str,
    email: &'static str,
    username: &'static str,
    full_name: &'static str,
    role: &'static str,
    token: &'static str,
}

static ACCOUNTS: [Account; 2] = [
    Account {
        id: "acc-admin",
        email: ADMIN_EMAIL,
        username: "admin",
        full_name: "Admin Sekolah",
        role: "admin",
        token: "backend-token-admin",
    },
    Account {
        id: "acc-guru",
        email: GURU_EMAIL,
        username: "darto",
        full_name: "Pak Darto",
        role: "guru",
        token: "backend-token-guru",
    },
];

/// In-memory stand-in for the REST backend
#[derive(Default)]
pub struct Store {
    pub collections: BTreeMap<String, Vec<Value>>,
    next_id: usize,
}

#[derive(Clone)]
pub struct FakeBackend {
    pub store: Arc<Mutex<Store>>,
    pub requests: Arc<AtomicUsize>,
    /// Raw query string of the latest list request
    pub last_list_query: Arc<Mutex<Option<String>>>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            requests: Arc::new(AtomicUsize::new(0)),
            last_list_query: Arc::new(Mutex::new(None)),
        }
    }

    /// Seed `count` teachers named "Guru 001", "Guru 002", ...
    pub fn seed_teachers(&self, count: usize) {
        let mut store = self.store.lock().unwrap();
        let teachers = store.collections.entry("teachers".to_string()).or_default();
        for n in 1..=count {
            teachers.push(json!({
                "_id": format!("t-{:03}", n),
                "fullName": format!("Guru {:03}", n),
                "email": format!("guru{:03}@sekolah.sch.id", n),
                "nrk": format!("{:06}", n),
                "noTelp": "0812000000"
            }));
        }
    }

    pub fn seed(&self, collection: &str, record: Value) {
        let mut store = self.store.lock().unwrap();
        store.collections.entry(collection.to_string()).or_default().push(record);
    }

    pub fn count(&self, collection: &str) -> usize {
        let store = self.store.lock().unwrap();
        store.collections.get(collection).map_or(0, Vec::len)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn last_list_query(&self) -> Option<String> {
        self.last_list_query.lock().unwrap().clone()
    }
}

pub struct TestBackend {
    pub base_url: String,
    pub fake: FakeBackend,
}

impl TestBackend {
    /// Client pointed at this backend with its own activity counter
    pub fn client(&self) -> Result<(PortalClient, Arc<NetworkActivity>)> {
        let activity = Arc::new(NetworkActivity::new());
        let client = PortalClient::new(self.base_url.clone(), Duration::from_secs(5))?.with_activity(activity.clone());
        Ok((client, activity))
    }

    pub fn client_as(&self, email: &str) -> Result<PortalClient> {
        let token = ACCOUNTS
            .iter()
            .find(|a| a.email == email)
            .map(|a| a.token)
            .context("unknown account")?;
        Ok(self.client()?.0.with_access_token(token))
    }
}

async fn serve(app: Router) -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://127.0.0.1:{}", port))
}

pub async fn spawn_backend() -> Result<TestBackend> {
    let fake = FakeBackend::new();
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me).put(update_me))
        .route("/api/auth/register", post(register))
        .route("/api/auth/activation", post(activation))
        .route("/api/:collection", get(list).post(create))
        .route("/api/:collection/:id", put(update).delete(remove))
        .with_state(fake.clone());

    let base_url = format!("{}/api", serve(app).await?);
    Ok(TestBackend { base_url, fake })
}

pub struct TestPortal {
    pub base_url: String,
    pub backend: TestBackend,
}

impl TestPortal {
    /// HTTP client that does not follow redirects, so guard answers are visible
    pub fn http(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("reqwest client")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sign in through the portal and return the session cookie value
    pub async fn sign_in(&self, email: &str) -> Result<String> {
        let res = self
            .http()
            .post(self.url("/auth/login"))
            .json(&json!({ "identifier": email, "password": PASSWORD }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::SEE_OTHER, "login answered {}", res.status());
        session_cookie(res.headers()).context("login set no session cookie")
    }
}

/// Value of the portal session cookie in a `Set-Cookie` header
pub fn session_cookie(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == COOKIE)
        .map(|(_, value)| value.to_string())
}

pub async fn spawn_portal() -> Result<TestPortal> {
    let backend = spawn_backend().await?;
    let (client, _) = backend.client()?;
    let guard = SessionGuard::new(SessionKeys::new(SECRET), COOKIE);
    let app = handlers::router(AppState::new(client, guard));

    let base_url = serve(app).await?;
    Ok(TestPortal { base_url, backend })
}

// ---- fake backend handlers --------------------------------------------------

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&'static Account> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))?;
    ACCOUNTS.iter().find(|a| a.token == token)
}

fn profile(account: &Account) -> Value {
    json!({
        "_id": account.id,
        "fullName": account.full_name,
        "username": account.username,
        "email": account.email,
        "role": account.role,
        "profilePicture": "",
        "isActive": true
    })
}

async fn login(State(fake): State<FakeBackend>, Json(body): Json<Value>) -> Response {
    fake.requests.fetch_add(1, Ordering::SeqCst);
    let identifier = body["identifier"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    match ACCOUNTS
        .iter()
        .find(|a| (a.email == identifier || a.username == identifier) && password == PASSWORD)
    {
        Some(account) => Json(json!({ "data": account.token })).into_response(),
        None => error(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn me(State(fake): State<FakeBackend>, headers: HeaderMap) -> Response {
    fake.requests.fetch_add(1, Ordering::SeqCst);
    match bearer(&headers) {
        Some(account) => Json(json!({ "data": profile(account) })).into_response(),
        None => error(StatusCode::UNAUTHORIZED, "Token expired"),
    }
}

async fn update_me(State(fake): State<FakeBackend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    fake.requests.fetch_add(1, Ordering::SeqCst);
    let Some(account) = bearer(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "Token expired");
    };
    let mut updated = profile(account);
    for key in ["fullName", "username", "email"] {
        if let Some(v) = body.get(key) {
            updated[key] = v.clone();
        }
    }
    Json(json!({ "data": updated })).into_response()
}

async fn register(State(fake): State<FakeBackend>, Json(body): Json<Value>) -> Response {
    fake.requests.fetch_add(1, Ordering::SeqCst);
    let email = body["email"].as_str().unwrap_or_default();
    if ACCOUNTS.iter().any(|a| a.email == email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Validation failed",
                "meta": { "errors": { "email": ["Email already registered"] } }
            })),
        )
            .into_response();
    }
    (StatusCode::CREATED, Json(json!({ "message": "Check your email" }))).into_response()
}

async fn activation(State(fake): State<FakeBackend>, Json(body): Json<Value>) -> Response {
    fake.requests.fetch_add(1, Ordering::SeqCst);
    if body["code"] == ACTIVATION_CODE {
        Json(json!({ "message": "Account activated" })).into_response()
    } else {
        error(StatusCode::BAD_REQUEST, "Invalid activation code")
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
}

fn matches(record: &Value, search: &str) -> bool {
    let needle = search.to_lowercase();
    ["fullName", "judul", "email"].iter().any(|key| {
        record
            .get(*key)
            .and_then(Value::as_str)
            .is_some_and(|v| v.to_lowercase().contains(&needle))
    })
}

async fn list(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
    RawQuery(raw): RawQuery,
) -> Response {
    fake.requests.fetch_add(1, Ordering::SeqCst);
    *fake.last_list_query.lock().unwrap() = raw;
    if bearer(&headers).is_none() {
        return error(StatusCode::UNAUTHORIZED, "Token expired");
    }

    let store = fake.store.lock().unwrap();
    let search = params.search.unwrap_or_default();
    let all: Vec<Value> = store
        .collections
        .get(&collection)
        .map(|records| records.iter().filter(|r| search.is_empty() || matches(r, &search)).cloned().collect())
        .unwrap_or_default();

    let page = params.page.unwrap_or(1).max(1) as usize;
    let limit = params.limit.unwrap_or(50).max(1) as usize;
    let total_pages = all.len().div_ceil(limit);
    let data: Vec<Value> = all.iter().skip((page - 1) * limit).take(limit).cloned().collect();

    Json(json!({
        "data": data,
        "pagination": { "total": all.len(), "totalPages": total_pages, "current": page }
    }))
    .into_response()
}

async fn create(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Path(collection): Path<String>,
    Json(mut body): Json<Value>,
) -> Response {
    fake.requests.fetch_add(1, Ordering::SeqCst);
    if bearer(&headers).is_none() {
        return error(StatusCode::UNAUTHORIZED, "Token expired");
    }

    let mut store = fake.store.lock().unwrap();
    if collection == "teachers" {
        let duplicate = store
            .collections
            .get("teachers")
            .is_some_and(|ts| ts.iter().any(|t| t["nrk"] == body["nrk"]));
        if duplicate {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "meta": { "errors": { "nrk": "NRK already used" } } })),
            )
                .into_response();
        }
    }

    store.next_id += 1;
    body["_id"] = json!(format!("{}-new-{}", collection, store.next_id));
    if collection == "mata-pelajaran" {
        // Populate the teacher reference the way the backend does on create
        let guru_id = body["guru"].as_str().unwrap_or_default().to_string();
        if let Some(teacher) = store
            .collections
            .get("teachers")
            .and_then(|ts| ts.iter().find(|t| t["_id"] == guru_id.as_str()))
        {
            body["guru"] = json!({ "_id": guru_id, "fullName": teacher["fullName"] });
        }
    }
    store.collections.entry(collection).or_default().push(body.clone());
    (StatusCode::CREATED, Json(json!({ "data": body }))).into_response()
}

async fn update(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    fake.requests.fetch_add(1, Ordering::SeqCst);
    if bearer(&headers).is_none() {
        return error(StatusCode::UNAUTHORIZED, "Token expired");
    }

    let mut store = fake.store.lock().unwrap();
    let Some(record) = store
        .collections
        .get_mut(&collection)
        .and_then(|records| records.iter_mut().find(|r| r["_id"] == id.as_str()))
    else {
        return error(StatusCode::NOT_FOUND, "Record not found");
    };

    if let (Some(target), Some(changes)) = (record.as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
    Json(json!({ "data": record.clone() })).into_response()
}

async fn remove(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    fake.requests.fetch_add(1, Ordering::SeqCst);
    if bearer(&headers).is_none() {
        return error(StatusCode::UNAUTHORIZED, "Token expired");
    }

    let mut store = fake.store.lock().unwrap();
    let records = store.collections.entry(collection).or_default();
    let before = records.len();
    records.retain(|r| r["_id"] != id.as_str());
    if records.len() == before {
        return error(StatusCode::NOT_FOUND, "Record not found");
    }
    StatusCode::NO_CONTENT.into_response()
}
