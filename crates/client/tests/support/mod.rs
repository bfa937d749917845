//! In-process fake of the ledger API, bound to an ephemeral port.
//!
//! Mirrors `/api/login`, `/api/register` and `/api/transactions[/:id]`
//! (GET, POST, PUT, DELETE), and
//! records every request it sees so tests can assert on the wire traffic.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

pub const FIXED_DATE: &str = "Fri, 01 Mar 2024 09:30:00 GMT";

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Inner {
    passwords: HashMap<String, String>,
    issued: HashMap<String, String>,
    token_owner: HashMap<String, String>,
    transactions: Vec<(String, Value)>,
    next_id: i64,
    locked: HashMap<String, String>,
    requests: Vec<RecordedRequest>,
    fail_writes: bool,
    fail_reads: bool,
    read_delay: Duration,
}

#[derive(Clone, Default)]
pub struct ServerState {
    inner: Arc<Mutex<Inner>>,
}

pub struct FakeServer {
    pub base_url: String,
    state: ServerState,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeServer {
    pub async fn spawn() -> Self {
        let state = ServerState::default();
        state.inner.lock().unwrap().next_id = 1;

        let app = Router::new()
            .route("/api/login", post(login))
            .route("/api/register", post(register))
            .route("/api/transactions", get(list).post(create))
            .route("/api/transactions/:id", axum::routing::put(update).delete(remove))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            state,
            handle,
        }
    }

    /// Register a user that receives `token` on every successful login.
    pub fn add_user(&self, username: &str, password: &str, token: &str) {
        let mut inner = self.state.inner.lock().unwrap();
        inner.passwords.insert(username.into(), password.into());
        inner.issued.insert(username.into(), token.into());
        inner.token_owner.insert(token.into(), username.into());
    }

    /// Insert a transaction for `owner` with an explicit id.
    pub fn seed(&self, owner: &str, id: impl Into<Value>, kind: &str, category: &str, amount: &str) {
        let id = id.into();
        let mut inner = self.state.inner.lock().unwrap();
        if let Some(n) = id.as_i64() {
            inner.next_id = inner.next_id.max(n + 1);
        }
        inner.transactions.push((
            owner.into(),
            json!({
                "id": id,
                "type": kind,
                "category": category,
                "amount": amount,
                "note": null,
                "date": FIXED_DATE,
            }),
        ));
    }

    pub fn revoke(&self, token: &str) {
        self.state.inner.lock().unwrap().token_owner.remove(token);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.inner.lock().unwrap().fail_writes = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.inner.lock().unwrap().fail_reads = fail;
    }

    /// Hold every ledger GET for `delay` before answering.
    pub fn delay_reads(&self, delay: Duration) {
        self.state.inner.lock().unwrap().read_delay = delay;
    }

    /// Answer logins for `username` with `200 {"error": message}`.
    pub fn lock_user(&self, username: &str, message: &str) {
        self.state
            .inner
            .lock()
            .unwrap()
            .locked
            .insert(username.into(), message.into());
    }

    /// Current stored record for `id`, if any.
    pub fn transaction(&self, id: i64) -> Option<Value> {
        self.state
            .inner
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|(_, tx)| tx["id"] == json!(id))
            .map(|(_, tx)| tx.clone())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.inner.lock().unwrap().requests.clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn user_exists(&self, username: &str) -> bool {
        self.state.inner.lock().unwrap().passwords.contains_key(username)
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn id_matches(tx: &Value, id: &str) -> bool {
    match &tx["id"] {
        Value::String(s) => s == id,
        other => other.to_string() == id,
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl ServerState {
    fn record(&self, method: &'static str, path: String, headers: &HeaderMap, body: Option<Value>) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.inner.lock().unwrap().requests.push(RecordedRequest {
            method,
            path,
            authorization,
            body,
        });
    }

    fn owner(&self, headers: &HeaderMap) -> Option<String> {
        let header = headers.get("authorization")?.to_str().ok()?;
        let token = header.strip_prefix("Bearer ")?;
        self.inner.lock().unwrap().token_owner.get(token).cloned()
    }
}

async fn login(State(state): State<ServerState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST", "/api/login".into(), &headers, Some(body.clone()));

    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let inner = state.inner.lock().unwrap();
    if let Some(message) = inner.locked.get(username) {
        return (StatusCode::OK, Json(json!({ "error": message }))).into_response();
    }
    match inner.passwords.get(username) {
        Some(expected) if expected == password => {
            let token = inner.issued.get(username).cloned().unwrap_or_default();
            (StatusCode::OK, Json(json!({ "token": token }))).into_response()
        }
        _ => error(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn register(State(state): State<ServerState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST", "/api/register".into(), &headers, Some(body.clone()));

    let username = body["username"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    if username.is_empty() || password.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Username and password required");
    }

    let mut inner = state.inner.lock().unwrap();
    if inner.passwords.contains_key(&username) {
        return error(StatusCode::CONFLICT, "User already exists");
    }
    let token = format!("token-{username}");
    inner.passwords.insert(username.clone(), password);
    inner.issued.insert(username.clone(), token.clone());
    inner.token_owner.insert(token, username);
    (StatusCode::CREATED, Json(json!({ "message": "User created" }))).into_response()
}

async fn list(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    state.record("GET", "/api/transactions".into(), &headers, None);

    let delay = state.inner.lock().unwrap().read_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let Some(owner) = state.owner(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let inner = state.inner.lock().unwrap();
    if inner.fail_reads {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    let rows: Vec<Value> = inner
        .transactions
        .iter()
        .filter(|(o, _)| *o == owner)
        .map(|(_, tx)| tx.clone())
        .collect();
    (StatusCode::OK, Json(Value::Array(rows))).into_response()
}

async fn create(State(state): State<ServerState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST", "/api/transactions".into(), &headers, Some(body.clone()));

    let Some(owner) = state.owner(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let mut inner = state.inner.lock().unwrap();
    if inner.fail_writes {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }

    let id = inner.next_id;
    inner.next_id += 1;
    let tx = json!({
        "id": id,
        "type": body["type"],
        "category": body["category"],
        "amount": body["amount"],
        "note": body["note"],
        "date": body.get("date").cloned().unwrap_or_else(|| json!(FIXED_DATE)),
    });
    inner.transactions.push((owner, tx.clone()));
    (StatusCode::CREATED, Json(tx)).into_response()
}

async fn update(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.record("PUT", format!("/api/transactions/{id}"), &headers, Some(body.clone()));

    let Some(owner) = state.owner(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let mut inner = state.inner.lock().unwrap();
    if inner.fail_writes {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }

    let Some((_, tx)) = inner
        .transactions
        .iter_mut()
        .find(|(o, tx)| *o == owner && id_matches(tx, &id))
    else {
        return (StatusCode::NOT_FOUND, Json(json!({ "msg": "Not found" }))).into_response();
    };
    for field in ["type", "category", "amount", "note"] {
        tx[field] = body[field].clone();
    }
    tx["date"] = body.get("date").cloned().unwrap_or_else(|| json!(FIXED_DATE));
    (StatusCode::OK, Json(json!({ "msg": "Updated" }))).into_response()
}

async fn remove(State(state): State<ServerState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    state.record("DELETE", format!("/api/transactions/{id}"), &headers, None);

    let Some(owner) = state.owner(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let mut inner = state.inner.lock().unwrap();
    if inner.fail_writes {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }

    let before = inner.transactions.len();
    inner
        .transactions
        .retain(|(o, tx)| !(*o == owner && id_matches(tx, &id)));
    if inner.transactions.len() == before {
        return error(StatusCode::NOT_FOUND, "Transaction not found");
    }
    StatusCode::NO_CONTENT.into_response()
}
