//! In-memory stand-in for the EmitKit HTTP API.
//!
//! Implements enough of the real service for client tests: bearer auth, a
//! fixed-window rate limit reported through `X-RateLimit-*` headers, payload
//! validation with field-level details, idempotent replay, and partial alias
//! failure on identify.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::Mutex};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const REPLAY_HEADER: &str = "x-idempotent-replay";
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

pub const DEFAULT_API_KEY: &str = "emitkit_test_key";

#[derive(Clone, Debug)]
pub struct MockConfig {
    /// The only key accepted in `Authorization: Bearer <key>`.
    pub api_key: String,
    /// Requests allowed per window.
    pub rate_limit: u64,
    pub window: Duration,
    /// Artificial delay before every response.
    pub latency: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            rate_limit: 100,
            window: Duration::from_secs(60),
            latency: Duration::ZERO,
        }
    }
}

impl MockConfig {
    /// Defaults overridden by `MOCK_API_KEY` and `MOCK_RATE_LIMIT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("MOCK_API_KEY") {
            config.api_key = key;
        }
        if let Some(limit) = std::env::var("MOCK_RATE_LIMIT").ok().and_then(|v| v.parse().ok()) {
            config.rate_limit = limit;
        }
        config
    }
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<MockConfig>,
    db: Arc<Mutex<Db>>,
}

#[derive(Default)]
struct Db {
    events: HashMap<String, Value>,
    identities: HashMap<String, IdentityRecord>,
    alias_owners: HashMap<String, String>,
    idempotency: HashMap<String, Cached>,
    window: RateWindow,
}

#[derive(Default)]
struct RateWindow {
    started_at: i64,
    used: u64,
}

struct IdentityRecord {
    id: String,
    properties: Map<String, Value>,
}

struct Cached {
    payload: Value,
    status: StatusCode,
    body: Value,
}

#[derive(Clone, Copy, Debug)]
enum Resource {
    Events,
    Identify,
}

type Details = Vec<Value>;

impl AppState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Arc::new(config),
            db: Arc::new(Mutex::new(Db::default())),
        }
    }

    /// Number of events actually stored; replays do not add to it.
    pub async fn event_count(&self) -> usize {
        self.db.lock().await.events.len()
    }

    async fn handle(&self, resource: Resource, headers: &HeaderMap, raw: &[u8]) -> Response {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
        let request_id = format!("req_{}", Uuid::new_v4().simple());

        let expected = format!("Bearer {}", self.config.api_key);
        let authorized = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected);
        if !authorized {
            return reply(
                StatusCode::UNAUTHORIZED,
                HeaderMap::new(),
                json!({"error": "Unauthorized", "requestId": request_id}),
            );
        }

        let mut db = self.db.lock().await;
        let (allowed, mut out) = db.window.take(&self.config);
        if !allowed {
            info!(?resource, "rate limit exceeded");
            return reply(
                StatusCode::TOO_MANY_REQUESTS,
                out,
                json!({"error": "Rate limit exceeded", "requestId": request_id}),
            );
        }

        let Ok(payload) = serde_json::from_slice::<Value>(raw) else {
            return reply(
                StatusCode::BAD_REQUEST,
                out,
                json!({"error": "Invalid JSON body", "requestId": request_id}),
            );
        };

        let key = headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(cached) = key.as_ref().and_then(|k| db.idempotency.get(k)) {
            if cached.payload != payload {
                return reply(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    out,
                    json!({
                        "error": "Idempotency key already used with a different payload",
                        "requestId": request_id
                    }),
                );
            }
            debug!(?resource, "replaying idempotent response");
            out.insert(REPLAY_HEADER, HeaderValue::from_static("true"));
            return reply(cached.status, out, cached.body.clone());
        }

        let result = match resource {
            Resource::Events => db.create_event(&payload),
            Resource::Identify => db.identify(&payload),
        };
        let (status, body) = match result {
            Ok((status, data)) => (status, json!({"success": true, "data": data, "requestId": request_id})),
            Err(details) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Validation error", "details": details, "requestId": request_id}),
            ),
        };

        if let Some(key) = key.filter(|_| status.is_success()) {
            db.idempotency.insert(
                key,
                Cached {
                    payload,
                    status,
                    body: body.clone(),
                },
            );
        }
        reply(status, out, body)
    }
}

impl RateWindow {
    /// Count one request against the current window and return whether it is
    /// allowed, plus the rate-limit headers to send.
    fn take(&mut self, config: &MockConfig) -> (bool, HeaderMap) {
        let now = Utc::now().timestamp();
        let window = i64::try_from(config.window.as_secs()).unwrap_or(i64::MAX);
        if now >= self.started_at.saturating_add(window) {
            self.started_at = now;
            self.used = 0;
        }
        let allowed = self.used < config.rate_limit;
        if allowed {
            self.used += 1;
        }

        let mut headers = HeaderMap::new();
        headers.insert(LIMIT_HEADER, HeaderValue::from(config.rate_limit));
        headers.insert(REMAINING_HEADER, HeaderValue::from(config.rate_limit.saturating_sub(self.used)));
        headers.insert(RESET_HEADER, HeaderValue::from(self.started_at.saturating_add(window)));
        (allowed, headers)
    }
}

impl Db {
    fn create_event(&mut self, payload: &Value) -> Result<(StatusCode, Value), Details> {
        let mut details = Vec::new();
        required_string(payload, "channelName", &mut details);
        required_string(payload, "title", &mut details);
        if !details.is_empty() {
            return Err(details);
        }

        let id = format!("evt_{}", Uuid::new_v4().simple());
        let mut event = payload.as_object().cloned().unwrap_or_default();
        event.insert("id".into(), json!(id));
        event.insert("createdAt".into(), json!(timestamp()));
        let event = Value::Object(event);
        self.events.insert(id, event.clone());
        Ok((StatusCode::CREATED, event))
    }

    fn identify(&mut self, payload: &Value) -> Result<(StatusCode, Value), Details> {
        let mut details = Vec::new();
        required_string(payload, "user_id", &mut details);
        let properties = match payload.get("properties") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                details.push(detail(&["properties"], "Expected object"));
                Map::new()
            }
        };
        let mut aliases = Vec::new();
        match payload.get("aliases") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(alias) => aliases.push(alias.to_string()),
                        None => details.push(json!({"path": ["aliases", index], "message": "Expected string"})),
                    }
                }
            }
            Some(_) => details.push(detail(&["aliases"], "Expected array")),
        }
        if !details.is_empty() {
            return Err(details);
        }

        let user_id = payload["user_id"].as_str().unwrap_or_default().to_string();
        let record = self
            .identities
            .entry(user_id.clone())
            .or_insert_with(|| IdentityRecord {
                id: format!("user_identity_{}", Uuid::new_v4().simple()),
                properties: Map::new(),
            });
        record.properties.extend(properties);
        let (id, properties) = (record.id.clone(), record.properties.clone());

        let mut created = Vec::new();
        let mut failed = Vec::new();
        for alias in aliases {
            let owner = self.alias_owners.entry(alias.clone()).or_insert_with(|| user_id.clone());
            if *owner == user_id {
                created.push(alias);
            } else {
                failed.push(json!({"alias": alias, "reason": "Alias already exists"}));
            }
        }

        Ok((
            StatusCode::OK,
            json!({
                "id": id,
                "userId": user_id,
                "properties": properties,
                "aliases": {"created": created, "failed": failed},
                "updatedAt": timestamp(),
            }),
        ))
    }
}

fn required_string(payload: &Value, field: &str, details: &mut Details) {
    match payload.get(field) {
        None | Some(Value::Null) => details.push(detail(&[field], "Required")),
        Some(Value::String(s)) if s.is_empty() => {
            details.push(detail(&[field], "String must contain at least 1 character(s)"))
        }
        Some(Value::String(_)) => {}
        Some(_) => details.push(detail(&[field], "Expected string")),
    }
}

fn detail(path: &[&str], message: &str) -> Value {
    json!({"path": path, "message": message})
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn reply(status: StatusCode, headers: HeaderMap, body: Value) -> Response {
    (status, headers, Json(body)).into_response()
}

async fn create_event(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    state.handle(Resource::Events, &headers, &body).await
}

async fn identify(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    state.handle(Resource::Identify, &headers, &body).await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", post(create_event))
        .route("/v1/identify", post(identify))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn app() -> Router {
    router(AppState::new(MockConfig::default()))
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}
