use std::{convert::Infallible, net::SocketAddr, time::Duration};

use anyhow::Context;
use async_stream::stream;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use jbchat_agent::{DialogueEngine, Fragment, SessionRegistry};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info};

use crate::protocol::{ErrorPayload, HealthResponse, MessageRequest};

/// Default idle time after which a session is dropped.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
pub struct AppState {
    pub engine: DialogueEngine,
    /// Chat model name reported by `/health`.
    pub model: String,
}

impl AppState {
    pub fn new(engine: DialogueEngine, model: impl Into<String>) -> Self {
        Self { engine, model: model.into() }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub session_ttl: Duration,
    /// How often idle sessions are looked for.
    pub eviction_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            session_ttl: DEFAULT_SESSION_TTL,
            eviction_interval: Duration::from_secs(60),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/message", post(message))
        .route("/api/message/stream", post(message_stream))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let reaper = spawn_session_reaper(
        state.engine.sessions().clone(),
        config.session_ttl,
        config.eviction_interval,
    );

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!(addr = %config.addr, model = %state.model, "jbchat server listening");

    let served = axum::serve(listener, app_router(state)).await;
    reaper.abort();
    served?;
    Ok(())
}

/// Evict sessions idle for `ttl`, checking every `interval`.
pub fn spawn_session_reaper(
    sessions: SessionRegistry,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sessions.evict_idle(ttl).await;
        }
    })
}

async fn index() -> &'static str {
    "Chatbot is running!"
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = state.engine.config();
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "jbchat".to_string(),
        model: state.model.clone(),
        config: config.config_name.clone(),
        host: config.host.clone(),
        sessions: state.engine.sessions().len().await,
    })
}

async fn message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<String, (StatusCode, String)> {
    let thread_id = request.thread_id();
    debug!(thread_id, "message received");
    match state.engine.ask(thread_id, &request.message.text).await {
        Ok(answer) => Ok(answer.trim_end_matches('\n').to_string()),
        Err(e) => {
            error!(thread_id, error = %e, "message failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn message_stream(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let thread_id = request.thread_id().to_string();
    debug!(thread_id = %thread_id, "stream requested");
    let mut fragments = state.engine.stream(thread_id.as_str(), request.message.text);

    let events = stream! {
        while let Some(item) = fragments.next().await {
            match item {
                Ok(Fragment::Text(text)) => yield Ok(Event::default().event("text").data(text)),
                Ok(Fragment::ToolCalls(calls)) => yield Ok(json_event("tool_calls", &calls)),
                Err(e) => {
                    error!(thread_id = %thread_id, error = %e, "stream failed");
                    yield Ok(json_event("error", &ErrorPayload { message: e.to_string() }));
                    break;
                }
            }
        }
        yield Ok(Event::default().event("end").data(""));
    };

    let keep_alive = KeepAlive::new().interval(Duration::from_secs(15)).text("keepalive");
    Sse::new(events).keep_alive(keep_alive)
}

fn json_event<T: Serialize>(name: &str, value: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(value)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}
