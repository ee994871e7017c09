//! `jbchat-server` serves a [`DialogueEngine`](jbchat_agent::DialogueEngine)
//! over HTTP: plain-text answers on `/api/message` and server-sent events on
//! `/api/message/stream`.

pub mod protocol;
pub mod server;

pub use protocol::{DEFAULT_THREAD_ID, HealthResponse, MessageRequest};
pub use server::{AppState, ServerConfig, app_router, run_server, spawn_session_reaper};
