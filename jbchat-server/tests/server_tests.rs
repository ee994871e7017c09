use std::sync::Arc;
use std::time::Duration;

use jbchat_agent::{DialogueConfig, DialogueEngine, SessionRegistry};
use jbchat_model::{MockChatModel, MockReply};
use jbchat_rag::{DocumentChunk, HashingEmbedder, IndexService, SourceKind};
use jbchat_server::{AppState, HealthResponse, MessageRequest, app_router, spawn_session_reaper};

fn track_chunk(seq_num: usize, track_id: &str) -> DocumentChunk {
    let text = format!(r#"{{"trackId":"{track_id}","assemblyNames":["hg38"]}}"#);
    DocumentChunk::new(format!("records:config.json#{seq_num}"), text, SourceKind::TrackRecord)
        .with_metadata("track_id", track_id)
}

async fn engine(replies: Vec<MockReply>) -> DialogueEngine {
    let chunks = vec![track_chunk(1, "t1"), track_chunk(2, "t2")];
    let index = IndexService::builder()
        .embedding_provider(Arc::new(HashingEmbedder::default()))
        .build()
        .unwrap()
        .build_index(chunks)
        .await
        .unwrap();
    let config = DialogueConfig::builder()
        .host("http://jbrowse.test")
        .config_name("hg38.json")
        .build()
        .unwrap();
    DialogueEngine::builder()
        .model(Arc::new(MockChatModel::new(replies).with_name("mock-model")))
        .index(index)
        .config(config)
        .build()
        .unwrap()
}

async fn spawn_server(engine: DialogueEngine) -> (String, tokio::task::JoinHandle<()>) {
    let app = app_router(AppState::new(engine, "mock-model"));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn test_root_and_health() {
    let (base, handle) = spawn_server(engine(vec![]).await).await;
    let client = reqwest::Client::new();

    let root = client.get(format!("{base}/")).send().await.unwrap();
    assert!(root.status().is_success());
    assert_eq!(root.text().await.unwrap(), "Chatbot is running!");

    let health: HealthResponse =
        client.get(format!("{base}/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.model, "mock-model");
    assert_eq!(health.config, "hg38.json");
    assert_eq!(health.host, "http://jbrowse.test");
    assert_eq!(health.sessions, 0);

    handle.abort();
}

#[tokio::test]
async fn test_message_strips_trailing_newlines() {
    let engine = engine(vec![MockReply::text("hg38 has t1 and t2.\n\n")]).await;
    let (base, handle) = spawn_server(engine.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/message"))
        .json(&MessageRequest::new("what tracks are available for hg38?").with_thread_id("web-1"))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let content_type =
        response.headers()[reqwest::header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"), "unexpected content type: {content_type}");
    assert_eq!(response.text().await.unwrap(), "hg38 has t1 and t2.");
    assert_eq!(engine.history("web-1").await.len(), 2);

    handle.abort();
}

#[tokio::test]
async fn test_message_without_thread_uses_default() {
    let engine = engine(vec![MockReply::text("hello")]).await;
    let (base, handle) = spawn_server(engine.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/message"))
        .json(&serde_json::json!({"message": {"text": "hi"}}))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(engine.history(jbchat_server::DEFAULT_THREAD_ID).await.len(), 2);

    handle.abort();
}

#[tokio::test]
async fn test_failure_returns_500_and_server_keeps_serving() {
    let engine = engine(vec![MockReply::fail("down"), MockReply::fail("down")]).await;
    let (base, handle) = spawn_server(engine).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/message"))
        .json(&MessageRequest::new("hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().await.unwrap().starts_with("Synthesis error"));

    let root = client.get(format!("{base}/")).send().await.unwrap();
    assert!(root.status().is_success());

    handle.abort();
}

#[tokio::test]
async fn test_stream_endpoint_emits_text_then_end() {
    let engine = engine(vec![MockReply::text_chunks(&["t1", " and t2"])]).await;
    let (base, handle) = spawn_server(engine).await;

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        reqwest::Client::new()
            .post(format!("{base}/api/message/stream"))
            .json(&MessageRequest::new("tracks?"))
            .send(),
    )
    .await
    .expect("stream request timeout")
    .expect("stream response");

    assert!(response.status().is_success());
    let content_type =
        response.headers()[reqwest::header::CONTENT_TYPE].to_str().unwrap().to_lowercase();
    assert!(content_type.contains("text/event-stream"), "unexpected content type: {content_type}");

    let body = response.text().await.unwrap();
    let text = body.find("event: text\ndata: t1 and t2").expect("text event");
    let end = body.find("event: end").expect("end event");
    assert!(text < end);

    handle.abort();
}

#[tokio::test]
async fn test_stream_endpoint_reports_errors() {
    let (base, handle) = spawn_server(engine(vec![]).await).await;

    let body = reqwest::Client::new()
        .post(format!("{base}/api/message/stream"))
        .json(&MessageRequest::new("tracks?"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("event: error"));
    assert!(body.contains("Synthesis error"));
    assert!(body.contains("event: end"));

    handle.abort();
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let (base, handle) = spawn_server(engine(vec![]).await).await;

    let response = reqwest::Client::new()
        .get(format!("{base}/"))
        .header(reqwest::header::ORIGIN, "https://example.org")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()[reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_reaper_evicts_idle_sessions() {
    let sessions = SessionRegistry::new();
    sessions.acquire("idle").await;

    let reaper = spawn_session_reaper(sessions.clone(), Duration::ZERO, Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert!(sessions.is_empty().await);
    reaper.abort();
}
