use std::time::Duration;

use futures::StreamExt;
use jbchat_agent::{AgentError, Fragment, Turn};
use jbchat_model::{ChatChunk, MockReply, ToolInvocation};
use serde_json::json;

mod common;

async fn collect(stream: jbchat_agent::FragmentStream) -> Vec<Result<Fragment, AgentError>> {
    stream.collect().await
}

#[tokio::test]
async fn test_incremental_fragments_arrive_in_receipt_order() {
    let (_, engine) =
        common::scripted_incremental(vec![MockReply::text_chunks(&["t1", " and", " t2"])]).await;

    let fragments: Vec<Fragment> =
        collect(engine.stream("u1", "which tracks?"))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

    assert_eq!(
        fragments,
        [Fragment::Text("t1".into()), Fragment::Text(" and".into()), Fragment::Text(" t2".into())]
    );
    assert_eq!(engine.history("u1").await, [Turn::human("which tracks?"), Turn::ai("t1 and t2")]);
}

#[tokio::test]
async fn test_boundaries_flush_text_before_tool_calls() {
    let (_, engine) = common::scripted(vec![
        MockReply::Chunks(vec![
            ChatChunk::Text("Let me ".into()),
            ChatChunk::Text("build a link.".into()),
            ChatChunk::ToolCall {
                index: 0,
                id: Some("c1".into()),
                name: Some("session_link".into()),
                arguments: json!({"assembly": "hg38", "tracks": ["t1"]}).to_string(),
            },
        ]),
        MockReply::text_chunks(&["Here", " it is."]),
    ])
    .await;

    let fragments: Vec<Fragment> =
        collect(engine.stream("u1", "show t1")).await.into_iter().map(Result::unwrap).collect();

    let call = ToolInvocation {
        id: "c1".into(),
        name: "session_link".into(),
        arguments: json!({"assembly": "hg38", "tracks": ["t1"]}),
    };
    assert_eq!(
        fragments,
        [
            Fragment::Text("Let me build a link.".into()),
            Fragment::ToolCalls(vec![call]),
            Fragment::Text("Here it is.".into()),
        ]
    );
    assert_eq!(engine.history("u1").await[1].content, "Here it is.");
}

#[tokio::test]
async fn test_dropping_the_stream_mid_turn_commits_nothing() {
    let (_, engine) = common::gated_incremental(vec![
        MockReply::text_chunks(&["partial", " answer"]),
        MockReply::text("fresh answer"),
    ])
    .await;

    let mut stream = engine.stream("u1", "which tracks?");
    assert_eq!(stream.next().await.unwrap().unwrap(), Fragment::Text("partial".into()));
    drop(stream);

    assert!(engine.history("u1").await.is_empty());
    // the session lock was released with the stream
    assert_eq!(engine.ask("u1", "which tracks?").await.unwrap(), "fresh answer");
    assert_eq!(engine.history("u1").await.len(), 2);
}

#[tokio::test]
async fn test_delivered_answer_is_already_committed() {
    let (_, engine) = common::scripted(vec![MockReply::text_chunks(&["t1", " and t2"])]).await;

    let mut stream = engine.stream("u1", "which tracks?");
    assert_eq!(stream.next().await.unwrap().unwrap(), Fragment::Text("t1 and t2".into()));
    drop(stream);

    assert_eq!(engine.history("u1").await, [Turn::human("which tracks?"), Turn::ai("t1 and t2")]);
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let (model, engine) = common::scripted(vec![MockReply::text("unused")]).await;
    let stream = engine.stream("u1", "hello");
    drop(stream);
    assert_eq!(model.remaining(), 1);
    assert!(!engine.sessions().contains("u1").await);
}

#[tokio::test]
async fn test_failed_turn_ends_with_error() {
    let (_, engine) = common::scripted(vec![MockReply::fail("503"), MockReply::fail("503")]).await;

    let items = collect(engine.stream("u1", "hello")).await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(AgentError::Synthesis(_))));
    assert!(engine.history("u1").await.is_empty());
}

#[tokio::test]
async fn test_stream_into_closed_receiver_aborts() {
    let (_, engine) = common::scripted(vec![MockReply::text("never delivered")]).await;
    let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
    drop(receiver);

    let err = engine.stream_into("u1", "hello", sender).await.unwrap_err();

    assert!(matches!(err, AgentError::StreamAborted));
    assert!(engine.history("u1").await.is_empty());
}

#[tokio::test]
async fn test_stream_into_delivers_and_commits() {
    let (_, engine) = common::scripted_incremental(vec![MockReply::text_chunks(&["a", "b"])]).await;
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();

    let outcome = engine.stream_into("u1", "hello", sender).await.unwrap();

    assert_eq!(outcome.answer, "ab");
    assert_eq!(receiver.recv().await, Some(Fragment::Text("a".into())));
    assert_eq!(receiver.recv().await, Some(Fragment::Text("b".into())));
    assert_eq!(receiver.recv().await, None);
}

#[tokio::test]
async fn test_turns_on_one_thread_are_serialized() {
    let (model, engine) = common::gated_incremental(vec![
        MockReply::text_chunks(&["first", " answer"]),
        MockReply::text("second question, standalone"),
        MockReply::text("second answer"),
    ])
    .await;

    let mut first = engine.stream("u1", "first question");
    assert_eq!(first.next().await.unwrap().unwrap(), Fragment::Text("first".into()));

    let other = engine.clone();
    let mut second = tokio::spawn(async move { other.run_turn("u1", "second question").await });
    assert!(tokio::time::timeout(Duration::from_millis(50), &mut second).await.is_err());

    model.release();
    while let Some(item) = first.next().await {
        item.unwrap();
    }
    let outcome = second.await.unwrap().unwrap();

    assert_eq!(outcome.answer, "second answer");
    let history = engine.history("u1").await;
    assert_eq!(
        history,
        [
            Turn::human("first question"),
            Turn::ai("first answer"),
            Turn::human("second question"),
            Turn::ai("second answer"),
        ]
    );
}
