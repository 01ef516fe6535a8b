// ABOUTME: Integration tests for the conversational coaching agent and its tool loop
// ABOUTME: Drives the runtime with scripted model turns to check tools, history, streaming and limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{
    create_test_database, create_test_user, FailingLlmProvider, ScriptedLlmProvider, ScriptedTurn,
    TEST_MODEL,
};
use serde_json::json;
use strideiq_server::agent::runtime::{PROVIDER_UNAVAILABLE_REPLY, TOOL_LIMIT_REPLY};
use strideiq_server::agent::{AgentEvent, AgentRuntime, InMemoryConversationStore};
use strideiq_server::database::Database;
use strideiq_server::errors::ErrorCode;
use strideiq_server::llm::MessageRole;
use strideiq_server::models::WorkoutType;
use tokio_stream::StreamExt;

fn scripted(turns: Vec<ScriptedTurn>) -> Arc<ScriptedLlmProvider> {
    Arc::new(ScriptedLlmProvider::new(String::new(), turns))
}

fn runtime(database: &Database, llm: Arc<ScriptedLlmProvider>) -> AgentRuntime {
    AgentRuntime::new(database.clone(), llm, TEST_MODEL)
}

#[tokio::test]
async fn test_tool_results_are_fed_back_to_the_model() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let llm = scripted(vec![
        ScriptedTurn::Calls(vec![("get_user_profile".to_owned(), json!({}))]),
        ScriptedTurn::Text("Maya, you're 10 lbs from your goal.".to_owned()),
    ]);
    let agent = runtime(&database, llm.clone());

    let turn = agent
        .chat(&user_id, "How far am I from my goal weight?", None)
        .await
        .unwrap();

    assert_eq!(turn.message, "Maya, you're 10 lbs from your goal.");
    assert!(!turn.session_id.is_empty());

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    let first = &requests[0].messages;
    assert_eq!(first[0].role, MessageRole::System);
    assert!(first
        .last()
        .unwrap()
        .content
        .starts_with("[Today's date: "));

    let tool_result = requests[1].messages.last().unwrap();
    assert!(tool_result
        .content
        .starts_with("[Tool Result for get_user_profile]: "));
    assert!(tool_result.content.contains("\"current_weight_lbs\":160.0"));
    assert!(tool_result.content.contains("\"target_weight_lbs\":150.0"));
}

#[tokio::test]
async fn test_history_carries_into_the_next_turn() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let llm = scripted(vec![
        ScriptedTurn::Text("Hi Maya!".to_owned()),
        ScriptedTurn::Text("You asked about your week.".to_owned()),
    ]);
    let agent = runtime(&database, llm.clone());

    let first = agent.chat(&user_id, "Hello coach", None).await.unwrap();
    let second = agent
        .chat(&user_id, "What did I just say?", Some(&first.session_id))
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);

    let messages = &llm.requests()[1].messages;
    // system, stored user, stored reply, new user
    assert_eq!(messages.len(), 4);
    assert!(messages[1].content.ends_with("Hello coach"));
    assert_eq!(messages[2].role, MessageRole::Assistant);
    assert_eq!(messages[2].content, "Hi Maya!");

    let history = agent.store().history(&first.session_id).await.unwrap();
    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn test_foreign_session_is_not_found() {
    let database = create_test_database().await;
    let owner = create_test_user(&database).await;
    let stranger = create_test_user(&database).await;
    let agent = runtime(&database, scripted(Vec::new()));

    let turn = agent.chat(&owner, "Hello", None).await.unwrap();
    let err = agent
        .chat(&stranger, "Let me in", Some(&turn.session_id))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);

    let empty = agent.chat(&owner, "   ", None).await.unwrap_err();
    assert_eq!(empty.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_provider_failure_returns_apology() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let agent = AgentRuntime::new(database.clone(), Arc::new(FailingLlmProvider), TEST_MODEL);

    let turn = agent.chat(&user_id, "Plan my day", None).await.unwrap();
    assert_eq!(turn.message, PROVIDER_UNAVAILABLE_REPLY);
}

#[tokio::test]
async fn test_tool_budget_exhaustion_returns_limit_reply() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let turns = (0..10)
        .map(|_| ScriptedTurn::Calls(vec![("get_active_injuries".to_owned(), json!({}))]))
        .collect();
    let llm = scripted(turns);
    let agent = runtime(&database, llm.clone());

    let turn = agent.chat(&user_id, "Any injuries?", None).await.unwrap();
    assert_eq!(turn.message, TOOL_LIMIT_REPLY);
    assert_eq!(llm.requests().len(), 10);
}

#[tokio::test]
async fn test_second_plan_for_today_is_reported_to_the_model() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let plan_args = json!({
        "todays_training": "30-minute easy run in Zone 2",
        "workout_type": "run",
        "duration_minutes": 30,
        "intensity_zone": "zone_2",
        "heart_rate_range": "130-145",
    });
    let llm = scripted(vec![
        ScriptedTurn::Calls(vec![
            ("create_coaching_plan".to_owned(), plan_args.clone()),
            ("create_coaching_plan".to_owned(), plan_args),
        ]),
        ScriptedTurn::Text("Saved your run.".to_owned()),
    ]);
    let agent = runtime(&database, llm.clone());

    agent.chat(&user_id, "Yes, save that plan", None).await.unwrap();

    let plan = database
        .recommendations()
        .get_today(&user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(plan.workout_type, Some(WorkoutType::Run));
    assert_eq!(plan.duration_minutes, Some(30));

    let messages = &llm.requests()[1].messages;
    let results: Vec<&str> = messages
        .iter()
        .filter(|m| m.content.starts_with("[Tool Result for create_coaching_plan]"))
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].contains("\"success\":true"));
    assert!(results[1].contains("\"error\""));
    assert!(results[1].contains("already exists"));
}

#[tokio::test]
async fn test_stream_emits_tool_events_then_tokens_then_done() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let llm = scripted(vec![
        ScriptedTurn::Calls(vec![("get_user_profile".to_owned(), json!({}))]),
        ScriptedTurn::Text("Keep it easy today.".to_owned()),
    ]);
    let agent = runtime(&database, llm);

    let turn = agent.prepare(&user_id, "What should I do?", None).await.unwrap();
    let session_id = turn.session_id().to_owned();
    let events: Vec<AgentEvent> = agent.stream_prepared(&user_id, turn).collect().await;

    assert_eq!(
        events[0],
        AgentEvent::ToolStart {
            tool: "get_user_profile".to_owned()
        }
    );
    let AgentEvent::ToolEnd { tool, output } = &events[1] else {
        panic!("expected tool_end, got {:?}", events[1]);
    };
    assert_eq!(tool, "get_user_profile");
    assert!(output.chars().count() <= 200);

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Token { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Keep it easy today.");
    assert_eq!(events.last(), Some(&AgentEvent::Done { session_id: session_id.clone() }));

    let history = agent.store().history(&session_id).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_stream_reports_provider_failure_as_error_event() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let agent = runtime(&database, scripted(vec![ScriptedTurn::Fail]));

    let turn = agent.prepare(&user_id, "Hello", None).await.unwrap();
    let session_id = turn.session_id().to_owned();
    let events: Vec<AgentEvent> = agent.stream_prepared(&user_id, turn).collect().await;

    assert_eq!(
        events,
        [AgentEvent::Error {
            message: PROVIDER_UNAVAILABLE_REPLY.to_owned()
        }]
    );
    assert!(agent.store().history(&session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_registry_and_bounded_store() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let llm = scripted(vec![
        ScriptedTurn::Text("First.".to_owned()),
        ScriptedTurn::Text("Second.".to_owned()),
    ]);
    let agent = runtime(&database, llm)
        .with_store(Arc::new(InMemoryConversationStore::with_capacity(2)));

    let names = agent.tools().tool_names();
    assert_eq!(names.len(), 11);
    assert!(names.contains(&"create_coaching_plan"));
    assert!(names.windows(2).all(|pair| pair[0] < pair[1]));

    let first = agent.chat(&user_id, "One", None).await.unwrap();
    agent
        .chat(&user_id, "Two", Some(&first.session_id))
        .await
        .unwrap();

    let history = agent.store().history(&first.session_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].content.ends_with("Two"));
    assert_eq!(history[1].content, "Second.");
}

#[tokio::test]
async fn test_stream_forwards_model_deltas_as_tokens() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let llm = scripted(vec![
        ScriptedTurn::Calls(vec![("get_vo2_trends".to_owned(), json!({}))]),
        ScriptedTurn::Text("Your VO2 is climbing steadily.".to_owned()),
    ]);
    let agent = runtime(&database, llm.clone());

    let turn = agent.prepare(&user_id, "How is my fitness?", None).await.unwrap();
    let events: Vec<AgentEvent> = agent.stream_prepared(&user_id, turn).collect().await;

    let tokens: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Token { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        tokens,
        ["Your ", "VO2 ", "is ", "climbing ", "steadily."]
    );

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.stream));
}

#[tokio::test]
async fn test_session_locks_are_released_after_turns() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let agent = runtime(&database, scripted(Vec::new()));

    for n in 0..5 {
        agent
            .chat(&user_id, &format!("Message {n}"), None)
            .await
            .unwrap();
    }
    assert_eq!(agent.active_sessions(), 0);

    let turn = agent.prepare(&user_id, "Stream this", None).await.unwrap();
    let _: Vec<AgentEvent> = agent.stream_prepared(&user_id, turn).collect().await;
    assert_eq!(agent.active_sessions(), 0);
}
