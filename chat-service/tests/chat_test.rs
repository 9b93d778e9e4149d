mod common;

use chat_service::models::AgentLabel;
use chat_service::services::providers::mock::MockTextProvider;
use chrono::Utc;
use common::TestApp;
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn billing_query_captures_customer_number() {
    let app = TestApp::spawn().await;

    let reply = app.chat("My bill at 12345 is wrong", None).await;

    assert_eq!(reply.agent_used, AgentLabel::CurrentCustomer);
    assert_eq!(reply.reasoning, "Billing/account query");
    assert!(reply.response.contains("450.50"));
    let context = reply.context.expect("context present");
    assert_eq!(context.customer_number.as_deref(), Some("12345"));
    assert_eq!(context.current_agent, Some(AgentLabel::CurrentCustomer));
}

#[tokio::test]
async fn switching_query_captures_address_verbatim() {
    let app = TestApp::spawn().await;
    let query = "I want to switch, I live on 42 King Street";

    let reply = app.chat(query, None).await;

    assert_eq!(reply.agent_used, AgentLabel::NewCustomer);
    assert_eq!(reply.reasoning, "New customer inquiry");
    assert!(reply.response.contains(query));
    assert!(reply.response.contains("available"));
    assert_eq!(reply.context.unwrap().address.as_deref(), Some(query));
}

#[tokio::test]
async fn session_is_reused_across_turns() {
    let app = TestApp::spawn().await;

    let first = app.chat("What's my usage?", None).await;
    assert_eq!(first.agent_used, AgentLabel::CurrentCustomer);
    assert!(first.response.contains("customer number"));

    let second = app.chat("It's 55501", Some(&first.session_id)).await;

    assert_eq!(second.session_id, first.session_id);
    assert_eq!(
        second.response,
        "Hi! I can see your account #55501. Your current bill is $450.50. How can I help you today?"
    );

    let entry = app.state.sessions.get(&first.session_id).unwrap();
    assert_eq!(entry.lock().await.messages.len(), 4);
}

#[tokio::test]
async fn established_context_keeps_the_same_handler() {
    let app = TestApp::spawn().await;

    let first = app.chat("Account 12345 please", None).await;
    let second = app
        .chat("I'm moving to 42 King Street", Some(&first.session_id))
        .await;

    assert_eq!(second.agent_used, AgentLabel::CurrentCustomer);
    assert_eq!(second.reasoning, "Continuing with established context");
}

#[tokio::test]
async fn unknown_session_id_gets_a_fresh_session() {
    let app = TestApp::spawn().await;

    let reply = app.chat("hello", Some("not-a-real-session")).await;

    assert_ne!(reply.session_id, "not-a-real-session");
    assert!(app.state.sessions.get(&reply.session_id).is_some());
}

#[tokio::test]
async fn expired_session_is_replaced() {
    let app = TestApp::spawn().await;
    let first = app.chat("My bill at 12345 is wrong", None).await;

    {
        let entry = app.state.sessions.get(&first.session_id).unwrap();
        entry.lock().await.last_updated = Utc::now() - chrono::Duration::hours(3);
    }

    let second = app.chat("hello again", Some(&first.session_id)).await;

    assert_ne!(second.session_id, first.session_id);
    assert!(second.context.unwrap().customer_number.is_none());
    assert!(app.state.sessions.get(&first.session_id).is_none());
}

#[tokio::test]
async fn malformed_json_gets_fallback_body() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/chat", app.address))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["response"],
        "Hello! I'm your Energy Assistant. How can I help you today?"
    );
    assert_eq!(body["agent_used"], "FALLBACK");
    assert_eq!(body["reasoning"], "System fallback");
    assert!(body["session_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn empty_query_gets_fallback_body() {
    let app = TestApp::spawn().await;

    let response = app.post_chat(&json!({ "query": "  " })).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["agent_used"], "FALLBACK");
}

#[tokio::test]
async fn every_handler_answers_without_credential() {
    let app = TestApp::spawn().await;

    for query in [
        "hi",
        "what is my bill",
        "12345",
        "I live on 1 George St Sydney",
        "payment",
    ] {
        let reply = app.chat(query, None).await;
        assert!(!reply.response.trim().is_empty(), "empty reply for {:?}", query);
    }
}

#[tokio::test]
async fn model_classification_and_reply_are_used() {
    let provider = Arc::new(MockTextProvider::scripted([
        "NEW_CUSTOMER",
        "Welcome! We cover Sydney.",
    ]));
    let app = TestApp::spawn_with_provider(provider.clone()).await;

    let reply = app.chat("Hi, 3 Pitt St Sydney here, my bill is huge", None).await;

    assert_eq!(reply.agent_used, AgentLabel::NewCustomer);
    assert_eq!(reply.response, "Welcome! We cover Sydney.");
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn failing_model_degrades_to_templates() {
    let app = TestApp::spawn_with_provider(Arc::new(MockTextProvider::failing())).await;

    let reply = app.chat("My bill at 12345 is wrong", None).await;

    assert_eq!(reply.agent_used, AgentLabel::CurrentCustomer);
    assert!(reply.response.contains("Your current bill is $450.50"));
}
