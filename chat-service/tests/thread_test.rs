mod common;

use chat_service::services::providers::mock::MockTextProvider;
use common::{file_part, TestApp};
use reqwest::multipart::Form;
use serde_json::Value;
use std::sync::Arc;

#[tokio::test]
async fn first_turn_defaults_to_bill_explorer_without_model() {
    let app = TestApp::spawn().await;

    let response = app
        .post_thread_form("t-1", "chat", Form::new().text("message", "Why is my bill so high?"))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["messages"][0], "User: Why is my bill so high?");
    assert_eq!(body["messages"][1], "Supervisor: Defaulting to Bill Explorer");
    assert_eq!(body["resolution_status"], "bill_explained");
    assert_eq!(body["bill_data"]["current_charges"], 245.67);
    assert_eq!(body["bill_data"]["plan_type"], "Standard Residential");
    assert_eq!(body["files_processed"], 0);
    assert_eq!(body["required_user_input"], false);
    assert!(body["input_needed"].is_null());
    assert!(body["energy_plan"].is_null());
}

#[tokio::test]
async fn supervisor_uses_model_choice() {
    let app = TestApp::spawn_with_provider(Arc::new(MockTextProvider::replying(
        "route_to_switch_agent",
    )))
    .await;

    let body: Value = app
        .post_thread_form("t-2", "chat", Form::new().text("message", "Cheaper plans?"))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(
        body["messages"][1],
        "Supervisor: Routing to Switch Agent based on request analysis"
    );
    assert_eq!(
        body["energy_plan"],
        "Recommended: Green Energy Plan - 15% savings vs current plan"
    );
    assert_eq!(body["resolution_status"], "plans_compared");
}

#[tokio::test]
async fn start_at_brand_new_agent_requests_address() {
    let app = TestApp::spawn().await;
    let form = Form::new()
        .text("message", "I need a new connection")
        .text("start_at", "brand_new_agent");

    let body: Value = app.post_thread_form("t-3", "chat", form).await.json().await.unwrap();

    assert_eq!(body["required_user_input"], true);
    assert_eq!(body["input_needed"], "brand_new_agent");
    assert_eq!(body["resolution_status"], "awaiting_input");
    assert_eq!(
        body["messages"][1],
        "Brand New Agent: I need your service address to proceed with the new connection."
    );
}

#[tokio::test]
async fn unknown_start_at_is_rejected() {
    let app = TestApp::spawn().await;
    let form = Form::new()
        .text("message", "hello")
        .text("start_at", "billing_wizard");

    let response = app.post_thread_form("t-4", "chat", form).await;

    assert_eq!(response.status().as_u16(), 400);
    assert!(app.state.threads.get("t-4").is_none());
}

#[tokio::test]
async fn missing_message_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post_thread_form("t-5", "chat", Form::new().text("customer_id", "C-1"))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "message is required");
}

#[tokio::test]
async fn bill_explorer_reports_uploaded_files() {
    let app = TestApp::spawn().await;
    let form = Form::new()
        .text("message", "Explain my bill")
        .text("start_at", "bill_explorer")
        .part("files", file_part("bill.pdf", "application/pdf", 2048))
        .part("files", file_part("usage.csv", "text/csv", 128));

    let body: Value = app.post_thread_form("t-6", "chat", form).await.json().await.unwrap();

    assert_eq!(body["files_processed"], 2);
    assert_eq!(body["bill_data"]["parsed_from_file"], true);
    assert_eq!(body["bill_data"]["files_processed"], 2);
}

#[tokio::test]
async fn transcript_accumulates_and_can_be_read_back() {
    let app = TestApp::spawn().await;
    for message in ["first", "second"] {
        app.post_thread_form("t-7", "chat", Form::new().text("message", message))
            .await;
    }

    let body = app.get_json("/threads/t-7/messages").await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[0], "User: first");
    assert!(messages.iter().any(|m| m == "User: second"));

    let state = app.get_json("/threads/t-7/state").await;
    assert_eq!(state["values"]["thread_id"], "t-7");
    assert_eq!(state["values"]["customer_type"], "existing");
    assert_eq!(state["values"]["next_agent"], "bill_explorer");
}

#[tokio::test]
async fn unknown_thread_reads_as_empty() {
    let app = TestApp::spawn().await;

    let messages = app.get_json("/threads/nope/messages").await;
    assert_eq!(messages["messages"].as_array().map(Vec::len), Some(0));

    let state = app.get_json("/threads/nope/state").await;
    assert_eq!(state["values"], serde_json::json!({}));
}

#[tokio::test]
async fn delete_clears_thread() {
    let app = TestApp::spawn().await;
    app.post_thread_form("t-8", "chat", Form::new().text("message", "hello"))
        .await;

    let body: Value = app
        .client
        .delete(format!("{}/threads/t-8", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Thread t-8 cleared");
    let messages = app.get_json("/threads/t-8/messages").await;
    assert_eq!(messages["messages"].as_array().map(Vec::len), Some(0));
}
