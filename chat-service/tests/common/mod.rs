#![allow(dead_code)]

use chat_service::config::ChatConfig;
use chat_service::dtos::ChatResponse;
use chat_service::services::providers::TextProvider;
use chat_service::services::ModelClient;
use chat_service::startup::{AppState, Application};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub state: AppState,
    pub client: reqwest::Client,
}

/// Development defaults on a random port.
pub fn test_config() -> ChatConfig {
    let mut config = ChatConfig::default();
    config.common.port = 0; // Random port for testing
    config
}

/// Model client backed by `provider` with a short timeout.
pub fn mock_model(provider: Arc<dyn TextProvider>) -> ModelClient {
    ModelClient::new(provider, Duration::from_secs(2))
}

impl TestApp {
    /// Spawn in fallback mode (no model credential).
    pub async fn spawn() -> Self {
        Self::spawn_with_model(ModelClient::disabled()).await
    }

    pub async fn spawn_with_provider(provider: Arc<dyn TextProvider>) -> Self {
        Self::spawn_with_model(mock_model(provider)).await
    }

    pub async fn spawn_with_model(model: ModelClient) -> Self {
        let app = Application::build_with_model(test_config(), model)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let state = app.state().clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            state,
            client,
        }
    }

    pub async fn post_chat(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/chat", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Send one `/chat` turn and decode the reply.
    pub async fn chat(&self, query: &str, session_id: Option<&str>) -> ChatResponse {
        let response = self
            .post_chat(&json!({ "query": query, "session_id": session_id }))
            .await;
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.expect("Failed to parse chat response")
    }

    pub async fn post_thread_form(
        &self,
        thread_id: &str,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> reqwest::Response {
        self.client
            .post(format!("{}/threads/{}/{}", self.address, thread_id, path))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_json(&self, path: &str) -> Value {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .expect("Failed to parse response")
    }
}

/// A file part with the given name, media type and size.
pub fn file_part(name: &str, media_type: &str, size: usize) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(vec![b'a'; size])
        .file_name(name.to_string())
        .mime_str(media_type)
        .expect("valid media type")
}

/// Split an SSE body into its `data:` payloads.
pub fn sse_data(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim_start().to_string())
        .collect()
}
