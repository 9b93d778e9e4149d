//! Mock provider implementation for testing.

use super::{
    FinishReason, GenerationRequest, ProviderError, ProviderResponse, ProviderStream, StreamChunk,
    TextProvider,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio_stream::StreamExt;
use std::sync::Mutex;
use std::time::Duration;

/// What the mock does for one call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text.
    Text(String),
    /// Return `"Mock response for: <prompt>"`.
    Echo,
    /// Fail with an API error.
    Fail,
    /// Never answer within any reasonable timeout.
    Hang,
    /// Stream this text, then fail mid-stream.
    Interrupt(String),
    /// Stream this text, then stop sending without completing.
    Stall(String),
}

/// Mock text provider for testing.
///
/// Replies are taken from the script in order; once it is exhausted every
/// further call gets the fallback reply.
pub struct MockTextProvider {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockTextProvider {
    pub fn new(script: Vec<MockReply>, fallback: MockReply) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(Vec::new(), MockReply::Text(text.into()))
    }

    /// Reply with each text in turn, then fail.
    pub fn scripted<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        let script = replies
            .into_iter()
            .map(|r| MockReply::Text(r.into()))
            .collect();
        Self::new(script, MockReply::Fail)
    }

    pub fn echoing() -> Self {
        Self::new(Vec::new(), MockReply::Echo)
    }

    pub fn failing() -> Self {
        Self::new(Vec::new(), MockReply::Fail)
    }

    pub fn hanging() -> Self {
        Self::new(Vec::new(), MockReply::Hang)
    }

    pub fn interrupting(text: impl Into<String>) -> Self {
        Self::new(Vec::new(), MockReply::Interrupt(text.into()))
    }

    pub fn stalling(text: impl Into<String>) -> Self {
        Self::new(Vec::new(), MockReply::Stall(text.into()))
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Copies of every request received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_reply(&self, request: &GenerationRequest) -> MockReply {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }

    async fn settle(
        &self,
        reply: MockReply,
        request: &GenerationRequest,
    ) -> Result<String, ProviderError> {
        match reply {
            MockReply::Text(text) | MockReply::Interrupt(text) | MockReply::Stall(text) => Ok(text),
            MockReply::Echo => Ok(format!("Mock response for: {}", request.prompt)),
            MockReply::Fail => Err(ProviderError::ApiError("Mock provider failure".to_string())),
            MockReply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::NetworkError("Mock provider hung".to_string()))
            }
        }
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let reply = self.next_reply(request);
        let text = self.settle(reply, request).await?;

        Ok(ProviderResponse {
            input_tokens: request.prompt.len() as i32 / 4,
            output_tokens: text.len() as i32 / 4,
            text: Some(text),
            finish_reason: FinishReason::Complete,
        })
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderStream, ProviderError> {
        let reply = self.next_reply(request);
        let stalls = matches!(reply, MockReply::Stall(_));
        let interrupts = matches!(reply, MockReply::Interrupt(_));
        let text = self.settle(reply, request).await?;
        let input_tokens = request.prompt.len() as i32 / 4;

        let mut chunks: Vec<Result<StreamChunk, ProviderError>> = text
            .split_inclusive(' ')
            .map(|word| Ok(StreamChunk::Text(word.to_string())))
            .collect();

        if stalls {
            let words = tokio_stream::iter(chunks);
            return Ok(Box::pin(words.chain(tokio_stream::pending())));
        }
        if interrupts {
            chunks.push(Err(ProviderError::NetworkError(
                "Mock stream interrupted".to_string(),
            )));
        } else {
            chunks.push(Ok(StreamChunk::Complete {
                input_tokens,
                output_tokens: chunks.len() as i32,
                finish_reason: FinishReason::Complete,
            }));
        }

        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match self.fallback {
            MockReply::Fail => Err(ProviderError::ApiError("Mock provider unavailable".to_string())),
            _ => Ok(()),
        }
    }
}
