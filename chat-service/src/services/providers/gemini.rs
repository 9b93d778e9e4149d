//! Gemini provider implementation.
//!
//! Implements text generation using Google's Gemini API.
//! Supports both streaming and non-streaming responses.

use super::{
    FinishReason, GenerationParams, GenerationRequest, ProviderError, ProviderResponse,
    ProviderStream, StreamChunk, TextProvider,
};
use crate::models::{ContentBlock, DocumentFormat};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Endpoint root, normally [`GEMINI_API_BASE`].
    pub api_base: String,
    /// Transport-level timeout for a single HTTP exchange.
    pub request_timeout: Duration,
}

/// Gemini text provider.
pub struct GeminiTextProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::NetworkError(format!("Failed to build client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.api_base(),
            self.config.model,
            method,
            self.config.api_key
        )
    }

    fn api_base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    /// Convert content descriptors to Gemini content parts.
    fn content_to_parts(content: &[ContentBlock]) -> Vec<ContentPart> {
        content
            .iter()
            .map(|block| match block {
                ContentBlock::Image { media_type, data } => ContentPart::InlineData {
                    inline_data: InlineData {
                        mime_type: media_type.clone(),
                        data: data.clone(),
                    },
                },
                ContentBlock::Document {
                    format,
                    name,
                    bytes,
                    ..
                } if format.is_textual() => ContentPart::Text {
                    text: format!(
                        "[Document {} ({})]\n{}",
                        name,
                        format,
                        String::from_utf8_lossy(bytes)
                    ),
                },
                ContentBlock::Document {
                    format: format @ DocumentFormat::Pdf,
                    bytes,
                    ..
                } => ContentPart::InlineData {
                    inline_data: InlineData {
                        mime_type: format.mime_type().to_string(),
                        data: BASE64.encode(bytes),
                    },
                },
                // Word documents cannot be inlined; tell the model one was attached.
                ContentBlock::Document {
                    format, name, size, ..
                } => ContentPart::Text {
                    text: format!("[Document {} ({}), {} bytes attached]", name, format, size),
                },
                ContentBlock::Text { text } => ContentPart::Text { text: text.clone() },
            })
            .collect()
    }

    /// Build generation config from parameters.
    fn build_generation_config(params: &GenerationParams) -> GenerationConfig {
        GenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_tokens,
        }
    }

    fn build_request(request: &GenerationRequest) -> GenerateContentRequest {
        let mut parts = Self::content_to_parts(&request.content);
        parts.push(ContentPart::Text {
            text: request.prompt.clone(),
        });

        let system_instruction = if request.system.trim().is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: vec![ContentPart::Text {
                    text: request.system.clone(),
                }],
            })
        };

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction,
            generation_config: Some(Self::build_generation_config(&request.params)),
        }
    }

    async fn post(
        &self,
        url: &str,
        body: &GenerateContentRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            if status.as_u16() == 400 {
                return Err(ProviderError::InvalidRequest(error_text));
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

fn map_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("STOP") => FinishReason::Complete,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") => FinishReason::ContentFilter,
        Some("OTHER") => FinishReason::Error,
        _ => FinishReason::Complete,
    }
}

/// Concatenate every text part of the first candidate.
fn candidate_text(response: &GenerateContentResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let text: String = candidate
        .content
        .parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    Some(text)
}

/// Reassembles SSE events from network reads that may split a UTF-8
/// character or an event separator.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Append `bytes` and return the `data` payload of every event they complete.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some((end, separator)) = event_end(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + separator).take(end).collect();
            payloads.extend(event_data(&event));
        }
        payloads
    }

    /// Payload of a trailing event that was not followed by a blank line.
    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        event_data(&rest)
    }
}

/// Offset and length of the first blank-line separator.
fn event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = find(buffer, b"\n\n").map(|at| (at, 2));
    let crlf = find(buffer, b"\r\n\r\n").map(|at| (at, 4));
    match (lf, crlf) {
        (Some(lf), Some(crlf)) => Some(if lf.0 < crlf.0 { lf } else { crlf }),
        (lf, crlf) => lf.or(crlf),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Joined `data:` lines of one complete event.
fn event_data(event: &[u8]) -> Option<String> {
    let text = match std::str::from_utf8(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping Gemini stream event with invalid UTF-8");
            return None;
        }
    };

    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

/// Usage and finish state accumulated over one stream.
#[derive(Debug)]
struct StreamTally {
    input_tokens: i32,
    output_tokens: i32,
    finish_reason: FinishReason,
}

impl Default for StreamTally {
    fn default() -> Self {
        Self {
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Complete,
        }
    }
}

impl StreamTally {
    /// Parse one event payload and send its text. Returns false once the
    /// receiver is gone.
    async fn forward(
        &mut self,
        data: &str,
        tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>,
    ) -> bool {
        let response = match serde_json::from_str::<GenerateContentResponse>(data) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unparseable Gemini stream event");
                return true;
            }
        };

        if let Some(usage) = &response.usage_metadata {
            self.input_tokens = usage.prompt_token_count.unwrap_or(0);
            self.output_tokens = usage.candidates_token_count.unwrap_or(0);
        }

        if let Some(candidate) = response.candidates.first() {
            if candidate.finish_reason.is_some() {
                self.finish_reason = map_finish_reason(candidate.finish_reason.as_deref());
            }
        }

        match candidate_text(&response) {
            Some(text) if !text.is_empty() => tx.send(Ok(StreamChunk::Text(text))).await.is_ok(),
            _ => true,
        }
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = Self::build_request(request);
        let url = self.api_url("generateContent");

        tracing::debug!(
            model = %self.config.model,
            prompt_len = request.prompt.len(),
            attachments = request.content.len(),
            "Sending request to Gemini API"
        );

        let response = self.post(&url, &body).await?;

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let text = candidate_text(&api_response);

        // Get token usage
        let usage = api_response.usage_metadata.unwrap_or_default();

        let finish_reason = api_response
            .candidates
            .first()
            .map(|c| map_finish_reason(c.finish_reason.as_deref()))
            .unwrap_or(FinishReason::Complete);

        if finish_reason == FinishReason::ContentFilter {
            return Err(ProviderError::ContentFiltered);
        }

        Ok(ProviderResponse {
            text,
            input_tokens: usage.prompt_token_count.unwrap_or(0),
            output_tokens: usage.candidates_token_count.unwrap_or(0),
            finish_reason,
        })
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderStream, ProviderError> {
        let body = Self::build_request(request);
        let url = format!("{}&alt=sse", self.api_url("streamGenerateContent"));

        tracing::debug!(
            model = %self.config.model,
            prompt_len = request.prompt.len(),
            attachments = request.content.len(),
            "Starting streaming request to Gemini API"
        );

        let response = self.post(&url, &body).await?;

        // Create channel for streaming
        let (tx, rx) = mpsc::channel(32);

        // Spawn task to process SSE stream
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();
            let mut tally = StreamTally::default();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::NetworkError(e.to_string())))
                            .await;
                        return;
                    }
                };

                for data in decoder.push(&chunk) {
                    if !tally.forward(&data, &tx).await {
                        // Receiver dropped: the client went away.
                        return;
                    }
                }
            }

            if let Some(data) = decoder.finish() {
                if !tally.forward(&data, &tx).await {
                    return;
                }
            }

            if tally.finish_reason == FinishReason::ContentFilter {
                let _ = tx.send(Err(ProviderError::ContentFiltered)).await;
                return;
            }

            // Send completion
            let _ = tx
                .send(Ok(StreamChunk::Complete {
                    input_tokens: tally.input_tokens,
                    output_tokens: tally.output_tokens,
                    finish_reason: tally.finish_reason,
                }))
                .await;
        });

        let stream = ReceiverStream::new(rx);
        Ok(Box::pin(stream) as ProviderStream)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        // Try to list models to verify API key works
        let url = format!("{}/models?key={}", self.api_base(), self.config.api_key);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}
