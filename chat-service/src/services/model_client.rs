//! Timeout-bounded access to the language model with an explicit outcome.
//!
//! Callers never see provider errors: every call ends in either a reply or a
//! [`ModelFailure`] they are expected to turn into a deterministic fallback.

use super::metrics;
use super::providers::{GenerationRequest, ProviderError, ProviderStream, TextProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_stream::StreamExt;

/// Why a model call produced no usable text.
#[derive(Debug, Error)]
pub enum ModelFailure {
    #[error("no model credential configured")]
    NotConfigured,

    #[error("model call timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("model returned no text")]
    Empty,
}

impl ModelFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            ModelFailure::NotConfigured => "not_configured",
            ModelFailure::TimedOut(_) => "timeout",
            ModelFailure::Provider(e) => e.kind(),
            ModelFailure::Empty => "empty",
        }
    }
}

/// Result of a single completion.
#[derive(Debug)]
pub enum ModelOutcome {
    Reply(String),
    Unavailable(ModelFailure),
}

/// Handle to the configured provider, if any.
#[derive(Clone)]
pub struct ModelClient {
    provider: Option<Arc<dyn TextProvider>>,
    timeout: Duration,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn TextProvider>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    /// Client for fallback mode: every call reports `NotConfigured`.
    pub fn disabled() -> Self {
        Self {
            provider: None,
            timeout: Duration::ZERO,
        }
    }

    /// `"fallback"` without a provider, otherwise the provider name.
    pub fn mode(&self) -> &str {
        self.provider
            .as_ref()
            .map(|p| p.name())
            .unwrap_or("fallback")
    }

    /// Run one completion. `purpose` labels logs and metrics (`router`,
    /// `current_customer`, ...).
    pub async fn complete(&self, purpose: &'static str, request: GenerationRequest) -> ModelOutcome {
        let Some(provider) = &self.provider else {
            return self.fail(purpose, ModelFailure::NotConfigured);
        };

        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, provider.generate(&request)).await;
        metrics::record_model_latency(provider.name(), purpose, start.elapsed().as_secs_f64());

        match result {
            Err(_) => self.fail(purpose, ModelFailure::TimedOut(self.timeout)),
            Ok(Err(e)) => self.fail(purpose, ModelFailure::Provider(e)),
            Ok(Ok(response)) => match response.text.map(|t| t.trim().to_string()) {
                Some(text) if !text.is_empty() => {
                    tracing::debug!(
                        purpose,
                        input_tokens = response.input_tokens,
                        output_tokens = response.output_tokens,
                        "Model call succeeded"
                    );
                    ModelOutcome::Reply(text)
                }
                _ => self.fail(purpose, ModelFailure::Empty),
            },
        }
    }

    /// Open a streaming completion. The timeout bounds opening the stream and
    /// every wait for the next chunk; a stall ends the stream with
    /// [`ProviderError::StreamStalled`].
    pub async fn stream(
        &self,
        purpose: &'static str,
        request: GenerationRequest,
    ) -> Result<ProviderStream, ModelFailure> {
        let Some(provider) = &self.provider else {
            return Err(self.record_failure(purpose, ModelFailure::NotConfigured));
        };

        let timeout = self.timeout;
        match tokio::time::timeout(timeout, provider.generate_stream(&request)).await {
            Ok(Ok(stream)) => {
                let bounded = stream.timeout(timeout).map(move |item| {
                    item.unwrap_or_else(|_| {
                        tracing::warn!(purpose, ?timeout, "Model stream stalled");
                        metrics::record_model_fallback(purpose, "timeout");
                        Err(ProviderError::StreamStalled(timeout))
                    })
                });
                Ok(Box::pin(bounded))
            }
            Ok(Err(e)) => Err(self.record_failure(purpose, ModelFailure::Provider(e))),
            Err(_) => Err(self.record_failure(purpose, ModelFailure::TimedOut(self.timeout))),
        }
    }

    /// Probe the provider. Fallback mode is always healthy.
    pub async fn health_check(&self) -> Result<(), ModelFailure> {
        let Some(provider) = &self.provider else {
            return Ok(());
        };
        match tokio::time::timeout(self.timeout, provider.health_check()).await {
            Ok(result) => result.map_err(ModelFailure::Provider),
            Err(_) => Err(ModelFailure::TimedOut(self.timeout)),
        }
    }

    fn fail(&self, purpose: &'static str, failure: ModelFailure) -> ModelOutcome {
        ModelOutcome::Unavailable(self.record_failure(purpose, failure))
    }

    fn record_failure(&self, purpose: &'static str, failure: ModelFailure) -> ModelFailure {
        metrics::record_model_fallback(purpose, failure.reason());
        match &failure {
            // Expected in fallback mode; not worth a warning per call.
            ModelFailure::NotConfigured => {
                tracing::debug!(purpose, "Model not configured, using fallback")
            }
            other => tracing::warn!(purpose, error = %other, "Model call failed, using fallback"),
        }
        failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockTextProvider;
    use crate::services::providers::StreamChunk;

    fn client(provider: MockTextProvider, timeout: Duration) -> ModelClient {
        ModelClient::new(Arc::new(provider), timeout)
    }

    #[tokio::test]
    async fn disabled_client_reports_not_configured() {
        let outcome = ModelClient::disabled()
            .complete("test", GenerationRequest::new("s", "p"))
            .await;
        assert!(matches!(
            outcome,
            ModelOutcome::Unavailable(ModelFailure::NotConfigured)
        ));
        assert_eq!(ModelClient::disabled().mode(), "fallback");
    }

    #[tokio::test]
    async fn hanging_provider_times_out() {
        let client = client(MockTextProvider::hanging(), Duration::from_millis(20));
        let outcome = client.complete("test", GenerationRequest::new("s", "p")).await;
        assert!(matches!(
            outcome,
            ModelOutcome::Unavailable(ModelFailure::TimedOut(_))
        ));
    }

    #[tokio::test]
    async fn blank_reply_counts_as_empty() {
        let client = client(MockTextProvider::replying("   "), Duration::from_secs(1));
        let outcome = client.complete("test", GenerationRequest::new("s", "p")).await;
        assert!(matches!(outcome, ModelOutcome::Unavailable(ModelFailure::Empty)));
    }

    #[tokio::test]
    async fn reply_is_trimmed() {
        let client = client(MockTextProvider::replying(" NEW_CUSTOMER\n"), Duration::from_secs(1));
        match client.complete("test", GenerationRequest::new("s", "p")).await {
            ModelOutcome::Reply(text) => assert_eq!(text, "NEW_CUSTOMER"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn stalled_stream_ends_with_timeout() {
        let client = client(MockTextProvider::stalling("half a"), Duration::from_millis(50));
        let mut stream = client
            .stream("test", GenerationRequest::new("s", "p"))
            .await
            .expect("stream should open");

        assert!(matches!(stream.next().await, Some(Ok(StreamChunk::Text(t))) if t == "half "));
        assert!(matches!(stream.next().await, Some(Ok(StreamChunk::Text(t))) if t == "a"));
        assert!(matches!(
            stream.next().await,
            Some(Err(ProviderError::StreamStalled(_)))
        ));
    }
}
