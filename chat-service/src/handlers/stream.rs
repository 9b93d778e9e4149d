use super::threads::read_form;
use crate::dtos::StreamChunkEvent;
use crate::services::ingest;
use crate::services::model_client::ModelClient;
use crate::services::passthrough;
use crate::services::providers::{GenerationRequest, StreamChunk};
use crate::startup::AppState;
use axum::{
    extract::{Multipart, Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::StreamExt;
use serde_json::json;
use service_core::error::AppError;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

type EventSender = mpsc::Sender<Result<Event, Infallible>>;

/// `POST /threads/{id}/runs/stream`
///
/// Streams the assistant reply as SSE `data:` events and always finishes with
/// `data: [DONE]`. The user message and the full reply are appended to the
/// thread transcript.
pub async fn run_stream(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    multipart: Multipart,
) -> Result<Sse<ReceiverStream<Result<Event, Infallible>>>, AppError> {
    let mut form = read_form(multipart).await?;
    let message = form.take_message()?;
    let content = ingest::ingest(form.files)?;

    let entry = state.threads.get_or_insert(&thread_id);
    let model = state.model.clone();
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut thread = entry.lock().await;
        let file_count = content.len();
        let request = passthrough::request(&thread, &message, content);

        thread.say("User", &message);
        thread.files_processed = file_count;

        let reply = forward_reply(&model, request, file_count, &tx).await;
        if !reply.is_empty() {
            thread.say("Assistant", &reply);
        }
        drop(thread);

        tracing::info!(thread_id = %thread_id, chars = reply.len(), "Run stream finished");
        let _ = tx.send(Ok(Event::default().data("[DONE]"))).await;
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

/// Send the reply as chunk events and return the text that was sent.
async fn forward_reply(
    model: &ModelClient,
    request: GenerationRequest,
    file_count: usize,
    tx: &EventSender,
) -> String {
    let mut stream = match model.stream("passthrough", request).await {
        Ok(stream) => stream,
        Err(_) => {
            let reply = passthrough::acknowledgement(file_count);
            send(tx, chunk_event(&reply)).await;
            return reply;
        }
    };

    let mut reply = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(StreamChunk::Text(text)) => {
                reply.push_str(&text);
                if !send(tx, chunk_event(&text)).await {
                    tracing::debug!("Stream client disconnected");
                    break;
                }
            }
            Ok(StreamChunk::Complete { .. }) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Model stream failed");
                send(tx, Event::default().data(json!({ "error": e.to_string() }).to_string())).await;
                break;
            }
        }
    }

    if reply.is_empty() {
        // The model produced nothing usable; answer with the canned text.
        reply = passthrough::acknowledgement(file_count);
        send(tx, chunk_event(&reply)).await;
    }

    reply
}

fn chunk_event(text: &str) -> Event {
    let payload = serde_json::to_string(&StreamChunkEvent::assistant(text))
        .unwrap_or_else(|_| json!({ "error": "failed to encode chunk" }).to_string());
    Event::default().data(payload)
}

/// Returns false once the receiver is gone.
async fn send(tx: &EventSender, event: Event) -> bool {
    tx.send(Ok(event)).await.is_ok()
}
