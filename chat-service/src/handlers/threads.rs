use crate::dtos::{
    DeleteThreadResponse, ThreadChatResponse, ThreadMessagesResponse, ThreadStateResponse,
};
use crate::models::WorkflowAgent;
use crate::services::ingest::{self, UploadedFile};
use crate::services::workflow::{self, TurnInput};
use crate::startup::AppState;
use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde_json::json;
use service_core::error::AppError;

/// Fields of a thread multipart form.
#[derive(Debug, Default)]
pub struct ThreadForm {
    pub message: Option<String>,
    pub customer_id: Option<String>,
    pub customer_type: Option<String>,
    pub start_at: Option<String>,
    pub files: Vec<UploadedFile>,
}

impl ThreadForm {
    /// Take the message out of the form, rejecting a missing or blank one.
    pub fn take_message(&mut self) -> Result<String, AppError> {
        self.message
            .take()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("message is required")))
    }
}

/// Read every part of a thread form. Files may be sent as `files` or `files[]`.
pub async fn read_form(mut multipart: Multipart) -> Result<ThreadForm, AppError> {
    let mut form = ThreadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "files" || name == "files[]" {
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
                })?
                .to_vec();

            // Browsers send an empty part when no file was picked.
            if bytes.is_empty() && filename.as_deref().map_or(true, str::is_empty) {
                continue;
            }

            form.files.push(UploadedFile {
                filename,
                content_type,
                bytes,
            });
            continue;
        }

        let value = field.text().await.map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read field {}: {}", name, e))
        })?;

        match name.as_str() {
            "message" => form.message = Some(value),
            "customer_id" => form.customer_id = Some(value).filter(|v| !v.is_empty()),
            "customer_type" => form.customer_type = Some(value).filter(|v| !v.is_empty()),
            "start_at" => form.start_at = Some(value).filter(|v| !v.is_empty()),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// `POST /threads/{id}/chat`
pub async fn thread_chat(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ThreadChatResponse>, AppError> {
    let mut form = read_form(multipart).await?;
    let message = form.take_message()?;

    let start_at = form
        .start_at
        .as_deref()
        .map(str::parse::<WorkflowAgent>)
        .transpose()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let content = ingest::ingest(form.files)?;

    let entry = state.threads.get_or_insert(&thread_id);
    let mut thread = entry.lock().await;

    tracing::info!(
        thread_id = %thread_id,
        files = content.len(),
        start_at = ?start_at,
        "Thread turn"
    );

    let input = TurnInput {
        message,
        customer_id: form.customer_id,
        customer_type: form.customer_type,
        content,
        start_at,
    };
    workflow::run_turn(&mut thread, input, &state.model).await;

    Ok(Json(ThreadChatResponse::from(&*thread)))
}

/// `GET /threads/{id}/messages`
pub async fn get_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Json<ThreadMessagesResponse> {
    let messages = match state.threads.get(&thread_id) {
        Some(entry) => entry.lock().await.messages.clone(),
        None => Vec::new(),
    };
    Json(ThreadMessagesResponse { messages })
}

/// `GET /threads/{id}/state`
pub async fn get_state(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<ThreadStateResponse>, AppError> {
    let values = match state.threads.get(&thread_id) {
        Some(entry) => {
            let thread = entry.lock().await;
            serde_json::to_value(&*thread)
                .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?
        }
        None => json!({}),
    };
    Ok(Json(ThreadStateResponse { values }))
}

/// `DELETE /threads/{id}`
pub async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Json<DeleteThreadResponse> {
    if state.threads.remove(&thread_id) {
        tracing::info!(thread_id = %thread_id, "Thread cleared");
    }
    Json(DeleteThreadResponse {
        status: "success".to_string(),
        message: format!("Thread {} cleared", thread_id),
    })
}
