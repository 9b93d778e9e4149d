use crate::dtos::{ChatContext, ChatRequest, ChatResponse};
use crate::models::{Role, Session};
use crate::services::{agents, session_store::Entry};
use crate::startup::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use validator::Validate;

/// `POST /chat`. Always answers 200; anything unusable gets the fallback body.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<ChatResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Unreadable chat request");
            return fallback(&state);
        }
    };

    if let Err(e) = request.validate() {
        tracing::warn!(error = %e, "Invalid chat request");
        return fallback(&state);
    }

    if request.has_file.unwrap_or(false) {
        tracing::debug!(file_name = ?request.file_name, "Chat turn references an attachment");
    }

    let (session_id, entry) = resolve_session(&state, request.session_id.as_deref());
    let mut session = entry.lock().await;
    let query = request.query;

    session.add_message(Role::User, query.clone(), None);

    let decision = state.supervisor.route(&query, &mut session, &state.model).await;
    session.set_current_agent(decision.agent);

    let reply = agents::respond(
        decision.agent,
        &query,
        &mut session,
        &state.model,
        &state.customers,
    )
    .await;
    session.add_message(Role::Assistant, reply.clone(), Some(decision.agent));

    Json(ChatResponse {
        response: reply,
        agent_used: decision.agent,
        session_id,
        reasoning: decision.reasoning,
        context: Some(ChatContext::from(&*session)),
    })
}

/// Live session for `requested`, or a new one when it is missing or expired.
fn resolve_session(state: &AppState, requested: Option<&str>) -> (String, Entry<Session>) {
    if let Some(id) = requested {
        if let Some(entry) = state.sessions.get(id) {
            return (id.to_string(), entry);
        }
        tracing::info!(session_id = id, "Unknown or expired session, starting a new one");
    }

    state.sessions.create()
}

fn fallback(state: &AppState) -> Json<ChatResponse> {
    let (session_id, _) = state.sessions.create();
    Json(ChatResponse::fallback(session_id))
}
