use crate::models::{AgentLabel, Session};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub const FALLBACK_GREETING: &str = "Hello! I'm your Energy Assistant. How can I help you today?";

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(custom(function = "not_blank", message = "Query cannot be empty"))]
    pub query: String,

    /// Unknown or expired ids are replaced by a fresh session.
    pub session_id: Option<String>,

    /// Client-side copy of the conversation. The server keeps its own log.
    #[serde(default)]
    pub conversation_history: Option<Vec<serde_json::Value>>,

    #[serde(default)]
    pub has_file: Option<bool>,

    pub file_name: Option<String>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub agent_used: AgentLabel,
    pub session_id: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ChatContext>,
}

/// Snapshot of what the session knows after the turn.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatContext {
    pub customer_number: Option<String>,
    pub address: Option<String>,
    pub current_agent: Option<AgentLabel>,
}

impl From<&Session> for ChatContext {
    fn from(session: &Session) -> Self {
        Self {
            customer_number: session.customer_number.clone(),
            address: session.address.clone(),
            current_agent: session.current_agent,
        }
    }
}

impl ChatResponse {
    /// Degraded body returned when a request cannot be served.
    pub fn fallback(session_id: String) -> Self {
        Self {
            response: FALLBACK_GREETING.to_string(),
            agent_used: AgentLabel::Fallback,
            session_id,
            reasoning: "System fallback".to_string(),
            context: None,
        }
    }
}
