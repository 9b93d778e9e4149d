use crate::models::{BillData, ResolutionStatus, ThreadState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadChatResponse {
    pub messages: Vec<String>,
    pub resolution_status: ResolutionStatus,
    pub bill_data: Option<BillData>,
    pub energy_plan: Option<String>,
    pub files_processed: usize,
    pub required_user_input: bool,
    pub input_needed: Option<String>,
}

impl From<&ThreadState> for ThreadChatResponse {
    fn from(state: &ThreadState) -> Self {
        Self {
            messages: state.messages.clone(),
            resolution_status: state.resolution_status,
            bill_data: state.bill_data.clone(),
            energy_plan: state.energy_plan.clone(),
            files_processed: state.files_processed,
            required_user_input: state.required_user_input,
            input_needed: state.input_needed.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadMessagesResponse {
    pub messages: Vec<String>,
}

/// Full thread state, or an empty object for unknown threads.
#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadStateResponse {
    pub values: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteThreadResponse {
    pub status: String,
    pub message: String,
}

/// Payload of one `data:` line on the run stream.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamChunkEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub message_type: String,
}

impl StreamChunkEvent {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            kind: "assistant".to_string(),
            content: content.into(),
            message_type: "chunk".to_string(),
        }
    }
}
