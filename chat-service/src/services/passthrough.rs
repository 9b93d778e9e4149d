//! Generic model passthrough used by the thread run stream.

use super::providers::GenerationRequest;
use crate::models::{ContentBlock, ThreadState};

/// Transcript lines sent along as context.
const HISTORY_LINES: usize = 20;

const SYSTEM_PROMPT: &str = "You are a helpful assistant for an energy retailer. Answer the \
    user's latest message, using any attached files and the conversation so far.";

/// Request for the user's latest `message`, carrying recent history from `thread`.
/// Call before the message is appended to the transcript.
pub fn request(thread: &ThreadState, message: &str, content: Vec<ContentBlock>) -> GenerationRequest {
    let start = thread.messages.len().saturating_sub(HISTORY_LINES);
    let history = &thread.messages[start..];

    let system = if history.is_empty() {
        SYSTEM_PROMPT.to_string()
    } else {
        format!("{}\n\nConversation so far:\n{}", SYSTEM_PROMPT, history.join("\n"))
    };

    GenerationRequest::new(system, message).with_content(content)
}

/// Deterministic reply used when the model cannot be reached.
pub fn acknowledgement(file_count: usize) -> String {
    let files = match file_count {
        0 => String::new(),
        1 => " and 1 attached file".to_string(),
        n => format!(" and {} attached files", n),
    };
    format!(
        "I received your message{}. The assistant is running without its language model right now, so I can't give a detailed answer yet.",
        files
    )
}
