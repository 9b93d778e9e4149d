pub mod chat;
pub mod threads;

pub use chat::{ChatContext, ChatRequest, ChatResponse};
pub use threads::{
    DeleteThreadResponse, StreamChunkEvent, ThreadChatResponse, ThreadMessagesResponse,
    ThreadStateResponse,
};
