//! HTTP handlers for the chat service.

pub mod chat;
pub mod health;
pub mod stream;
pub mod threads;

pub use chat::chat;
pub use health::{health_check, metrics_handler, readiness_check};
pub use stream::run_stream;
pub use threads::{delete_thread, get_messages, get_state, thread_chat};
