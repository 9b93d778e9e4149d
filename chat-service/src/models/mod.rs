//! Domain models for the chat service.

pub mod agent;
pub mod content;
pub mod customer;
pub mod session;
pub mod thread;

pub use agent::{AgentLabel, RoutingDecision, RoutingSource};
pub use content::{ContentBlock, DocumentFormat};
pub use customer::CustomerRecord;
pub use session::{Expiring, Role, Session, SessionMessage};
pub use thread::{BillData, ResolutionStatus, ThreadState, WorkflowAgent};
