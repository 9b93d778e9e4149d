//! Session model for `/chat` conversation context.

use super::{AgentLabel, CustomerRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything the session store can hold: created from an identifier and
/// expired by its last activity.
pub trait Expiring: Send + 'static {
    /// Build an empty record for a freshly minted identifier.
    fn fresh(id: String) -> Self;

    /// Time of the last mutation.
    fn last_activity(&self) -> DateTime<Utc>;
}

/// A single `/chat` conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier handed back to the client.
    pub session_id: String,

    /// Customer number extracted from the conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,

    /// Postal address, stored as the full message it was mentioned in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Cached account record for `customer_number`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_data: Option<CustomerRecord>,

    /// Handler that served the previous turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_agent: Option<AgentLabel>,

    /// Messages exchanged in this session, oldest first.
    pub messages: Vec<SessionMessage>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: Role,

    pub content: String,

    /// Handler that produced the message (assistant messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentLabel>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Session {
    /// Create an empty session.
    pub fn new(session_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            customer_number: None,
            address: None,
            customer_data: None,
            current_agent: None,
            messages: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn set_customer_number(&mut self, customer_number: String) {
        self.customer_number = Some(customer_number);
        self.touch();
    }

    pub fn set_address(&mut self, address: String) {
        self.address = Some(address);
        self.touch();
    }

    pub fn set_customer_data(&mut self, data: CustomerRecord) {
        self.customer_data = Some(data);
        self.touch();
    }

    pub fn set_current_agent(&mut self, agent: AgentLabel) {
        self.current_agent = Some(agent);
        self.touch();
    }

    /// Append a message to the log.
    pub fn add_message(&mut self, role: Role, content: String, agent: Option<AgentLabel>) {
        self.messages.push(SessionMessage {
            role,
            content,
            agent,
            timestamp: Utc::now(),
        });
        self.touch();
    }

    /// Refresh the last-activity time. Never moves it backwards, even if the
    /// wall clock does.
    pub fn touch(&mut self) {
        self.last_updated = self.last_updated.max(Utc::now());
    }
}

impl Expiring for Session {
    fn fresh(id: String) -> Self {
        Session::new(id)
    }

    fn last_activity(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn every_mutation_refreshes_last_activity() {
        let mut session = Session::new("s-1".to_string());
        let before = Utc::now() - Duration::minutes(10);
        session.last_updated = before;

        session.set_customer_number("12345".to_string());
        assert!(session.last_updated > before);

        let after_number = session.last_updated;
        session.add_message(Role::User, "hello".to_string(), None);
        assert!(session.last_updated >= after_number);
        assert_eq!(session.messages.len(), 1);
    }

    #[test]
    fn touch_is_monotonic() {
        let mut session = Session::new("s-2".to_string());
        let future = Utc::now() + Duration::minutes(5);
        session.last_updated = future;

        session.touch();
        assert_eq!(session.last_updated, future);
    }
}
