//! State of a `/threads/{id}` workflow conversation.

use super::Expiring;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Specialist agents of the thread workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAgent {
    BillExplorer,
    SwitchAgent,
    BrandNewAgent,
}

impl WorkflowAgent {
    pub const ALL: [WorkflowAgent; 3] = [
        WorkflowAgent::BillExplorer,
        WorkflowAgent::SwitchAgent,
        WorkflowAgent::BrandNewAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowAgent::BillExplorer => "bill_explorer",
            WorkflowAgent::SwitchAgent => "switch_agent",
            WorkflowAgent::BrandNewAgent => "brand_new_agent",
        }
    }

    /// Name used as the speaker prefix in the transcript.
    pub fn title(&self) -> &'static str {
        match self {
            WorkflowAgent::BillExplorer => "Bill Explorer",
            WorkflowAgent::SwitchAgent => "Switch Agent",
            WorkflowAgent::BrandNewAgent => "Brand New Agent",
        }
    }
}

impl fmt::Display for WorkflowAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowAgent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let normalized = normalized.strip_prefix("route_to_").unwrap_or(&normalized);
        WorkflowAgent::ALL
            .into_iter()
            .find(|agent| agent.as_str() == normalized)
            .ok_or_else(|| format!("Unknown agent: {}", s))
    }
}

/// Where a thread conversation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Pending,
    BillExplained,
    PlansCompared,
    AwaitingInput,
    ConnectionProcessed,
    ConnectionVerified,
}

/// Bill summary attached by the bill explorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BillData {
    FromFiles {
        parsed_from_file: bool,
        files_processed: usize,
    },
    Statement {
        account_id: Option<String>,
        current_charges: f64,
        usage_kwh: u32,
        plan_type: String,
        billing_period: String,
        previous_balance: f64,
        payment_due: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadState {
    pub thread_id: String,

    /// Transcript lines, each prefixed with its speaker.
    pub messages: Vec<String>,

    pub customer_id: Option<String>,

    /// `existing`, `external` or `new`.
    pub customer_type: String,

    pub next_agent: Option<WorkflowAgent>,

    pub bill_data: Option<BillData>,

    pub energy_plan: Option<String>,

    pub resolution_status: ResolutionStatus,

    pub required_user_input: bool,

    pub input_needed: Option<String>,

    /// Files attached to the most recent turn.
    pub files_processed: usize,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl ThreadState {
    pub fn new(thread_id: String) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            messages: Vec::new(),
            customer_id: None,
            customer_type: "existing".to_string(),
            next_agent: None,
            bill_data: None,
            energy_plan: None,
            resolution_status: ResolutionStatus::Pending,
            required_user_input: false,
            input_needed: None,
            files_processed: 0,
            created_at: now,
            last_updated: now,
        }
    }

    /// True until the first message has been recorded.
    pub fn is_new(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a transcript line spoken by `speaker`.
    pub fn say(&mut self, speaker: &str, text: impl AsRef<str>) {
        self.messages.push(format!("{}: {}", speaker, text.as_ref()));
        self.touch();
    }

    /// Latest line written by the user, without its prefix.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find_map(|line| line.strip_prefix("User: "))
    }

    pub fn touch(&mut self) {
        self.last_updated = self.last_updated.max(Utc::now());
    }
}

impl Expiring for ThreadState {
    fn fresh(id: String) -> Self {
        ThreadState::new(id)
    }

    fn last_activity(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_names_parse_with_and_without_tool_prefix() {
        assert_eq!(
            "bill_explorer".parse::<WorkflowAgent>().unwrap(),
            WorkflowAgent::BillExplorer
        );
        assert_eq!(
            "route_to_switch_agent".parse::<WorkflowAgent>().unwrap(),
            WorkflowAgent::SwitchAgent
        );
        assert!("billing".parse::<WorkflowAgent>().is_err());
    }

    #[test]
    fn last_user_message_skips_agent_lines() {
        let mut state = ThreadState::new("t-1".to_string());
        state.say("User", "my bill is high");
        state.say("Supervisor", "Routing to Bill Explorer based on request analysis");
        assert_eq!(state.last_user_message(), Some("my bill is high"));
    }
}
