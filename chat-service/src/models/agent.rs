//! Handler labels and routing decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handler selected by the supervisor for a `/chat` turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentLabel {
    CurrentCustomer,
    NewCustomer,
    /// Only used for the degraded response body, never stored on a session.
    Fallback,
}

impl AgentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentLabel::CurrentCustomer => "CURRENT_CUSTOMER",
            AgentLabel::NewCustomer => "NEW_CUSTOMER",
            AgentLabel::Fallback => "FALLBACK",
        }
    }
}

impl fmt::Display for AgentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the supervisor reached its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingSource {
    /// Kept the handler of the previous turn.
    Continuity,
    /// Classified by the language model.
    Model,
    /// Keyword heuristic after the model was unavailable.
    Heuristic,
}

impl RoutingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingSource::Continuity => "continuity",
            RoutingSource::Model => "model",
            RoutingSource::Heuristic => "heuristic",
        }
    }
}

/// Output of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub agent: AgentLabel,
    pub reasoning: String,
    pub source: RoutingSource,
}

impl RoutingDecision {
    pub fn new(agent: AgentLabel, reasoning: impl Into<String>, source: RoutingSource) -> Self {
        Self {
            agent,
            reasoning: reasoning.into(),
            source,
        }
    }
}
