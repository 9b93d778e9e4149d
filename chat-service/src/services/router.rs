//! Supervisor for `/chat`: context extraction and handler selection.

use super::metrics;
use super::model_client::{ModelClient, ModelOutcome};
use super::providers::{GenerationParams, GenerationRequest};
use crate::models::{AgentLabel, RoutingDecision, RoutingSource, Session};
use regex::Regex;

/// Words that mark a message as being about an existing account.
const BILLING_KEYWORDS: [&str; 4] = ["bill", "account", "payment", "usage"];

const CONTINUITY_REASONING: &str = "Continuing with established context";
const CURRENT_CUSTOMER_REASONING: &str = "Billing/account query";
const NEW_CUSTOMER_REASONING: &str = "New customer inquiry";

/// Picks the handler for each `/chat` turn.
pub struct Supervisor {
    customer_number: Regex,
    street: Regex,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            customer_number: Regex::new(r"\b\d{4,6}\b").expect("customer number pattern is valid"),
            street: Regex::new(r"(?i)\b(?:street|st|road|rd|avenue|ave)\b")
                .expect("street pattern is valid"),
        }
    }

    /// First 4 to 6 digit run standing on its own.
    pub fn find_customer_number<'a>(&self, message: &'a str) -> Option<&'a str> {
        self.customer_number.find(message).map(|m| m.as_str())
    }

    pub fn mentions_street(&self, message: &str) -> bool {
        self.street.is_match(message)
    }

    /// Fill the customer number and address from `message` when not yet known.
    /// The address is the whole message, as written.
    pub fn extract(&self, message: &str, session: &mut Session) {
        if session.customer_number.is_none() {
            if let Some(number) = self.find_customer_number(message) {
                tracing::debug!(session_id = %session.session_id, customer_number = number, "Customer number captured");
                session.set_customer_number(number.to_string());
            }
        }

        if session.address.is_none() && self.mentions_street(message) {
            tracing::debug!(session_id = %session.session_id, "Address captured");
            session.set_address(message.to_string());
        }
    }

    /// Extract context from `message` and choose a handler.
    pub async fn route(
        &self,
        message: &str,
        session: &mut Session,
        model: &ModelClient,
    ) -> RoutingDecision {
        self.extract(message, session);

        let decision = match (session.current_agent, session.customer_number.is_some()) {
            (Some(agent), true) => {
                RoutingDecision::new(agent, CONTINUITY_REASONING, RoutingSource::Continuity)
            }
            _ => match self.classify(message, session, model).await {
                Some(agent) => decision_for(agent, RoutingSource::Model),
                None => decision_for(heuristic(message, session), RoutingSource::Heuristic),
            },
        };

        metrics::record_routing_decision(decision.agent.as_str(), decision.source.as_str());
        tracing::info!(
            session_id = %session.session_id,
            agent = %decision.agent,
            source = decision.source.as_str(),
            "Routing decision"
        );

        decision
    }

    /// One model classification. `None` when the model is unavailable or its
    /// answer names neither label.
    async fn classify(
        &self,
        message: &str,
        session: &Session,
        model: &ModelClient,
    ) -> Option<AgentLabel> {
        let system = format!(
            "You are a Supervisor Agent for an energy retailer.\n\
             Context: Customer number: {}, Address: {}\n\n\
             Analyze the customer query and determine if they are:\n\
             1. CURRENT_CUSTOMER - existing customer with billing/account questions\n\
             2. NEW_CUSTOMER - wants to switch providers or new connection\n\n\
             Respond with only: CURRENT_CUSTOMER or NEW_CUSTOMER",
            session.customer_number.as_deref().unwrap_or("None"),
            session.address.as_deref().unwrap_or("None"),
        );
        let request = GenerationRequest::new(system, message).with_params(GenerationParams {
            temperature: Some(0.0),
            max_tokens: Some(16),
        });

        match model.complete("router", request).await {
            ModelOutcome::Reply(text) => parse_label(&text).or_else(|| {
                tracing::warn!(
                    session_id = %session.session_id,
                    output = %text,
                    "Classifier answer named no handler, using keywords"
                );
                None
            }),
            ModelOutcome::Unavailable(_) => None,
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Label named in a classifier answer. `CURRENT_CUSTOMER` wins if both appear.
fn parse_label(output: &str) -> Option<AgentLabel> {
    let output = output.to_uppercase();
    if output.contains("CURRENT_CUSTOMER") {
        Some(AgentLabel::CurrentCustomer)
    } else if output.contains("NEW_CUSTOMER") {
        Some(AgentLabel::NewCustomer)
    } else {
        None
    }
}

/// Keyword routing used whenever the classifier gives no answer.
pub fn heuristic(message: &str, session: &Session) -> AgentLabel {
    let message = message.to_lowercase();
    if session.customer_number.is_some() || BILLING_KEYWORDS.iter().any(|k| message.contains(k)) {
        AgentLabel::CurrentCustomer
    } else {
        AgentLabel::NewCustomer
    }
}

fn decision_for(agent: AgentLabel, source: RoutingSource) -> RoutingDecision {
    let reasoning = match agent {
        AgentLabel::CurrentCustomer => CURRENT_CUSTOMER_REASONING,
        _ => NEW_CUSTOMER_REASONING,
    };
    RoutingDecision::new(agent, reasoning, source)
}
