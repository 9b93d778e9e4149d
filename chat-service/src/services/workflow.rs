//! Multi-agent workflow behind `/threads/{id}/chat`.
//!
//! A turn appends the user's line, lets the supervisor pick a specialist
//! (unless the caller names one) and runs that specialist once.

use super::metrics;
use super::model_client::{ModelClient, ModelOutcome};
use super::providers::{GenerationParams, GenerationRequest};
use crate::models::{BillData, ContentBlock, ResolutionStatus, ThreadState, WorkflowAgent};

const SUPERVISOR: &str = "Supervisor";

pub const GREEN_PLAN: &str = "Recommended: Green Energy Plan - 15% savings vs current plan";

/// Inputs for one workflow turn.
#[derive(Debug, Default)]
pub struct TurnInput {
    pub message: String,
    /// Applied only when the thread is new.
    pub customer_id: Option<String>,
    /// Applied only when the thread is new.
    pub customer_type: Option<String>,
    pub content: Vec<ContentBlock>,
    /// Skip the supervisor and run this agent directly.
    pub start_at: Option<WorkflowAgent>,
}

/// Run one turn against `state`.
pub async fn run_turn(state: &mut ThreadState, input: TurnInput, model: &ModelClient) {
    if state.is_new() {
        state.customer_id = input.customer_id;
        if let Some(customer_type) = input.customer_type {
            state.customer_type = customer_type;
        }
    }

    state.say("User", &input.message);
    state.files_processed = input.content.len();
    state.required_user_input = false;
    state.input_needed = None;

    let agent = match input.start_at {
        Some(agent) => agent,
        None => supervise(state, &input.message, model).await,
    };
    state.next_agent = Some(agent);

    tracing::info!(thread_id = %state.thread_id, agent = %agent, "Workflow agent selected");

    match agent {
        WorkflowAgent::BillExplorer => bill_explorer(state, &input.content),
        WorkflowAgent::SwitchAgent => switch_agent(state, &input.content),
        WorkflowAgent::BrandNewAgent => brand_new_agent(state, &input.content, model).await,
    }
}

/// Ask the model which specialist should take the message.
async fn supervise(state: &mut ThreadState, message: &str, model: &ModelClient) -> WorkflowAgent {
    let system = "You are a supervisor agent for an energy company. Based on the customer's \
        message, decide which specialist agent should handle their request.\n\
        - bill_explorer: existing customers who need help with their energy bills, usage \
        analysis, or billing questions.\n\
        - switch_agent: customers wanting to compare energy plans or switch providers.\n\
        - brand_new_agent: customers who need new energy service connections or are new to \
        the energy company.\n\
        Respond with only the agent name.";
    let request = GenerationRequest::new(system, message).with_params(GenerationParams {
        temperature: Some(0.0),
        max_tokens: Some(16),
    });

    let chosen = match model.complete("supervisor", request).await {
        ModelOutcome::Reply(text) => parse_agent(&text),
        ModelOutcome::Unavailable(_) => None,
    };

    match chosen {
        Some(agent) => {
            metrics::record_routing_decision(agent.as_str(), "model");
            state.say(
                SUPERVISOR,
                format!("Routing to {} based on request analysis", agent.title()),
            );
            agent
        }
        None => {
            metrics::record_routing_decision(WorkflowAgent::BillExplorer.as_str(), "default");
            state.say(SUPERVISOR, "Defaulting to Bill Explorer");
            WorkflowAgent::BillExplorer
        }
    }
}

/// First agent name found in a supervisor answer.
fn parse_agent(output: &str) -> Option<WorkflowAgent> {
    output.parse().ok().or_else(|| {
        let output = output.to_lowercase();
        WorkflowAgent::ALL
            .into_iter()
            .find(|agent| output.contains(agent.as_str()))
    })
}

fn bill_explorer(state: &mut ThreadState, content: &[ContentBlock]) {
    let speaker = WorkflowAgent::BillExplorer.title();
    state.say(speaker, "Accessing customer bill data...");

    let bill = if content.is_empty() {
        BillData::Statement {
            account_id: state.customer_id.clone(),
            current_charges: 245.67,
            usage_kwh: 892,
            plan_type: "Standard Residential".to_string(),
            billing_period: "Sept 15 - Oct 15".to_string(),
            previous_balance: 0.00,
            payment_due: "Nov 1, 2025".to_string(),
        }
    } else {
        state.say(
            speaker,
            format!("Processing {} uploaded file(s) for bill analysis...", content.len()),
        );
        BillData::FromFiles {
            parsed_from_file: true,
            files_processed: content.len(),
        }
    };

    state.say(speaker, "Bill analysis complete.");
    state.bill_data = Some(bill);
    state.resolution_status = ResolutionStatus::BillExplained;
}

fn switch_agent(state: &mut ThreadState, content: &[ContentBlock]) {
    let speaker = WorkflowAgent::SwitchAgent.title();
    if content.is_empty() {
        state.say(speaker, "No files uploaded for plan comparison.");
    } else {
        state.say(
            speaker,
            format!(
                "Received {} file(s) for plan comparison. Processing uploaded bills...",
                content.len()
            ),
        );
    }

    state.say(speaker, "Comparing available energy plans...");
    state.energy_plan = Some(GREEN_PLAN.to_string());
    state.resolution_status = ResolutionStatus::PlansCompared;
}

async fn brand_new_agent(state: &mut ThreadState, content: &[ContentBlock], model: &ModelClient) {
    let speaker = WorkflowAgent::BrandNewAgent.title();
    let message = state
        .last_user_message()
        .unwrap_or("New connection request")
        .to_string();
    let lowered = message.to_lowercase();

    if !lowered.contains("address") && !lowered.contains("location") {
        state.say(
            speaker,
            "I need your service address to proceed with the new connection.",
        );
        state.required_user_input = true;
        state.input_needed = Some(WorkflowAgent::BrandNewAgent.as_str().to_string());
        state.resolution_status = ResolutionStatus::AwaitingInput;
        return;
    }

    let file_context = if content.is_empty() {
        String::new()
    } else {
        format!(" with {} uploaded files", content.len())
    };
    let system = format!(
        "You are an energy company agent helping with new connection requests.\n\
         The customer wrote{}.\n\
         Provide a helpful response for setting up new energy service.",
        file_context
    );
    let request = GenerationRequest::new(system, message).with_content(content.to_vec());

    match model.complete("brand_new_agent", request).await {
        ModelOutcome::Reply(text) => {
            state.say(speaker, text);
            state.resolution_status = ResolutionStatus::ConnectionProcessed;
        }
        ModelOutcome::Unavailable(_) => {
            state.say(
                speaker,
                "Processing new connection request... Connection approved. Welcome package will be sent.",
            );
            state.resolution_status = ResolutionStatus::ConnectionVerified;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockTextProvider;
    use std::sync::Arc;
    use std::time::Duration;

    fn thread() -> ThreadState {
        ThreadState::new("thread-1".to_string())
    }

    fn turn(message: &str) -> TurnInput {
        TurnInput {
            message: message.to_string(),
            ..Default::default()
        }
    }

    fn text_file() -> ContentBlock {
        ContentBlock::Text {
            text: "[File: bill]\nTotal 100".to_string(),
        }
    }

    #[tokio::test]
    async fn supervisor_defaults_to_bill_explorer_without_model() {
        let mut state = thread();
        run_turn(&mut state, turn("help"), &ModelClient::disabled()).await;

        assert_eq!(state.messages[0], "User: help");
        assert_eq!(state.messages[1], "Supervisor: Defaulting to Bill Explorer");
        assert_eq!(state.next_agent, Some(WorkflowAgent::BillExplorer));
        assert_eq!(state.resolution_status, ResolutionStatus::BillExplained);
        match state.bill_data {
            Some(BillData::Statement { current_charges, usage_kwh, .. }) => {
                assert_eq!(current_charges, 245.67);
                assert_eq!(usage_kwh, 892);
            }
            other => panic!("unexpected bill data: {:?}", other),
        }
    }

    #[tokio::test]
    async fn supervisor_follows_model_choice() {
        let mut state = thread();
        let model = ModelClient::new(
            Arc::new(MockTextProvider::replying("switch_agent")),
            Duration::from_secs(1),
        );

        run_turn(&mut state, turn("cheaper plans?"), &model).await;

        assert_eq!(
            state.messages[1],
            "Supervisor: Routing to Switch Agent based on request analysis"
        );
        assert_eq!(state.energy_plan.as_deref(), Some(GREEN_PLAN));
        assert_eq!(state.resolution_status, ResolutionStatus::PlansCompared);
    }

    #[tokio::test]
    async fn unrecognised_supervisor_answer_defaults() {
        let mut state = thread();
        let model = ModelClient::new(
            Arc::new(MockTextProvider::replying("no idea")),
            Duration::from_secs(1),
        );

        run_turn(&mut state, turn("hi"), &model).await;

        assert_eq!(state.messages[1], "Supervisor: Defaulting to Bill Explorer");
    }

    #[tokio::test]
    async fn bill_explorer_counts_uploaded_files() {
        let mut state = thread();
        let input = TurnInput {
            content: vec![text_file(), text_file()],
            start_at: Some(WorkflowAgent::BillExplorer),
            ..turn("explain this")
        };

        run_turn(&mut state, input, &ModelClient::disabled()).await;

        assert_eq!(state.files_processed, 2);
        assert_eq!(
            state.bill_data,
            Some(BillData::FromFiles {
                parsed_from_file: true,
                files_processed: 2
            })
        );
        assert!(state
            .messages
            .contains(&"Bill Explorer: Processing 2 uploaded file(s) for bill analysis...".to_string()));
    }

    #[tokio::test]
    async fn start_at_skips_supervisor() {
        let mut state = thread();
        let provider = Arc::new(MockTextProvider::replying("bill_explorer"));
        let model = ModelClient::new(provider.clone(), Duration::from_secs(1));
        let input = TurnInput {
            start_at: Some(WorkflowAgent::SwitchAgent),
            ..turn("compare")
        };

        run_turn(&mut state, input, &model).await;

        assert_eq!(provider.call_count(), 0);
        assert!(!state.messages.iter().any(|m| m.starts_with("Supervisor:")));
        assert_eq!(state.messages[1], "Switch Agent: No files uploaded for plan comparison.");
    }

    #[tokio::test]
    async fn brand_new_agent_asks_for_address() {
        let mut state = thread();
        let input = TurnInput {
            start_at: Some(WorkflowAgent::BrandNewAgent),
            ..turn("I need power connected")
        };

        run_turn(&mut state, input, &ModelClient::disabled()).await;

        assert!(state.required_user_input);
        assert_eq!(state.input_needed.as_deref(), Some("brand_new_agent"));
        assert_eq!(state.resolution_status, ResolutionStatus::AwaitingInput);
    }

    #[tokio::test]
    async fn brand_new_agent_falls_back_when_model_is_down() {
        let mut state = thread();
        let input = TurnInput {
            start_at: Some(WorkflowAgent::BrandNewAgent),
            ..turn("My address is 1 George St Sydney")
        };

        run_turn(&mut state, input, &ModelClient::disabled()).await;

        assert!(!state.required_user_input);
        assert_eq!(state.resolution_status, ResolutionStatus::ConnectionVerified);
        assert_eq!(
            state.messages.last().map(String::as_str),
            Some("Brand New Agent: Processing new connection request... Connection approved. Welcome package will be sent.")
        );
    }

    #[tokio::test]
    async fn brand_new_agent_uses_model_reply() {
        let mut state = thread();
        let model = ModelClient::new(
            Arc::new(MockTextProvider::replying("Connection booked for Monday.")),
            Duration::from_secs(1),
        );
        let input = TurnInput {
            start_at: Some(WorkflowAgent::BrandNewAgent),
            ..turn("new location: 9 Hay St Perth")
        };

        run_turn(&mut state, input, &model).await;

        assert_eq!(state.resolution_status, ResolutionStatus::ConnectionProcessed);
        assert_eq!(
            state.messages.last().map(String::as_str),
            Some("Brand New Agent: Connection booked for Monday.")
        );
    }

    #[tokio::test]
    async fn customer_details_apply_to_new_threads_only() {
        let mut state = thread();
        let first = TurnInput {
            customer_id: Some("C-1".to_string()),
            customer_type: Some("external".to_string()),
            ..turn("hello")
        };
        run_turn(&mut state, first, &ModelClient::disabled()).await;

        let second = TurnInput {
            customer_id: Some("C-2".to_string()),
            ..turn("again")
        };
        run_turn(&mut state, second, &ModelClient::disabled()).await;

        assert_eq!(state.customer_id.as_deref(), Some("C-1"));
        assert_eq!(state.customer_type, "external");
    }
}
