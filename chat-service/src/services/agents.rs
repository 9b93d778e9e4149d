//! Reply handlers for `/chat`. Every path ends in a non-empty string.

use super::customers::{self, CustomerDirectory};
use super::model_client::{ModelClient, ModelOutcome};
use super::providers::GenerationRequest;
use crate::models::{AgentLabel, Session};

pub const ASK_FOR_CUSTOMER_NUMBER: &str = "I can help with your energy account. Please provide your customer number so I can access your account information.";

pub const ASK_FOR_ADDRESS: &str = "I can help you switch energy providers or set up a new connection. Could you provide your address so I can check service availability?";

/// Dispatch to the handler named by `agent`.
pub async fn respond(
    agent: AgentLabel,
    message: &str,
    session: &mut Session,
    model: &ModelClient,
    customers: &CustomerDirectory,
) -> String {
    match agent {
        AgentLabel::CurrentCustomer => current_customer(message, session, model, customers).await,
        _ => new_customer(message, session, model).await,
    }
}

/// Billing and account questions from an existing customer.
pub async fn current_customer(
    message: &str,
    session: &mut Session,
    model: &ModelClient,
    customers: &CustomerDirectory,
) -> String {
    let Some(number) = session.customer_number.clone() else {
        return ASK_FOR_CUSTOMER_NUMBER.to_string();
    };

    let record = match &session.customer_data {
        Some(record) => record.clone(),
        None => {
            let record = customers.lookup(&number);
            session.set_customer_data(record.clone());
            record
        }
    };

    let record_json = serde_json::to_string(&record).unwrap_or_default();
    let system = format!(
        "You are a Current Customer Agent for an energy retailer.\n\
         Customer #{}: {}\n\n\
         Help with billing, account questions, and usage inquiries using the customer data.",
        number, record_json
    );

    match model
        .complete("current_customer", GenerationRequest::new(system, message))
        .await
    {
        ModelOutcome::Reply(text) => text,
        ModelOutcome::Unavailable(_) => format!(
            "Hi! I can see your account #{}. Your current bill is ${}. How can I help you today?",
            number,
            record.bill_display()
        ),
    }
}

/// Switching and new connections.
pub async fn new_customer(message: &str, session: &Session, model: &ModelClient) -> String {
    let Some(address) = session.address.as_deref() else {
        return ASK_FOR_ADDRESS.to_string();
    };

    let availability = customers::availability(address);
    let system = format!(
        "You are a New Customer Agent for an energy retailer.\n\
         Context: Address: {}\n\
         Service check: {}\n\n\
         Help customers switch providers or set up new connections.",
        address, availability
    );

    match model
        .complete("new_customer", GenerationRequest::new(system, message))
        .await
    {
        ModelOutcome::Reply(text) => text,
        ModelOutcome::Unavailable(_) => format!(
            "Hi! I can help you with energy services at {}. {}. What would you like to know about switching or setting up a new connection?",
            address, availability
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockTextProvider;
    use std::sync::Arc;
    use std::time::Duration;

    fn session() -> Session {
        Session::new("s".to_string())
    }

    #[tokio::test]
    async fn current_customer_asks_for_number_first() {
        let mut session = session();
        let reply = current_customer(
            "what's my bill",
            &mut session,
            &ModelClient::disabled(),
            &CustomerDirectory::demo(),
        )
        .await;
        assert_eq!(reply, ASK_FOR_CUSTOMER_NUMBER);
        assert!(session.customer_data.is_none());
    }

    #[tokio::test]
    async fn current_customer_fallback_quotes_bill() {
        let mut session = session();
        session.set_customer_number("12345".to_string());

        let reply = current_customer(
            "what's my bill",
            &mut session,
            &ModelClient::disabled(),
            &CustomerDirectory::demo(),
        )
        .await;

        assert_eq!(
            reply,
            "Hi! I can see your account #12345. Your current bill is $450.50. How can I help you today?"
        );
        assert_eq!(session.customer_data.as_ref().map(|r| r.name.as_str()), Some("John Smith"));
    }

    #[tokio::test]
    async fn current_customer_uses_model_reply() {
        let mut session = session();
        session.set_customer_number("55555".to_string());
        let provider = Arc::new(MockTextProvider::replying("Your bill is due soon."));
        let model = ModelClient::new(provider.clone(), Duration::from_secs(1));

        let reply =
            current_customer("when is it due", &mut session, &model, &CustomerDirectory::demo())
                .await;

        assert_eq!(reply, "Your bill is due soon.");
        let requests = provider.requests();
        assert!(requests[0].system.contains("Customer #55555"));
        assert!(requests[0].system.contains("450.5"));
    }

    #[tokio::test]
    async fn new_customer_asks_for_address_without_model_call() {
        let provider = Arc::new(MockTextProvider::replying("unused"));
        let model = ModelClient::new(provider.clone(), Duration::from_secs(1));

        let reply = new_customer("I want to switch", &session(), &model).await;

        assert_eq!(reply, ASK_FOR_ADDRESS);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn new_customer_fallback_echoes_address_and_availability() {
        let mut session = session();
        session.set_address("I want to switch, I live on 42 King Street".to_string());

        let reply = new_customer("I want to switch", &session, &ModelClient::disabled()).await;

        assert!(reply.contains("I want to switch, I live on 42 King Street"));
        assert!(reply.contains("may not be available"));
    }

    #[tokio::test]
    async fn failing_model_degrades_to_template() {
        let mut session = session();
        session.set_address("3 George St Sydney".to_string());
        let model = ModelClient::new(Arc::new(MockTextProvider::failing()), Duration::from_secs(1));

        let reply = new_customer("hi", &session, &model).await;

        assert!(reply.contains("Energy services are available at 3 George St Sydney"));
    }
}
