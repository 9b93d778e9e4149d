//! Customer account lookups and service-area checks.

use crate::models::CustomerRecord;
use std::collections::HashMap;

/// Cities with network coverage, matched case-insensitively against an address.
pub const COVERAGE_AREAS: [&str; 5] = ["sydney", "melbourne", "brisbane", "perth", "adelaide"];

/// In-process directory of known accounts.
#[derive(Debug, Clone)]
pub struct CustomerDirectory {
    accounts: HashMap<String, CustomerRecord>,
}

impl CustomerDirectory {
    pub fn new(accounts: HashMap<String, CustomerRecord>) -> Self {
        Self { accounts }
    }

    /// Directory seeded with the demo account `12345`.
    pub fn demo() -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(
            "12345".to_string(),
            CustomerRecord {
                name: "John Smith".to_string(),
                address: Some("123 Main St, Sydney NSW 2000".to_string()),
                current_bill: 450.50,
                usage_kwh: 850,
                rate: Some(0.28),
                account_status: "active".to_string(),
                due_date: None,
            },
        );
        Self::new(accounts)
    }

    /// Record for `customer_number`, or the placeholder when unknown.
    pub fn lookup(&self, customer_number: &str) -> CustomerRecord {
        match self.accounts.get(customer_number) {
            Some(record) => record.clone(),
            None => {
                tracing::debug!(customer_number, "Unknown customer number, using placeholder");
                CustomerRecord::placeholder()
            }
        }
    }
}

impl Default for CustomerDirectory {
    fn default() -> Self {
        Self::demo()
    }
}

/// Whether `address` falls in a coverage area.
pub fn is_serviceable(address: &str) -> bool {
    let address = address.to_lowercase();
    COVERAGE_AREAS.iter().any(|area| address.contains(area))
}

/// Availability sentence for `address`.
pub fn availability(address: &str) -> String {
    if is_serviceable(address) {
        format!("Energy services are available at {}", address)
    } else {
        format!(
            "Energy services may not be available at {}. Please contact support.",
            address
        )
    }
}
