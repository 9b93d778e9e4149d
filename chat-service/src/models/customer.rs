//! Customer account records.

use serde::{Deserialize, Serialize};

/// Account data looked up for an existing customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub current_bill: f64,
    pub usage_kwh: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    pub account_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl CustomerRecord {
    /// Record served for customer numbers the directory does not know.
    pub fn placeholder() -> Self {
        Self {
            name: "Customer".to_string(),
            address: None,
            current_bill: 450.50,
            usage_kwh: 850,
            rate: None,
            account_status: "active".to_string(),
            due_date: None,
        }
    }

    /// Bill amount formatted for display, e.g. `450.50`.
    pub fn bill_display(&self) -> String {
        format!("{:.2}", self.current_bill)
    }
}
