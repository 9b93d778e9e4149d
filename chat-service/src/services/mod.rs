pub mod agents;
pub mod customers;
pub mod ingest;
pub mod metrics;
pub mod model_client;
pub mod passthrough;
pub mod providers;
pub mod router;
pub mod session_store;
pub mod workflow;

pub use customers::CustomerDirectory;
pub use model_client::{ModelClient, ModelFailure, ModelOutcome};
pub use router::Supervisor;
pub use session_store::SessionStore;
