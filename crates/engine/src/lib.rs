pub mod locks;
pub mod service;
pub mod telemetry;

pub use locks::ClaimLocks;
pub use service::{ClaimDraft, DecisionOutcome, InitializeOutcome, WorkflowEngine};
pub use telemetry::{LogNotifier, TracingAuditSink};
