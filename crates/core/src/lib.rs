pub mod audit;
pub mod completion;
pub mod config;
pub mod currency;
pub mod domain;
pub mod errors;
pub mod materializer;
pub mod notify;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use completion::{evaluate, ClaimResolution, CompletionOutcome};
pub use currency::{FixedRateTable, RateLookup, RateLookupError};
pub use domain::claim::{Claim, ClaimId, ClaimStatus};
pub use domain::request::{
    ApprovalDecision, ApprovalRequest, ApprovalRequestId, RequestStatus,
};
pub use domain::user::{User, UserId, UserRole};
pub use domain::workflow::{ApproverRule, Workflow, WorkflowId};
pub use errors::{ApplicationError, DomainError};
pub use materializer::{plan, DispatchMode, MaterializationPlan, RequestBlueprint};
pub use notify::{InMemoryNotifier, NoopNotifier, NotificationEvent, Notifier};
