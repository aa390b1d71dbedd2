use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use claimflow_core::domain::claim::{Claim, ClaimId, ClaimStatus};
use claimflow_core::domain::request::{ApprovalRequest, ApprovalRequestId};
use claimflow_core::domain::user::{User, UserId};
use claimflow_core::domain::workflow::{Workflow, WorkflowId};

pub mod claim;
pub mod memory;
pub mod request;
pub mod user;
pub mod workflow;

pub use claim::SqlClaimRepository;
pub use memory::{
    InMemoryApprovalRequestRepository, InMemoryClaimRepository, InMemoryUserRepository,
    InMemoryWorkflowRepository,
};
pub use request::SqlApprovalRequestRepository;
pub use user::SqlUserRepository;
pub use workflow::SqlWorkflowRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Per-status rollup of claims for dashboard cards.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusSummary {
    pub status: ClaimStatus,
    pub count: i64,
    pub converted_total: Decimal,
}

#[async_trait]
pub trait ClaimRepository: Send + Sync {
    async fn find_by_id(&self, id: &ClaimId) -> Result<Option<Claim>, RepositoryError>;
    async fn save(&self, claim: Claim) -> Result<(), RepositoryError>;
    async fn list_for_owner(&self, owner_id: &UserId) -> Result<Vec<Claim>, RepositoryError>;
    async fn status_summary(&self) -> Result<Vec<StatusSummary>, RepositoryError>;
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<Workflow>, RepositoryError>;
    async fn find_for_employee(
        &self,
        employee_id: &UserId,
    ) -> Result<Option<Workflow>, RepositoryError>;
    async fn save(&self, workflow: Workflow) -> Result<(), RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Workflow>, RepositoryError>;
    async fn delete(&self, id: &WorkflowId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ApprovalRequestRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError>;
    async fn save(&self, request: ApprovalRequest) -> Result<(), RepositoryError>;
    /// Atomic bulk insert: either every request lands or none do.
    async fn insert_many(&self, requests: Vec<ApprovalRequest>) -> Result<usize, RepositoryError>;
    /// All requests for a claim, ordered by sequence.
    async fn list_for_claim(
        &self,
        claim_id: &ClaimId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError>;
    /// Active pending requests only: sequential workflows hide slots whose
    /// turn has not come up.
    async fn list_pending_for_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError>;
    async fn cancel_pending_for_claim(
        &self,
        claim_id: &ClaimId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
    async fn list_all(&self) -> Result<Vec<User>, RepositoryError>;
}

pub(crate) fn decode<T>(value: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    value.map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{raw}`: {e}")))
}

pub(crate) fn parse_timestamp_opt(
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|s| parse_timestamp(&s)).transpose()
}

pub(crate) fn parse_decimal(raw: &str) -> Result<Decimal, RepositoryError> {
    raw.parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("bad decimal `{raw}`: {e}")))
}
