use thiserror::Error;

use crate::domain::claim::ClaimStatus;
use crate::domain::request::{ApprovalRequestId, RequestStatus};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("approval request {request_id:?} was already processed (status {status:?})")]
    AlreadyProcessed { request_id: ApprovalRequestId, status: RequestStatus },
    #[error("approval request {request_id:?} is not the active request in its sequence")]
    OutOfTurn { request_id: ApprovalRequestId },
    #[error("invalid claim transition from {from:?} to {to:?}")]
    InvalidClaimTransition { from: ClaimStatus, to: ClaimStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    /// Failure class for exit codes and structured logs. Nothing is
    /// retried; every failure surfaces synchronously to the caller.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::AlreadyProcessed { .. }) => "already_processed",
            Self::Domain(DomainError::OutOfTurn { .. }) => "out_of_turn",
            Self::Domain(DomainError::InvalidClaimTransition { .. }) => "invalid_transition",
            Self::Domain(DomainError::InvariantViolation(_)) => "invariant_violation",
            Self::NotFound { .. } => "not_found",
            Self::Persistence(_) => "persistence",
            Self::Integration(_) => "integration",
            Self::Configuration(_) => "configuration",
        }
    }
}
