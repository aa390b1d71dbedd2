use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::claim::ClaimId;
use crate::domain::user::UserId;
use crate::domain::workflow::WorkflowId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalRequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl ApprovalDecision {
    pub fn as_status(self) -> RequestStatus {
        match self {
            Self::Approved => RequestStatus::Approved,
            Self::Rejected => RequestStatus::Rejected,
        }
    }
}

/// One approver's decision slot for one claim. Created pending in bulk at
/// materialization; mutated terminally exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub claim_id: ClaimId,
    pub approver_id: UserId,
    pub workflow_id: WorkflowId,
    /// Materialized position, 0..N-1. The manager slot, when present, is 0.
    pub sequence: i64,
    pub is_required: bool,
    /// Dispatch gate: sequential workflows activate one request at a time.
    pub is_active: bool,
    pub status: RequestStatus,
    pub comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Record the approver's decision. Fails on anything already decided
    /// or cancelled, and on requests whose turn has not come up.
    pub fn decide(
        &mut self,
        decision: ApprovalDecision,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status != RequestStatus::Pending {
            return Err(DomainError::AlreadyProcessed {
                request_id: self.id.clone(),
                status: self.status,
            });
        }
        if !self.is_active {
            return Err(DomainError::OutOfTurn { request_id: self.id.clone() });
        }

        self.status = decision.as_status();
        self.comment = comment;
        self.decided_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Bulk cancellation path for requests made moot by claim resolution.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != RequestStatus::Pending {
            return Err(DomainError::AlreadyProcessed {
                request_id: self.id.clone(),
                status: self.status,
            });
        }

        self.status = RequestStatus::Cancelled;
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.is_active = true;
        self.updated_at = now;
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::claim::ClaimId;
    use crate::domain::user::UserId;
    use crate::domain::workflow::WorkflowId;
    use crate::errors::DomainError;

    use super::{ApprovalDecision, ApprovalRequest, ApprovalRequestId, RequestStatus};

    fn request(is_active: bool) -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: ApprovalRequestId("req-1".to_string()),
            claim_id: ClaimId("CLM-1".to_string()),
            approver_id: UserId("u-manager".to_string()),
            workflow_id: WorkflowId("wf-1".to_string()),
            sequence: 0,
            is_required: true,
            is_active,
            status: RequestStatus::Pending,
            comment: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn decision_is_terminal() {
        let mut request = request(true);
        let now = Utc::now();

        request
            .decide(ApprovalDecision::Approved, Some("looks fine".to_string()), now)
            .expect("first decision");
        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.decided_at, Some(now));

        let error = request
            .decide(ApprovalDecision::Rejected, None, Utc::now())
            .expect_err("second decision must fail");
        assert!(matches!(
            error,
            DomainError::AlreadyProcessed { status: RequestStatus::Approved, .. }
        ));
    }

    #[test]
    fn inactive_requests_cannot_be_decided() {
        let mut request = request(false);
        let error = request
            .decide(ApprovalDecision::Approved, None, Utc::now())
            .expect_err("inactive request");
        assert!(matches!(error, DomainError::OutOfTurn { .. }));
    }

    #[test]
    fn cancel_only_applies_to_pending_requests() {
        let mut request = request(true);
        request.cancel(Utc::now()).expect("pending -> cancelled");
        assert_eq!(request.status, RequestStatus::Cancelled);
        assert!(!request.is_active);

        assert!(request.cancel(Utc::now()).is_err());
    }
}
