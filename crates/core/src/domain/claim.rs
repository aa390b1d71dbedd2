use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Submitted,
    Approved,
    Rejected,
}

/// An expense reimbursement claim. Mutated only by the workflow engine
/// once submitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub owner_id: UserId,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    /// Amount expressed in the company currency, fixed at submission time.
    pub converted_amount: Decimal,
    pub expense_date: NaiveDate,
    pub status: ClaimStatus,
    pub comment: Option<String>,
    pub approved_by: Option<UserId>,
    pub rejected_by: Option<UserId>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        matches!(
            (self.status, next),
            (ClaimStatus::Pending, ClaimStatus::Submitted)
                | (ClaimStatus::Submitted, ClaimStatus::Approved)
                | (ClaimStatus::Submitted, ClaimStatus::Rejected)
        )
    }

    pub fn transition_to(
        &mut self,
        next: ClaimStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidClaimTransition { from: self.status, to: next });
        }

        self.status = next;
        self.updated_at = now;
        match next {
            ClaimStatus::Submitted => self.submitted_at = Some(now),
            ClaimStatus::Approved => self.approved_at = Some(now),
            ClaimStatus::Rejected => self.rejected_at = Some(now),
            ClaimStatus::Pending => {}
        }
        Ok(())
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.status, ClaimStatus::Approved | ClaimStatus::Rejected)
    }
}
