use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use claimflow_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use claimflow_core::completion::{self, ClaimResolution};
use claimflow_core::currency::RateLookup;
use claimflow_core::domain::claim::{Claim, ClaimId, ClaimStatus};
use claimflow_core::domain::request::{
    ApprovalDecision, ApprovalRequest, ApprovalRequestId, RequestStatus,
};
use claimflow_core::domain::user::UserId;
use claimflow_core::errors::{ApplicationError, DomainError};
use claimflow_core::materializer::{self, DispatchMode, MaterializationPlan};
use claimflow_core::notify::{NotificationEvent, Notifier};
use claimflow_db::repositories::{
    ApprovalRequestRepository, ClaimRepository, RepositoryError, WorkflowRepository,
};

use crate::locks::ClaimLocks;

/// Input for a fresh claim. The engine assigns identity, converts the
/// amount into the company currency, and submits.
#[derive(Clone, Debug)]
pub struct ClaimDraft {
    pub owner_id: UserId,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub expense_date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitializeOutcome {
    pub requests_created: usize,
    pub sequential: bool,
    pub claim_status: ClaimStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecisionOutcome {
    pub claim_status: ClaimStatus,
    /// Populated only when the decision went through completion
    /// evaluation (not on the required-rejection short circuit).
    pub approval_percentage: Option<f64>,
    pub approved_count: Option<usize>,
    pub total_approvers: Option<usize>,
}

/// Orchestrates claim submission, request materialization, decision
/// processing, and completion evaluation over the repository seams.
pub struct WorkflowEngine {
    claims: Arc<dyn ClaimRepository>,
    workflows: Arc<dyn WorkflowRepository>,
    requests: Arc<dyn ApprovalRequestRepository>,
    rates: Arc<dyn RateLookup>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
    company_currency: String,
    locks: ClaimLocks,
}

impl WorkflowEngine {
    pub fn new(
        claims: Arc<dyn ClaimRepository>,
        workflows: Arc<dyn WorkflowRepository>,
        requests: Arc<dyn ApprovalRequestRepository>,
        rates: Arc<dyn RateLookup>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
        company_currency: impl Into<String>,
    ) -> Self {
        Self {
            claims,
            workflows,
            requests,
            rates,
            audit,
            notifier,
            company_currency: company_currency.into(),
            locks: ClaimLocks::default(),
        }
    }

    /// Create a claim from a draft, submit it, and materialize its
    /// approval requests in one call.
    pub async fn submit_claim(
        &self,
        draft: ClaimDraft,
    ) -> Result<(Claim, InitializeOutcome), ApplicationError> {
        let rate = self
            .rates
            .rate(&draft.currency, &self.company_currency)
            .map_err(|e| ApplicationError::Integration(e.to_string()))?;

        let now = Utc::now();
        let mut claim = Claim {
            id: ClaimId(Uuid::new_v4().to_string()),
            owner_id: draft.owner_id,
            category: draft.category,
            description: draft.description,
            amount: draft.amount,
            currency: draft.currency,
            converted_amount: draft.amount * rate,
            expense_date: draft.expense_date,
            status: ClaimStatus::Pending,
            comment: None,
            approved_by: None,
            rejected_by: None,
            submitted_at: None,
            approved_at: None,
            rejected_at: None,
            created_at: now,
            updated_at: now,
        };
        claim.transition_to(ClaimStatus::Submitted, now)?;
        self.claims.save(claim.clone()).await.map_err(persistence)?;

        let outcome = self.initialize_workflow(&claim.id).await?;
        let claim = self
            .claims
            .find_by_id(&claim.id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("claim", claim.id.0.clone()))?;
        Ok((claim, outcome))
    }

    /// Materialize approval requests for a submitted claim. Without a
    /// workflow (or with nobody to ask) the claim auto-approves.
    pub async fn initialize_workflow(
        &self,
        claim_id: &ClaimId,
    ) -> Result<InitializeOutcome, ApplicationError> {
        let lock = self.locks.for_claim(claim_id);
        let _guard = lock.lock().await;

        let mut claim = self
            .claims
            .find_by_id(claim_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("claim", claim_id.0.clone()))?;

        if claim.is_resolved() {
            return Err(DomainError::InvariantViolation(format!(
                "claim {} is already resolved",
                claim.id.0
            ))
            .into());
        }
        if claim.status == ClaimStatus::Pending {
            let now = Utc::now();
            claim.transition_to(ClaimStatus::Submitted, now)?;
            self.claims.save(claim.clone()).await.map_err(persistence)?;
        }

        let workflow = self
            .workflows
            .find_for_employee(&claim.owner_id)
            .await
            .map_err(persistence)?;

        match materializer::plan(workflow.as_ref()) {
            MaterializationPlan::AutoApprove => {
                let now = Utc::now();
                claim.transition_to(ClaimStatus::Approved, now)?;
                claim.approved_by = Some(claim.owner_id.clone());
                self.claims.save(claim.clone()).await.map_err(persistence)?;

                self.audit.emit(
                    AuditEvent::new(
                        Some(claim.id.clone()),
                        claim.id.0.clone(),
                        "workflow.auto_approved",
                        AuditCategory::Materialization,
                        "workflow-engine",
                        AuditOutcome::Success,
                    )
                    .with_metadata("owner_id", claim.owner_id.0.clone()),
                );
                self.notifier.notify(NotificationEvent::ClaimResolved {
                    claim_id: claim.id.clone(),
                    status: claim.status,
                });

                Ok(InitializeOutcome {
                    requests_created: 0,
                    sequential: false,
                    claim_status: claim.status,
                })
            }
            MaterializationPlan::Dispatch { blueprints, mode } => {
                let Some(workflow) = workflow else {
                    return Err(DomainError::InvariantViolation(
                        "dispatch plan produced without a workflow".to_string(),
                    )
                    .into());
                };
                let now = Utc::now();
                let requests: Vec<ApprovalRequest> = blueprints
                    .iter()
                    .map(|blueprint| ApprovalRequest {
                        id: ApprovalRequestId(Uuid::new_v4().to_string()),
                        claim_id: claim.id.clone(),
                        approver_id: blueprint.approver_id.clone(),
                        workflow_id: workflow.id.clone(),
                        sequence: blueprint.sequence,
                        is_required: blueprint.is_required,
                        is_active: blueprint.is_active,
                        status: RequestStatus::Pending,
                        comment: None,
                        decided_at: None,
                        created_at: now,
                        updated_at: now,
                    })
                    .collect();

                let created =
                    self.requests.insert_many(requests.clone()).await.map_err(persistence)?;

                self.audit.emit(
                    AuditEvent::new(
                        Some(claim.id.clone()),
                        claim.id.0.clone(),
                        "workflow.materialized",
                        AuditCategory::Materialization,
                        "workflow-engine",
                        AuditOutcome::Success,
                    )
                    .with_metadata("requests_created", created.to_string())
                    .with_metadata("mode", format!("{mode:?}")),
                );
                self.notifier.notify(NotificationEvent::DispatchStarted {
                    claim_id: claim.id.clone(),
                    mode,
                    request_count: created,
                });
                for request in requests.iter().filter(|r| r.is_active) {
                    self.notifier.notify(NotificationEvent::ApproverQueued {
                        claim_id: claim.id.clone(),
                        approver_id: request.approver_id.clone(),
                        sequence: request.sequence,
                    });
                }

                Ok(InitializeOutcome {
                    requests_created: created,
                    sequential: mode == DispatchMode::Sequential,
                    claim_status: claim.status,
                })
            }
        }
    }

    /// Apply one approver's decision, then recompute the claim status.
    pub async fn decide(
        &self,
        request_id: &ApprovalRequestId,
        decision: ApprovalDecision,
        comment: Option<String>,
    ) -> Result<DecisionOutcome, ApplicationError> {
        // First read only locates the claim; the authoritative read-check-
        // write runs under the claim lock.
        let peek = self
            .requests
            .find_by_id(request_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("approval request", request_id.0.clone()))?;

        let lock = self.locks.for_claim(&peek.claim_id);
        let _guard = lock.lock().await;

        let mut request = self
            .requests
            .find_by_id(request_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("approval request", request_id.0.clone()))?;

        let claim = self.claims.find_by_id(&request.claim_id).await.map_err(persistence)?;
        let Some(mut claim) = claim else {
            // A required-approver rejection with no claim to veto is a
            // broken invariant rather than a plain missing record.
            if request.is_required && decision == ApprovalDecision::Rejected {
                let violation = DomainError::InvariantViolation(format!(
                    "required rejection for vanished claim {}",
                    request.claim_id.0
                ));
                tracing::error!(
                    event_name = "decision.invariant_violation",
                    request_id = %request.id.0,
                    claim_id = %request.claim_id.0,
                    "required approver rejected but claim was not found"
                );
                return Err(violation.into());
            }
            return Err(ApplicationError::not_found("claim", request.claim_id.0.clone()));
        };

        let now = Utc::now();
        request.decide(decision, comment, now)?;
        self.requests.save(request.clone()).await.map_err(persistence)?;

        self.audit.emit(
            AuditEvent::new(
                Some(claim.id.clone()),
                request.id.0.clone(),
                "decision.recorded",
                AuditCategory::Decision,
                request.approver_id.0.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("decision", format!("{decision:?}"))
            .with_metadata("sequence", request.sequence.to_string()),
        );

        if decision == ApprovalDecision::Rejected && request.is_required {
            return self.apply_required_rejection(&mut claim, &request).await;
        }

        self.evaluate_completion(&mut claim).await
    }

    /// Required-approver rejection: absolute veto, independent of any
    /// percentage threshold.
    async fn apply_required_rejection(
        &self,
        claim: &mut Claim,
        request: &ApprovalRequest,
    ) -> Result<DecisionOutcome, ApplicationError> {
        let now = Utc::now();
        claim.transition_to(ClaimStatus::Rejected, now)?;
        claim.rejected_by = Some(request.approver_id.clone());
        self.claims.save(claim.clone()).await.map_err(persistence)?;

        let cancelled =
            self.requests.cancel_pending_for_claim(&claim.id, now).await.map_err(persistence)?;

        self.audit.emit(
            AuditEvent::new(
                Some(claim.id.clone()),
                request.id.0.clone(),
                "decision.vetoed",
                AuditCategory::Decision,
                request.approver_id.0.clone(),
                AuditOutcome::Rejected,
            )
            .with_metadata("cancelled_requests", cancelled.to_string()),
        );
        self.notifier.notify(NotificationEvent::ClaimResolved {
            claim_id: claim.id.clone(),
            status: claim.status,
        });

        Ok(DecisionOutcome {
            claim_status: claim.status,
            approval_percentage: None,
            approved_count: None,
            total_approvers: None,
        })
    }

    /// Fold the full request set into a claim status and carry out the
    /// resulting state changes (cancellation, sequential activation).
    async fn evaluate_completion(
        &self,
        claim: &mut Claim,
    ) -> Result<DecisionOutcome, ApplicationError> {
        let workflow = self
            .workflows
            .find_for_employee(&claim.owner_id)
            .await
            .map_err(persistence)?;
        let all_requests = self.requests.list_for_claim(&claim.id).await.map_err(persistence)?;

        let outcome = completion::evaluate(workflow.as_ref(), &all_requests);
        let now = Utc::now();

        match outcome.resolution {
            ClaimResolution::Approved => {
                claim.transition_to(ClaimStatus::Approved, now)?;
                self.claims.save(claim.clone()).await.map_err(persistence)?;
                let cancelled = self
                    .requests
                    .cancel_pending_for_claim(&claim.id, now)
                    .await
                    .map_err(persistence)?;

                self.audit.emit(
                    AuditEvent::new(
                        Some(claim.id.clone()),
                        claim.id.0.clone(),
                        "completion.threshold_met",
                        AuditCategory::Completion,
                        "workflow-engine",
                        AuditOutcome::Success,
                    )
                    .with_metadata("approved_count", outcome.approved_count.to_string())
                    .with_metadata("total_approvers", outcome.total_approvers.to_string())
                    .with_metadata("cancelled_requests", cancelled.to_string()),
                );
                self.notifier.notify(NotificationEvent::ClaimResolved {
                    claim_id: claim.id.clone(),
                    status: claim.status,
                });
            }
            ClaimResolution::Rejected => {
                // Idempotent re-statement of the veto path; the claim may
                // already be terminal when re-evaluated.
                if !claim.is_resolved() {
                    claim.transition_to(ClaimStatus::Rejected, now)?;
                    self.claims.save(claim.clone()).await.map_err(persistence)?;
                    self.requests
                        .cancel_pending_for_claim(&claim.id, now)
                        .await
                        .map_err(persistence)?;
                    self.notifier.notify(NotificationEvent::ClaimResolved {
                        claim_id: claim.id.clone(),
                        status: claim.status,
                    });
                }
            }
            ClaimResolution::Pending => {
                let sequential = workflow.as_ref().map(|w| w.sequential).unwrap_or(false);
                if sequential {
                    self.activate_next_request(claim, &all_requests, now).await?;
                }
            }
        }

        Ok(DecisionOutcome {
            claim_status: claim.status,
            approval_percentage: Some(outcome.approval_percentage),
            approved_count: Some(outcome.approved_count),
            total_approvers: Some(outcome.total_approvers),
        })
    }

    /// Sequential dispatch: hand the turn to the lowest-sequence pending
    /// request and tell its approver.
    async fn activate_next_request(
        &self,
        claim: &Claim,
        all_requests: &[ApprovalRequest],
        now: chrono::DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        let next = all_requests
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .min_by_key(|r| r.sequence);

        let Some(next) = next else {
            return Ok(());
        };
        if next.is_active {
            return Ok(());
        }

        let mut next = next.clone();
        next.activate(now);
        self.requests.save(next.clone()).await.map_err(persistence)?;

        self.audit.emit(
            AuditEvent::new(
                Some(claim.id.clone()),
                next.id.0.clone(),
                "completion.turn_advanced",
                AuditCategory::Completion,
                "workflow-engine",
                AuditOutcome::Success,
            )
            .with_metadata("approver_id", next.approver_id.0.clone())
            .with_metadata("sequence", next.sequence.to_string()),
        );
        self.notifier.notify(NotificationEvent::NextApprover {
            claim_id: claim.id.clone(),
            approver_id: next.approver_id.clone(),
        });
        Ok(())
    }

    /// An approver's actionable queue: pending requests whose turn has
    /// come up.
    pub async fn list_pending_for(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ApprovalRequest>, ApplicationError> {
        self.requests.list_pending_for_approver(approver_id).await.map_err(persistence)
    }

    /// Full request set for a claim in sequence order, for review screens.
    pub async fn requests_for_claim(
        &self,
        claim_id: &ClaimId,
    ) -> Result<Vec<ApprovalRequest>, ApplicationError> {
        self.requests.list_for_claim(claim_id).await.map_err(persistence)
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
