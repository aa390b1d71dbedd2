use serde::{Deserialize, Serialize};

use crate::domain::request::{ApprovalRequest, RequestStatus};
use crate::domain::user::UserId;
use crate::domain::workflow::Workflow;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimResolution {
    Approved,
    Rejected,
    Pending,
}

/// Deterministic summary of one evaluation pass over a claim's full
/// request set. Re-evaluating the same set yields an identical outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub resolution: ClaimResolution,
    pub approved_count: usize,
    pub rejected_count: usize,
    pub pending_count: usize,
    pub cancelled_count: usize,
    /// Every request ever materialized for the claim, decided or not.
    pub total_approvers: usize,
    pub approval_percentage: f64,
    pub minimum_required: Option<u8>,
    /// Sequential workflows only: the approver whose turn is next when
    /// the claim stays unresolved.
    pub next_approver: Option<UserId>,
}

/// Fold a claim's approval requests into a resolution.
///
/// Threshold semantics: with a configured percentage the claim approves
/// once at least one approval exists and `approved * 100 >= pct * total`
/// (integer comparison, cancelled and pending requests stay in the
/// denominator). Without a configured percentage the claim approves when
/// every required request is approved, or, for workflows with no required
/// slots, when every request is approved. A lone rejection therefore
/// never approves a claim, whatever the threshold.
pub fn evaluate(workflow: Option<&Workflow>, requests: &[ApprovalRequest]) -> CompletionOutcome {
    let total = requests.len();
    let approved = count(requests, RequestStatus::Approved);

    let mut outcome = CompletionOutcome {
        resolution: ClaimResolution::Pending,
        approved_count: approved,
        rejected_count: count(requests, RequestStatus::Rejected),
        pending_count: count(requests, RequestStatus::Pending),
        cancelled_count: count(requests, RequestStatus::Cancelled),
        total_approvers: total,
        approval_percentage: if total == 0 {
            0.0
        } else {
            (approved as f64 / total as f64) * 100.0
        },
        minimum_required: workflow.and_then(|w| w.minimum_approval_percentage),
        next_approver: None,
    };

    // Defensive guard: a claim without a workflow was auto-approved at
    // materialization and never reaches this path with requests.
    let Some(workflow) = workflow else {
        outcome.resolution = ClaimResolution::Approved;
        return outcome;
    };
    if total == 0 {
        outcome.resolution = ClaimResolution::Approved;
        return outcome;
    }

    let required_rejected =
        requests.iter().any(|r| r.is_required && r.status == RequestStatus::Rejected);
    if required_rejected {
        outcome.resolution = ClaimResolution::Rejected;
        return outcome;
    }

    let threshold_met = match outcome.minimum_required {
        Some(pct) => approved > 0 && approved * 100 >= usize::from(pct) * total,
        None => {
            let mut required = requests.iter().filter(|r| r.is_required).peekable();
            if required.peek().is_none() {
                approved == total
            } else {
                required.all(|r| r.status == RequestStatus::Approved)
            }
        }
    };

    if threshold_met {
        outcome.resolution = ClaimResolution::Approved;
        return outcome;
    }

    if workflow.sequential {
        outcome.next_approver = next_in_sequence(requests);
    }
    outcome
}

/// The pending request whose turn is next: the lowest sequence still
/// pending. Every predecessor of that slot is decided by construction,
/// so a non-required rejection hands the turn onward instead of stalling
/// the chain.
pub fn next_in_sequence(requests: &[ApprovalRequest]) -> Option<UserId> {
    requests
        .iter()
        .filter(|r| r.status == RequestStatus::Pending)
        .min_by_key(|r| r.sequence)
        .map(|r| r.approver_id.clone())
}

fn count(requests: &[ApprovalRequest], status: RequestStatus) -> usize {
    requests.iter().filter(|r| r.status == status).count()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::claim::ClaimId;
    use crate::domain::request::{ApprovalRequest, ApprovalRequestId, RequestStatus};
    use crate::domain::user::UserId;
    use crate::domain::workflow::{ApproverRule, Workflow, WorkflowId};

    use super::{evaluate, ClaimResolution};

    fn workflow(minimum: Option<u8>, sequential: bool) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: WorkflowId("wf-1".to_string()),
            employee_id: UserId("u-employee".to_string()),
            description: "Expense chain".to_string(),
            manager_id: None,
            is_manager_approver: false,
            approvers: vec![ApproverRule {
                approver_id: UserId("u-a".to_string()),
                required: false,
                sequence: 0,
            }],
            sequential,
            minimum_approval_percentage: minimum,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn request(
        id: &str,
        approver: &str,
        sequence: i64,
        is_required: bool,
        status: RequestStatus,
    ) -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: ApprovalRequestId(id.to_string()),
            claim_id: ClaimId("CLM-1".to_string()),
            approver_id: UserId(approver.to_string()),
            workflow_id: WorkflowId("wf-1".to_string()),
            sequence,
            is_required,
            is_active: true,
            status,
            comment: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn missing_workflow_resolves_approved() {
        let outcome = evaluate(None, &[]);
        assert_eq!(outcome.resolution, ClaimResolution::Approved);
        assert_eq!(outcome.total_approvers, 0);
    }

    #[test]
    fn required_rejection_is_an_absolute_veto() {
        let wf = workflow(Some(100), false);
        let requests = [
            request("r-0", "u-m", 0, false, RequestStatus::Approved),
            request("r-1", "u-a", 1, true, RequestStatus::Rejected),
            request("r-2", "u-b", 2, false, RequestStatus::Pending),
        ];

        let outcome = evaluate(Some(&wf), &requests);
        assert_eq!(outcome.resolution, ClaimResolution::Rejected);
    }

    #[test]
    fn threshold_counts_every_materialized_request() {
        let wf = workflow(Some(100), false);
        let partial = [
            request("r-0", "u-m", 0, false, RequestStatus::Approved),
            request("r-1", "u-a", 1, false, RequestStatus::Pending),
        ];
        let outcome = evaluate(Some(&wf), &partial);
        assert_eq!(outcome.resolution, ClaimResolution::Pending);
        assert!((outcome.approval_percentage - 50.0).abs() < f64::EPSILON);

        let complete = [
            request("r-0", "u-m", 0, false, RequestStatus::Approved),
            request("r-1", "u-a", 1, false, RequestStatus::Approved),
        ];
        let outcome = evaluate(Some(&wf), &complete);
        assert_eq!(outcome.resolution, ClaimResolution::Approved);
    }

    #[test]
    fn cancelled_requests_stay_in_the_denominator() {
        let wf = workflow(Some(60), false);
        let requests = [
            request("r-0", "u-m", 0, false, RequestStatus::Approved),
            request("r-1", "u-a", 1, false, RequestStatus::Cancelled),
            request("r-2", "u-b", 2, false, RequestStatus::Approved),
            request("r-3", "u-c", 3, false, RequestStatus::Pending),
        ];

        // 2 of 4 approved: 50%, below the 60% bar.
        let outcome = evaluate(Some(&wf), &requests);
        assert_eq!(outcome.resolution, ClaimResolution::Pending);
        assert_eq!(outcome.total_approvers, 4);
    }

    #[test]
    fn zero_threshold_needs_at_least_one_approval() {
        let wf = workflow(Some(0), false);
        let lone_rejection = [request("r-0", "u-a", 0, false, RequestStatus::Rejected)];

        let outcome = evaluate(Some(&wf), &lone_rejection);
        assert_eq!(outcome.resolution, ClaimResolution::Pending);

        let one_approval = [
            request("r-0", "u-a", 0, false, RequestStatus::Rejected),
            request("r-1", "u-b", 1, false, RequestStatus::Approved),
        ];
        let outcome = evaluate(Some(&wf), &one_approval);
        assert_eq!(outcome.resolution, ClaimResolution::Approved);
    }

    #[test]
    fn unset_threshold_waits_for_every_required_approver() {
        let wf = workflow(None, false);
        let requests = [
            request("r-0", "u-m", 0, true, RequestStatus::Approved),
            request("r-1", "u-a", 1, true, RequestStatus::Pending),
            request("r-2", "u-b", 2, false, RequestStatus::Rejected),
        ];
        let outcome = evaluate(Some(&wf), &requests);
        assert_eq!(outcome.resolution, ClaimResolution::Pending);

        let requests = [
            request("r-0", "u-m", 0, true, RequestStatus::Approved),
            request("r-1", "u-a", 1, true, RequestStatus::Approved),
            request("r-2", "u-b", 2, false, RequestStatus::Pending),
        ];
        let outcome = evaluate(Some(&wf), &requests);
        assert_eq!(outcome.resolution, ClaimResolution::Approved);
    }

    #[test]
    fn unset_threshold_without_required_slots_needs_everyone() {
        let wf = workflow(None, false);
        let requests = [
            request("r-0", "u-a", 0, false, RequestStatus::Approved),
            request("r-1", "u-b", 1, false, RequestStatus::Pending),
        ];
        let outcome = evaluate(Some(&wf), &requests);
        assert_eq!(outcome.resolution, ClaimResolution::Pending);

        let requests = [
            request("r-0", "u-a", 0, false, RequestStatus::Approved),
            request("r-1", "u-b", 1, false, RequestStatus::Approved),
        ];
        let outcome = evaluate(Some(&wf), &requests);
        assert_eq!(outcome.resolution, ClaimResolution::Approved);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let wf = workflow(Some(100), false);
        let requests = [
            request("r-0", "u-m", 0, false, RequestStatus::Approved),
            request("r-1", "u-a", 1, false, RequestStatus::Pending),
        ];

        let first = evaluate(Some(&wf), &requests);
        let second = evaluate(Some(&wf), &requests);
        assert_eq!(first, second);
    }

    #[test]
    fn sequential_outcome_names_the_next_approver() {
        let wf = workflow(Some(100), true);
        let requests = [
            request("r-0", "u-m", 0, false, RequestStatus::Approved),
            request("r-1", "u-a", 1, false, RequestStatus::Pending),
            request("r-2", "u-b", 2, false, RequestStatus::Pending),
        ];

        let outcome = evaluate(Some(&wf), &requests);
        assert_eq!(outcome.resolution, ClaimResolution::Pending);
        assert_eq!(outcome.next_approver, Some(UserId("u-a".to_string())));
    }

    #[test]
    fn sequential_turn_advances_past_a_non_required_rejection() {
        let wf = workflow(Some(100), true);
        let requests = [
            request("r-0", "u-m", 0, false, RequestStatus::Rejected),
            request("r-1", "u-a", 1, false, RequestStatus::Pending),
        ];

        let outcome = evaluate(Some(&wf), &requests);
        assert_eq!(outcome.next_approver, Some(UserId("u-a".to_string())));
    }
}
