use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

/// One configured approver slot. Duplicate approver ids are tolerated and
/// `sequence` values need not be contiguous or unique; dispatch order is
/// ascending `sequence`, stable on ties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverRule {
    pub approver_id: UserId,
    pub required: bool,
    pub sequence: i64,
}

/// The approval chain configured for one employee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub employee_id: UserId,
    pub description: String,
    pub manager_id: Option<UserId>,
    pub is_manager_approver: bool,
    pub approvers: Vec<ApproverRule>,
    pub sequential: bool,
    /// 0-100. `None` means the claim resolves on required approvers alone.
    pub minimum_approval_percentage: Option<u8>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Configured approvers in dispatch order.
    pub fn ordered_approvers(&self) -> Vec<&ApproverRule> {
        let mut rules: Vec<&ApproverRule> = self.approvers.iter().collect();
        rules.sort_by_key(|rule| rule.sequence);
        rules
    }

    /// The manager slot, when manager approval is switched on and a
    /// manager is actually assigned.
    pub fn manager_approver(&self) -> Option<&UserId> {
        if self.is_manager_approver {
            self.manager_id.as_ref()
        } else {
            None
        }
    }

    pub fn has_approvers(&self) -> bool {
        self.manager_approver().is_some() || !self.approvers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::user::UserId;

    use super::{ApproverRule, Workflow, WorkflowId};

    fn workflow(approvers: Vec<ApproverRule>) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: WorkflowId("wf-1".to_string()),
            employee_id: UserId("u-employee".to_string()),
            description: "Default chain".to_string(),
            manager_id: Some(UserId("u-manager".to_string())),
            is_manager_approver: true,
            approvers,
            sequential: false,
            minimum_approval_percentage: Some(60),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn rule(approver: &str, sequence: i64) -> ApproverRule {
        ApproverRule { approver_id: UserId(approver.to_string()), required: false, sequence }
    }

    #[test]
    fn ordered_approvers_sorts_by_sequence_stably() {
        let workflow =
            workflow(vec![rule("u-c", 7), rule("u-a", 2), rule("u-b", 2), rule("u-d", 10)]);

        let ordered: Vec<&str> = workflow
            .ordered_approvers()
            .iter()
            .map(|rule| rule.approver_id.0.as_str())
            .collect();

        assert_eq!(ordered, vec!["u-a", "u-b", "u-c", "u-d"]);
    }

    #[test]
    fn manager_slot_requires_both_flag_and_assignment() {
        let mut with_manager = workflow(Vec::new());
        assert_eq!(with_manager.manager_approver(), Some(&UserId("u-manager".to_string())));

        with_manager.is_manager_approver = false;
        assert_eq!(with_manager.manager_approver(), None);

        let mut unassigned = workflow(Vec::new());
        unassigned.manager_id = None;
        assert_eq!(unassigned.manager_approver(), None);
        assert!(!unassigned.has_approvers());
    }

    #[test]
    fn duplicate_approver_ids_are_kept() {
        let workflow = workflow(vec![rule("u-a", 0), rule("u-a", 1)]);
        assert_eq!(workflow.ordered_approvers().len(), 2);
    }
}
