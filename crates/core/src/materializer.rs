use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::domain::workflow::Workflow;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    Parallel,
    Sequential,
}

/// One approval request to be created, before it gets an identity or a
/// claim attached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBlueprint {
    pub approver_id: UserId,
    pub sequence: i64,
    pub is_required: bool,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaterializationPlan {
    /// No workflow, or a workflow with nobody to ask: the claim resolves
    /// approved on the spot with the owner recorded as approver.
    AutoApprove,
    Dispatch { blueprints: Vec<RequestBlueprint>, mode: DispatchMode },
}

/// Turn an employee's workflow into the set of approval requests for one
/// claim. The manager slot, when configured, is forced to sequence 0 and
/// is always required; configured approvers follow in ascending rule
/// sequence, renumbered 0..N-1. In sequential mode only the first slot
/// starts active.
pub fn plan(workflow: Option<&Workflow>) -> MaterializationPlan {
    let Some(workflow) = workflow else {
        return MaterializationPlan::AutoApprove;
    };
    if !workflow.has_approvers() {
        return MaterializationPlan::AutoApprove;
    }

    let mode = if workflow.sequential { DispatchMode::Sequential } else { DispatchMode::Parallel };

    let mut blueprints = Vec::new();
    if let Some(manager_id) = workflow.manager_approver() {
        blueprints.push(RequestBlueprint {
            approver_id: manager_id.clone(),
            sequence: 0,
            is_required: true,
            is_active: true,
        });
    }

    let offset = blueprints.len() as i64;
    for (index, rule) in workflow.ordered_approvers().into_iter().enumerate() {
        blueprints.push(RequestBlueprint {
            approver_id: rule.approver_id.clone(),
            sequence: offset + index as i64,
            is_required: rule.required,
            is_active: mode == DispatchMode::Parallel,
        });
    }

    if mode == DispatchMode::Sequential {
        for blueprint in &mut blueprints {
            blueprint.is_active = blueprint.sequence == 0;
        }
    }

    MaterializationPlan::Dispatch { blueprints, mode }
}
