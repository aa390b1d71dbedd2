use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Canonical demo seeds and verification contract for the two workflow
/// shapes the dataset exercises.
const SEED_WORKFLOWS: &[SeedWorkflowContract] = &[
    SeedWorkflowContract {
        workflow_id: "wf-demo-percent",
        employee_id: "user-demo-emp",
        sequential: false,
        expected_approver_slots: 2,
        description: "Manager plus finance, 60% threshold",
    },
    SeedWorkflowContract {
        workflow_id: "wf-demo-sequential",
        employee_id: "user-demo-emp2",
        sequential: true,
        expected_approver_slots: 2,
        description: "Chain through finance then CFO",
    },
];

const SEED_USER_IDS: &[&str] = &[
    "user-demo-admin",
    "user-demo-manager",
    "user-demo-finance",
    "user-demo-cfo",
    "user-demo-emp",
    "user-demo-emp2",
];

const SEED_CLAIM_ID: &str = "claim-demo-001";
const SEED_CLAIM_REQUEST_COUNT: i64 = 3;

struct SeedWorkflowContract {
    workflow_id: &'static str,
    employee_id: &'static str,
    sequential: bool,
    expected_approver_slots: i64,
    description: &'static str,
}

#[derive(Clone, Debug)]
pub struct WorkflowSeedInfo {
    pub workflow_id: &'static str,
    pub employee_id: &'static str,
    pub description: &'static str,
}

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub workflows_seeded: Vec<WorkflowSeedInfo>,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

/// Demo seed dataset: users, a parallel percentage workflow, a sequential
/// workflow, and one submitted claim with materialized requests.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let workflows_seeded = SEED_WORKFLOWS
            .iter()
            .map(|w| WorkflowSeedInfo {
                workflow_id: w.workflow_id,
                employee_id: w.employee_id,
                description: w.description,
            })
            .collect();

        Ok(SeedResult { workflows_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let user_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM app_user WHERE id IN {}",
            sql_array_from_ids(SEED_USER_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("seed-users", user_count == SEED_USER_IDS.len() as i64));

        for workflow in SEED_WORKFLOWS {
            let workflow_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM workflow
                 WHERE id = ?1 AND employee_id = ?2 AND sequential = ?3 AND is_active = 1)",
            )
            .bind(workflow.workflow_id)
            .bind(workflow.employee_id)
            .bind(i64::from(workflow.sequential))
            .fetch_one(pool)
            .await?;
            checks.push((workflow.workflow_id, workflow_ok == 1));

            let slot_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM workflow_approver WHERE workflow_id = ?1",
            )
            .bind(workflow.workflow_id)
            .fetch_one(pool)
            .await?;
            checks.push((workflow.description, slot_count == workflow.expected_approver_slots));
        }

        let claim_ok: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM claim WHERE id = ?1 AND status = 'submitted')",
        )
        .bind(SEED_CLAIM_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("seed-claim-submitted", claim_ok == 1));

        let request_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM approval_request WHERE claim_id = ?1 AND status = 'pending'",
        )
        .bind(SEED_CLAIM_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("seed-claim-requests", request_count == SEED_CLAIM_REQUEST_COUNT));

        let manager_first: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM approval_request
             WHERE claim_id = ?1 AND sequence = 0 AND approver_id = 'user-demo-manager')",
        )
        .bind(SEED_CLAIM_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("seed-claim-manager-first", manager_first == 1));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("'{id}'")).collect();
    format!("({})", quoted.join(", "))
}
