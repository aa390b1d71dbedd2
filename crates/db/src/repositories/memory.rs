use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use claimflow_core::domain::claim::{Claim, ClaimId};
use claimflow_core::domain::request::{ApprovalRequest, ApprovalRequestId, RequestStatus};
use claimflow_core::domain::user::{User, UserId};
use claimflow_core::domain::workflow::{Workflow, WorkflowId};

use super::{
    ApprovalRequestRepository, ClaimRepository, RepositoryError, StatusSummary, UserRepository,
    WorkflowRepository,
};

#[derive(Default)]
pub struct InMemoryClaimRepository {
    claims: RwLock<HashMap<String, Claim>>,
}

#[async_trait::async_trait]
impl ClaimRepository for InMemoryClaimRepository {
    async fn find_by_id(&self, id: &ClaimId) -> Result<Option<Claim>, RepositoryError> {
        let claims = self.claims.read().await;
        Ok(claims.get(&id.0).cloned())
    }

    async fn save(&self, claim: Claim) -> Result<(), RepositoryError> {
        let mut claims = self.claims.write().await;
        claims.insert(claim.id.0.clone(), claim);
        Ok(())
    }

    async fn list_for_owner(&self, owner_id: &UserId) -> Result<Vec<Claim>, RepositoryError> {
        let claims = self.claims.read().await;
        let mut owned: Vec<Claim> =
            claims.values().filter(|c| &c.owner_id == owner_id).cloned().collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn status_summary(&self) -> Result<Vec<StatusSummary>, RepositoryError> {
        let claims = self.claims.read().await;
        let mut summaries: Vec<StatusSummary> = Vec::new();
        for claim in claims.values() {
            match summaries.iter_mut().find(|s| s.status == claim.status) {
                Some(summary) => {
                    summary.count += 1;
                    summary.converted_total += claim.converted_amount;
                }
                None => summaries.push(StatusSummary {
                    status: claim.status,
                    count: 1,
                    converted_total: claim.converted_amount,
                }),
            }
        }
        Ok(summaries)
    }
}

#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<HashMap<String, Workflow>>,
}

#[async_trait::async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<Workflow>, RepositoryError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(&id.0).cloned())
    }

    async fn find_for_employee(
        &self,
        employee_id: &UserId,
    ) -> Result<Option<Workflow>, RepositoryError> {
        let workflows = self.workflows.read().await;
        Ok(workflows
            .values()
            .find(|w| &w.employee_id == employee_id && w.is_active)
            .cloned())
    }

    async fn save(&self, workflow: Workflow) -> Result<(), RepositoryError> {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id.0.clone(), workflow);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let workflows = self.workflows.read().await;
        let mut all: Vec<Workflow> = workflows.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn delete(&self, id: &WorkflowId) -> Result<bool, RepositoryError> {
        let mut workflows = self.workflows.write().await;
        Ok(workflows.remove(&id.0).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryApprovalRequestRepository {
    requests: RwLock<HashMap<String, ApprovalRequest>>,
}

#[async_trait::async_trait]
impl ApprovalRequestRepository for InMemoryApprovalRequestRepository {
    async fn find_by_id(
        &self,
        id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(&self, request: ApprovalRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn insert_many(&self, batch: Vec<ApprovalRequest>) -> Result<usize, RepositoryError> {
        let mut requests = self.requests.write().await;
        let count = batch.len();
        for request in batch {
            requests.insert(request.id.0.clone(), request);
        }
        Ok(count)
    }

    async fn list_for_claim(
        &self,
        claim_id: &ClaimId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matching: Vec<ApprovalRequest> =
            requests.values().filter(|r| &r.claim_id == claim_id).cloned().collect();
        matching.sort_by_key(|r| r.sequence);
        Ok(matching)
    }

    async fn list_pending_for_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matching: Vec<ApprovalRequest> = requests
            .values()
            .filter(|r| {
                &r.approver_id == approver_id
                    && r.status == RequestStatus::Pending
                    && r.is_active
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    async fn cancel_pending_for_claim(
        &self,
        claim_id: &ClaimId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut requests = self.requests.write().await;
        let mut cancelled = 0;
        for request in requests.values_mut() {
            if &request.claim_id == claim_id && request.status == RequestStatus::Pending {
                request.status = RequestStatus::Cancelled;
                request.is_active = false;
                request.updated_at = now;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        users.insert(user.id.0.clone(), user);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use claimflow_core::domain::claim::{Claim, ClaimId, ClaimStatus};
    use claimflow_core::domain::request::{ApprovalRequest, ApprovalRequestId, RequestStatus};
    use claimflow_core::domain::user::UserId;
    use claimflow_core::domain::workflow::WorkflowId;

    use crate::repositories::{
        ApprovalRequestRepository, ClaimRepository, InMemoryApprovalRequestRepository,
        InMemoryClaimRepository,
    };

    fn claim(id: &str) -> Claim {
        let now = Utc::now();
        Claim {
            id: ClaimId(id.to_string()),
            owner_id: UserId("u-emp".to_string()),
            category: "meals".to_string(),
            description: "Team lunch".to_string(),
            amount: Decimal::new(4_200, 2),
            currency: "USD".to_string(),
            converted_amount: Decimal::new(4_200, 2),
            expense_date: NaiveDate::from_ymd_opt(2026, 4, 9).expect("valid date"),
            status: ClaimStatus::Submitted,
            comment: None,
            approved_by: None,
            rejected_by: None,
            submitted_at: Some(now),
            approved_at: None,
            rejected_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn request(id: &str, sequence: i64, status: RequestStatus) -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: ApprovalRequestId(id.to_string()),
            claim_id: ClaimId("CLM-1".to_string()),
            approver_id: UserId("u-mgr".to_string()),
            workflow_id: WorkflowId("wf-1".to_string()),
            sequence,
            is_required: false,
            is_active: true,
            status,
            comment: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn claim_repo_round_trip() {
        let repo = InMemoryClaimRepository::default();
        repo.save(claim("CLM-1")).await.expect("save");

        let found = repo.find_by_id(&ClaimId("CLM-1".to_string())).await.expect("find");
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn request_repo_cancels_only_pending() {
        let repo = InMemoryApprovalRequestRepository::default();
        repo.insert_many(vec![
            request("apr-0", 0, RequestStatus::Approved),
            request("apr-1", 1, RequestStatus::Pending),
        ])
        .await
        .expect("insert");

        let cancelled = repo
            .cancel_pending_for_claim(&ClaimId("CLM-1".to_string()), Utc::now())
            .await
            .expect("cancel");
        assert_eq!(cancelled, 1);

        let all = repo.list_for_claim(&ClaimId("CLM-1".to_string())).await.expect("list");
        assert_eq!(all[0].status, RequestStatus::Approved);
        assert_eq!(all[1].status, RequestStatus::Cancelled);
    }
}
