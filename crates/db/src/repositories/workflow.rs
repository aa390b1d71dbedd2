use sqlx::Row;

use claimflow_core::domain::user::UserId;
use claimflow_core::domain::workflow::{ApproverRule, Workflow, WorkflowId};

use super::{decode, parse_timestamp, RepositoryError, WorkflowRepository};
use crate::DbPool;

pub struct SqlWorkflowRepository {
    pool: DbPool,
}

impl SqlWorkflowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_approvers(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<ApproverRule>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT approver_id, required, sequence
             FROM workflow_approver WHERE workflow_id = ? ORDER BY position ASC",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let approver_id: String = decode(row.try_get("approver_id"))?;
                let required: i64 = decode(row.try_get("required"))?;
                let sequence: i64 = decode(row.try_get("sequence"))?;
                Ok(ApproverRule {
                    approver_id: UserId(approver_id),
                    required: required != 0,
                    sequence,
                })
            })
            .collect()
    }

    async fn row_to_workflow(
        &self,
        row: &sqlx::sqlite::SqliteRow,
    ) -> Result<Workflow, RepositoryError> {
        let id: String = decode(row.try_get("id"))?;
        let employee_id: String = decode(row.try_get("employee_id"))?;
        let description: String = decode(row.try_get("description"))?;
        let manager_id: Option<String> = decode(row.try_get("manager_id"))?;
        let is_manager_approver: i64 = decode(row.try_get("is_manager_approver"))?;
        let sequential: i64 = decode(row.try_get("sequential"))?;
        let minimum: Option<i64> = decode(row.try_get("minimum_approval_percentage"))?;
        let is_active: i64 = decode(row.try_get("is_active"))?;
        let created_at: String = decode(row.try_get("created_at"))?;
        let updated_at: String = decode(row.try_get("updated_at"))?;

        let minimum_approval_percentage = match minimum {
            Some(value) => Some(u8::try_from(value).map_err(|_| {
                RepositoryError::Decode(format!("minimum_approval_percentage out of range: {value}"))
            })?),
            None => None,
        };

        let approvers = self.load_approvers(&id).await?;

        Ok(Workflow {
            id: WorkflowId(id),
            employee_id: UserId(employee_id),
            description,
            manager_id: manager_id.map(UserId),
            is_manager_approver: is_manager_approver != 0,
            approvers,
            sequential: sequential != 0,
            minimum_approval_percentage,
            is_active: is_active != 0,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

const WORKFLOW_COLUMNS: &str = "id, employee_id, description, manager_id, is_manager_approver, \
     sequential, minimum_approval_percentage, is_active, created_at, updated_at";

#[async_trait::async_trait]
impl WorkflowRepository for SqlWorkflowRepository {
    async fn find_by_id(&self, id: &WorkflowId) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {WORKFLOW_COLUMNS} FROM workflow WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(self.row_to_workflow(r).await?)),
            None => Ok(None),
        }
    }

    async fn find_for_employee(
        &self,
        employee_id: &UserId,
    ) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflow WHERE employee_id = ? AND is_active = 1"
        ))
        .bind(&employee_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(self.row_to_workflow(r).await?)),
            None => Ok(None),
        }
    }

    async fn save(&self, workflow: Workflow) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO workflow (id, employee_id, description, manager_id,
                                   is_manager_approver, sequential,
                                   minimum_approval_percentage, is_active,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 employee_id = excluded.employee_id,
                 description = excluded.description,
                 manager_id = excluded.manager_id,
                 is_manager_approver = excluded.is_manager_approver,
                 sequential = excluded.sequential,
                 minimum_approval_percentage = excluded.minimum_approval_percentage,
                 is_active = excluded.is_active,
                 updated_at = excluded.updated_at",
        )
        .bind(&workflow.id.0)
        .bind(&workflow.employee_id.0)
        .bind(&workflow.description)
        .bind(workflow.manager_id.as_ref().map(|id| id.0.clone()))
        .bind(i64::from(workflow.is_manager_approver))
        .bind(i64::from(workflow.sequential))
        .bind(workflow.minimum_approval_percentage.map(i64::from))
        .bind(i64::from(workflow.is_active))
        .bind(workflow.created_at.to_rfc3339())
        .bind(workflow.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // Approver slots are replaced wholesale with the workflow.
        sqlx::query("DELETE FROM workflow_approver WHERE workflow_id = ?")
            .bind(&workflow.id.0)
            .execute(&mut *tx)
            .await?;

        for (position, rule) in workflow.approvers.iter().enumerate() {
            sqlx::query(
                "INSERT INTO workflow_approver (workflow_id, position, approver_id,
                                                required, sequence)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&workflow.id.0)
            .bind(position as i64)
            .bind(&rule.approver_id.0)
            .bind(i64::from(rule.required))
            .bind(rule.sequence)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflow ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut workflows = Vec::with_capacity(rows.len());
        for row in &rows {
            workflows.push(self.row_to_workflow(row).await?);
        }
        Ok(workflows)
    }

    async fn delete(&self, id: &WorkflowId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflow WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use claimflow_core::domain::user::{User, UserId, UserRole};
    use claimflow_core::domain::workflow::{ApproverRule, Workflow, WorkflowId};

    use super::SqlWorkflowRepository;
    use crate::repositories::{SqlUserRepository, UserRepository, WorkflowRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_user(pool: &sqlx::SqlitePool, user_id: &str) {
        let repo = SqlUserRepository::new(pool.clone());
        let now = Utc::now();
        repo.save(User {
            id: UserId(user_id.to_string()),
            name: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            role: UserRole::Employee,
            manager_id: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("insert user");
    }

    fn sample_workflow(id: &str, employee: &str) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: WorkflowId(id.to_string()),
            employee_id: UserId(employee.to_string()),
            description: "Default expense chain".to_string(),
            manager_id: Some(UserId("u-mgr".to_string())),
            is_manager_approver: true,
            approvers: vec![
                ApproverRule {
                    approver_id: UserId("u-fin".to_string()),
                    required: true,
                    sequence: 1,
                },
                ApproverRule {
                    approver_id: UserId("u-fin".to_string()),
                    required: false,
                    sequence: 4,
                },
            ],
            sequential: false,
            minimum_approval_percentage: Some(60),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_approver_slots() {
        let pool = setup().await;
        insert_user(&pool, "u-emp").await;
        insert_user(&pool, "u-mgr").await;
        insert_user(&pool, "u-fin").await;

        let repo = SqlWorkflowRepository::new(pool);
        let workflow = sample_workflow("wf-1", "u-emp");
        repo.save(workflow.clone()).await.expect("save");

        let found = repo
            .find_by_id(&WorkflowId("wf-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.approvers, workflow.approvers);
        assert_eq!(found.minimum_approval_percentage, Some(60));
        assert!(found.is_manager_approver);
    }

    #[tokio::test]
    async fn find_for_employee_returns_the_active_workflow() {
        let pool = setup().await;
        insert_user(&pool, "u-emp").await;
        insert_user(&pool, "u-mgr").await;
        insert_user(&pool, "u-fin").await;

        let repo = SqlWorkflowRepository::new(pool);
        repo.save(sample_workflow("wf-1", "u-emp")).await.expect("save");

        let found = repo
            .find_for_employee(&UserId("u-emp".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.id.0, "wf-1");

        let missing =
            repo.find_for_employee(&UserId("u-nobody".to_string())).await.expect("find");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn save_replaces_approver_slots_on_update() {
        let pool = setup().await;
        insert_user(&pool, "u-emp").await;
        insert_user(&pool, "u-mgr").await;
        insert_user(&pool, "u-fin").await;

        let repo = SqlWorkflowRepository::new(pool);
        let mut workflow = sample_workflow("wf-1", "u-emp");
        repo.save(workflow.clone()).await.expect("save");

        workflow.approvers.truncate(1);
        workflow.sequential = true;
        repo.save(workflow).await.expect("update");

        let found = repo
            .find_by_id(&WorkflowId("wf-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.approvers.len(), 1);
        assert!(found.sequential);
    }

    #[tokio::test]
    async fn delete_removes_workflow_and_reports_it() {
        let pool = setup().await;
        insert_user(&pool, "u-emp").await;
        insert_user(&pool, "u-mgr").await;
        insert_user(&pool, "u-fin").await;

        let repo = SqlWorkflowRepository::new(pool);
        repo.save(sample_workflow("wf-1", "u-emp")).await.expect("save");

        assert!(repo.delete(&WorkflowId("wf-1".to_string())).await.expect("delete"));
        assert!(!repo.delete(&WorkflowId("wf-1".to_string())).await.expect("second delete"));
        assert!(repo
            .find_by_id(&WorkflowId("wf-1".to_string()))
            .await
            .expect("find")
            .is_none());
    }
}
