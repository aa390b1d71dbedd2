use chrono::{DateTime, Utc};
use sqlx::Row;

use claimflow_core::domain::claim::ClaimId;
use claimflow_core::domain::request::{ApprovalRequest, ApprovalRequestId, RequestStatus};
use claimflow_core::domain::user::UserId;
use claimflow_core::domain::workflow::WorkflowId;

use super::{
    decode, parse_timestamp, parse_timestamp_opt, ApprovalRequestRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlApprovalRequestRepository {
    pool: DbPool,
}

impl SqlApprovalRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> Result<RequestStatus, RepositoryError> {
    match s {
        "pending" => Ok(RequestStatus::Pending),
        "approved" => Ok(RequestStatus::Approved),
        "rejected" => Ok(RequestStatus::Rejected),
        "cancelled" => Ok(RequestStatus::Cancelled),
        other => Err(RepositoryError::Decode(format!("unknown request status `{other}`"))),
    }
}

pub fn request_status_as_str(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "pending",
        RequestStatus::Approved => "approved",
        RequestStatus::Rejected => "rejected",
        RequestStatus::Cancelled => "cancelled",
    }
}

const REQUEST_COLUMNS: &str = "id, claim_id, approver_id, workflow_id, sequence, is_required, \
     is_active, status, comment, decided_at, created_at, updated_at";

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalRequest, RepositoryError> {
    let id: String = decode(row.try_get("id"))?;
    let claim_id: String = decode(row.try_get("claim_id"))?;
    let approver_id: String = decode(row.try_get("approver_id"))?;
    let workflow_id: String = decode(row.try_get("workflow_id"))?;
    let sequence: i64 = decode(row.try_get("sequence"))?;
    let is_required: i64 = decode(row.try_get("is_required"))?;
    let is_active: i64 = decode(row.try_get("is_active"))?;
    let status: String = decode(row.try_get("status"))?;
    let comment: Option<String> = decode(row.try_get("comment"))?;
    let decided_at: Option<String> = decode(row.try_get("decided_at"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    Ok(ApprovalRequest {
        id: ApprovalRequestId(id),
        claim_id: ClaimId(claim_id),
        approver_id: UserId(approver_id),
        workflow_id: WorkflowId(workflow_id),
        sequence,
        is_required: is_required != 0,
        is_active: is_active != 0,
        status: parse_status(&status)?,
        comment,
        decided_at: parse_timestamp_opt(decided_at)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn bind_insert<'q>(
    query: &'static str,
    request: &'q ApprovalRequest,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    sqlx::query(query)
        .bind(&request.id.0)
        .bind(&request.claim_id.0)
        .bind(&request.approver_id.0)
        .bind(&request.workflow_id.0)
        .bind(request.sequence)
        .bind(i64::from(request.is_required))
        .bind(i64::from(request.is_active))
        .bind(request_status_as_str(request.status))
        .bind(&request.comment)
        .bind(request.decided_at.map(|dt| dt.to_rfc3339()))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
}

const UPSERT_SQL: &str = "INSERT INTO approval_request (id, claim_id, approver_id, workflow_id,
                              sequence, is_required, is_active, status, comment,
                              decided_at, created_at, updated_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(id) DO UPDATE SET
         is_active = excluded.is_active,
         status = excluded.status,
         comment = excluded.comment,
         decided_at = excluded.decided_at,
         updated_at = excluded.updated_at";

#[async_trait::async_trait]
impl ApprovalRequestRepository for SqlApprovalRequestRepository {
    async fn find_by_id(
        &self,
        id: &ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM approval_request WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, request: ApprovalRequest) -> Result<(), RepositoryError> {
        bind_insert(UPSERT_SQL, &request).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_many(&self, requests: Vec<ApprovalRequest>) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let count = requests.len();

        for request in &requests {
            bind_insert(UPSERT_SQL, request).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(count)
    }

    async fn list_for_claim(
        &self,
        claim_id: &ClaimId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM approval_request
             WHERE claim_id = ? ORDER BY sequence ASC"
        ))
        .bind(&claim_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }

    async fn list_pending_for_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM approval_request
             WHERE approver_id = ? AND status = 'pending' AND is_active = 1
             ORDER BY created_at ASC"
        ))
        .bind(&approver_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }

    async fn cancel_pending_for_claim(
        &self,
        claim_id: &ClaimId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE approval_request
             SET status = 'cancelled', is_active = 0, updated_at = ?
             WHERE claim_id = ? AND status = 'pending'",
        )
        .bind(now.to_rfc3339())
        .bind(&claim_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
