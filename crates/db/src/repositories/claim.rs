use chrono::NaiveDate;
use sqlx::Row;

use claimflow_core::domain::claim::{Claim, ClaimId, ClaimStatus};
use claimflow_core::domain::user::UserId;

use super::{
    decode, parse_decimal, parse_timestamp, parse_timestamp_opt, ClaimRepository, RepositoryError,
    StatusSummary,
};
use crate::DbPool;

pub struct SqlClaimRepository {
    pool: DbPool,
}

impl SqlClaimRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> Result<ClaimStatus, RepositoryError> {
    match s {
        "pending" => Ok(ClaimStatus::Pending),
        "submitted" => Ok(ClaimStatus::Submitted),
        "approved" => Ok(ClaimStatus::Approved),
        "rejected" => Ok(ClaimStatus::Rejected),
        other => Err(RepositoryError::Decode(format!("unknown claim status `{other}`"))),
    }
}

pub fn claim_status_as_str(status: ClaimStatus) -> &'static str {
    match status {
        ClaimStatus::Pending => "pending",
        ClaimStatus::Submitted => "submitted",
        ClaimStatus::Approved => "approved",
        ClaimStatus::Rejected => "rejected",
    }
}

const CLAIM_COLUMNS: &str = "id, owner_id, category, description, amount, currency, \
     converted_amount, expense_date, status, comment, approved_by, rejected_by, \
     submitted_at, approved_at, rejected_at, created_at, updated_at";

fn row_to_claim(row: &sqlx::sqlite::SqliteRow) -> Result<Claim, RepositoryError> {
    let id: String = decode(row.try_get("id"))?;
    let owner_id: String = decode(row.try_get("owner_id"))?;
    let category: String = decode(row.try_get("category"))?;
    let description: String = decode(row.try_get("description"))?;
    let amount: String = decode(row.try_get("amount"))?;
    let currency: String = decode(row.try_get("currency"))?;
    let converted_amount: String = decode(row.try_get("converted_amount"))?;
    let expense_date: String = decode(row.try_get("expense_date"))?;
    let status: String = decode(row.try_get("status"))?;
    let comment: Option<String> = decode(row.try_get("comment"))?;
    let approved_by: Option<String> = decode(row.try_get("approved_by"))?;
    let rejected_by: Option<String> = decode(row.try_get("rejected_by"))?;
    let submitted_at: Option<String> = decode(row.try_get("submitted_at"))?;
    let approved_at: Option<String> = decode(row.try_get("approved_at"))?;
    let rejected_at: Option<String> = decode(row.try_get("rejected_at"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    Ok(Claim {
        id: ClaimId(id),
        owner_id: UserId(owner_id),
        category,
        description,
        amount: parse_decimal(&amount)?,
        currency,
        converted_amount: parse_decimal(&converted_amount)?,
        expense_date: expense_date
            .parse::<NaiveDate>()
            .map_err(|e| RepositoryError::Decode(format!("bad expense_date: {e}")))?,
        status: parse_status(&status)?,
        comment,
        approved_by: approved_by.map(UserId),
        rejected_by: rejected_by.map(UserId),
        submitted_at: parse_timestamp_opt(submitted_at)?,
        approved_at: parse_timestamp_opt(approved_at)?,
        rejected_at: parse_timestamp_opt(rejected_at)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl ClaimRepository for SqlClaimRepository {
    async fn find_by_id(&self, id: &ClaimId) -> Result<Option<Claim>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CLAIM_COLUMNS} FROM claim WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_claim(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, claim: Claim) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO claim (id, owner_id, category, description, amount, currency,
                                converted_amount, expense_date, status, comment,
                                approved_by, rejected_by, submitted_at, approved_at,
                                rejected_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 category = excluded.category,
                 description = excluded.description,
                 amount = excluded.amount,
                 currency = excluded.currency,
                 converted_amount = excluded.converted_amount,
                 expense_date = excluded.expense_date,
                 status = excluded.status,
                 comment = excluded.comment,
                 approved_by = excluded.approved_by,
                 rejected_by = excluded.rejected_by,
                 submitted_at = excluded.submitted_at,
                 approved_at = excluded.approved_at,
                 rejected_at = excluded.rejected_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&claim.id.0)
        .bind(&claim.owner_id.0)
        .bind(&claim.category)
        .bind(&claim.description)
        .bind(claim.amount.to_string())
        .bind(&claim.currency)
        .bind(claim.converted_amount.to_string())
        .bind(claim.expense_date.to_string())
        .bind(claim_status_as_str(claim.status))
        .bind(&claim.comment)
        .bind(claim.approved_by.as_ref().map(|id| id.0.clone()))
        .bind(claim.rejected_by.as_ref().map(|id| id.0.clone()))
        .bind(claim.submitted_at.map(|dt| dt.to_rfc3339()))
        .bind(claim.approved_at.map(|dt| dt.to_rfc3339()))
        .bind(claim.rejected_at.map(|dt| dt.to_rfc3339()))
        .bind(claim.created_at.to_rfc3339())
        .bind(claim.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_owner(&self, owner_id: &UserId) -> Result<Vec<Claim>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim WHERE owner_id = ? ORDER BY created_at DESC"
        ))
        .bind(&owner_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_claim).collect::<Result<Vec<_>, _>>()
    }

    async fn status_summary(&self) -> Result<Vec<StatusSummary>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT status, converted_amount FROM claim",
        )
        .fetch_all(&self.pool)
        .await?;

        // Amounts are canonical decimal strings, so the rollup happens
        // here rather than with SUM() over text.
        let mut summaries: Vec<StatusSummary> = Vec::new();
        for row in &rows {
            let status: String = decode(row.try_get("status"))?;
            let status = parse_status(&status)?;
            let amount = parse_decimal(&decode::<String>(row.try_get("converted_amount"))?)?;

            match summaries.iter_mut().find(|s| s.status == status) {
                Some(summary) => {
                    summary.count += 1;
                    summary.converted_total += amount;
                }
                None => summaries.push(StatusSummary {
                    status,
                    count: 1,
                    converted_total: amount,
                }),
            }
        }

        summaries.sort_by_key(|s| claim_status_as_str(s.status));
        Ok(summaries)
    }
}
