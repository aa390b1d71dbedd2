use sqlx::Row;

use claimflow_core::domain::user::{User, UserId, UserRole};

use super::{decode, parse_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_role(s: &str) -> Result<UserRole, RepositoryError> {
    match s {
        "employee" => Ok(UserRole::Employee),
        "manager" => Ok(UserRole::Manager),
        "admin" => Ok(UserRole::Admin),
        other => Err(RepositoryError::Decode(format!("unknown user role `{other}`"))),
    }
}

pub fn role_as_str(role: UserRole) -> &'static str {
    match role {
        UserRole::Employee => "employee",
        UserRole::Manager => "manager",
        UserRole::Admin => "admin",
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: String = decode(row.try_get("id"))?;
    let name: String = decode(row.try_get("name"))?;
    let email: String = decode(row.try_get("email"))?;
    let role: String = decode(row.try_get("role"))?;
    let manager_id: Option<String> = decode(row.try_get("manager_id"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    Ok(User {
        id: UserId(id),
        name,
        email,
        role: parse_role(&role)?,
        manager_id: manager_id.map(UserId),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, role, manager_id, created_at, updated_at
             FROM app_user WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO app_user (id, name, email, role, manager_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 role = excluded.role,
                 manager_id = excluded.manager_id,
                 updated_at = excluded.updated_at",
        )
        .bind(&user.id.0)
        .bind(&user.name)
        .bind(&user.email)
        .bind(role_as_str(user.role))
        .bind(user.manager_id.as_ref().map(|id| id.0.clone()))
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, name, email, role, manager_id, created_at, updated_at
             FROM app_user ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use claimflow_core::domain::user::{User, UserId, UserRole};

    use super::SqlUserRepository;
    use crate::repositories::UserRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_user(id: &str, role: UserRole, manager: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id: UserId(id.to_string()),
            name: format!("User {id}"),
            email: format!("{id}@example.com"),
            role,
            manager_id: manager.map(|m| UserId(m.to_string())),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_manager_link() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        repo.save(sample_user("u-mgr", UserRole::Manager, None)).await.expect("save manager");
        repo.save(sample_user("u-emp", UserRole::Employee, Some("u-mgr")))
            .await
            .expect("save employee");

        let found = repo
            .find_by_id(&UserId("u-emp".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.role, UserRole::Employee);
        assert_eq!(found.manager_id, Some(UserId("u-mgr".to_string())));
    }

    #[tokio::test]
    async fn list_all_orders_by_name() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        repo.save(sample_user("u-b", UserRole::Employee, None)).await.expect("save b");
        repo.save(sample_user("u-a", UserRole::Admin, None)).await.expect("save a");

        let users = repo.list_all().await.expect("list");
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id.0, "u-a");
    }
}
