use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{CredentialStore, ReportStore};
use crate::error::{AppError, Result};
use crate::models::{NewReport, NewUser, Report, ReportRow, User, UserRow};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!("Connected to database.");

        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let id = Uuid::new_v4();
        let inserted = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, username, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => User::try_from(row),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::Conflict("Username already exists".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn insert_report(&self, report: NewReport) -> Result<Report> {
        let id = Uuid::new_v4();
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO reports
                (id, image_keys, latitude, longitude, description, category, violations, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(&report.image_keys)
        .bind(report.latitude)
        .bind(report.longitude)
        .bind(&report.description)
        .bind(&report.category)
        .bind(sqlx::types::Json(&report.violations))
        .bind(report.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(report.into_report(id, created_at))
    }

    async fn find_page(&self, skip: u64, limit: u64) -> Result<(Vec<Report>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ReportRow>(
            "SELECT * FROM reports ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2",
        )
        .bind(to_i64(skip))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Report::from).collect(), total.max(0) as u64))
    }

    async fn find_report(&self, id: Uuid) -> Result<Option<Report>> {
        let row = sqlx::query_as::<_, ReportRow>("SELECT * FROM reports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Report::from))
    }

    async fn delete_report(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
