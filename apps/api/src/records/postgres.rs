use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{JobRecord, ResumeRecord};
use crate::records::{RecordCounts, RecordStore};

// Ids are INTEGER in the application schema; widened here so every row maps onto i64.
const RESUME_COLUMNS: &str = "id::BIGINT AS id, user_id::BIGINT AS user_id, filename, name, \
    email, phone, skills::JSONB AS skills, experience::JSONB AS experience, \
    education::JSONB AS education, raw_text, created_at";

const JOB_COLUMNS: &str = "id::BIGINT AS id, title, company, description, \
    requirements::JSONB AS requirements, location, salary_min, salary_max, employment_type, \
    category, is_active";

/// Reads resumes and jobs from the application's PostgreSQL database.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn resume(&self, id: i64) -> Result<Option<ResumeRecord>, sqlx::Error> {
        sqlx::query_as::<_, ResumeRecord>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resume WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn job(&self, id: i64) -> Result<Option<JobRecord>, sqlx::Error> {
        sqlx::query_as::<_, JobRecord>(&format!("SELECT {JOB_COLUMNS} FROM job WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn resumes(&self) -> Result<Vec<ResumeRecord>, sqlx::Error> {
        sqlx::query_as::<_, ResumeRecord>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resume ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn jobs(&self) -> Result<Vec<JobRecord>, sqlx::Error> {
        sqlx::query_as::<_, JobRecord>(&format!("SELECT {JOB_COLUMNS} FROM job ORDER BY id"))
            .fetch_all(&self.pool)
            .await
    }

    async fn counts(&self) -> Result<RecordCounts, sqlx::Error> {
        let (resumes, jobs): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM resume), (SELECT COUNT(*) FROM job)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(RecordCounts { resumes, jobs })
    }
}
