//! System-of-record access. Resumes and jobs are owned by the surrounding
//! application; this service only reads them.

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{JobRecord, ResumeRecord, SourceRecord, SourceRef};

pub mod postgres;

pub use postgres::PgRecordStore;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RecordCounts {
    pub resumes: i64,
    pub jobs: i64,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn resume(&self, id: i64) -> Result<Option<ResumeRecord>, sqlx::Error>;

    async fn job(&self, id: i64) -> Result<Option<JobRecord>, sqlx::Error>;

    async fn resumes(&self) -> Result<Vec<ResumeRecord>, sqlx::Error>;

    async fn jobs(&self) -> Result<Vec<JobRecord>, sqlx::Error>;

    async fn counts(&self) -> Result<RecordCounts, sqlx::Error>;
}

/// Loads the record behind `source`, whichever kind it is.
pub async fn fetch_record(
    store: &dyn RecordStore,
    source: SourceRef,
) -> Result<Option<SourceRecord>, sqlx::Error> {
    use crate::models::SourceKind;

    Ok(match source.kind {
        SourceKind::Resume => store.resume(source.id).await?.map(SourceRecord::Resume),
        SourceKind::Job => store.job(source.id).await?.map(SourceRecord::Job),
    })
}
