//! Deterministic fakes and record fixtures shared by the talent tests.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::llm_client::{CompletionClient, LlmError};
use crate::models::{JobRecord, ResumeRecord};
use crate::records::{RecordCounts, RecordStore};

const TEST_DIMENSIONS: usize = 256;

/// Bag-of-words embedding: each lowercased token is hashed into a bucket and the
/// counts are L2-normalised. Texts sharing words get positive cosine similarity.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
    fail_on: Option<String>,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: TEST_DIMENSIONS,
            fail_on: None,
        }
    }
}

impl HashEmbedder {
    /// Fails for any text containing `needle`.
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::default()
        }
    }

    fn bucket(&self, token: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        if let Some(needle) = &self.fail_on {
            if text.contains(needle.as_str()) {
                return Err(EmbeddingError::Api {
                    status: 503,
                    message: format!("refusing to embed text containing {needle:?}"),
                });
            }
        }

        let mut vector = vec![0.0_f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
            .filter(|t| !t.is_empty())
        {
            vector[self.bucket(&token.to_lowercase())] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[derive(Debug, Clone)]
pub struct FailingEmbedder {
    dimensions: usize,
}

impl Default for FailingEmbedder {
    fn default() -> Self {
        Self {
            dimensions: TEST_DIMENSIONS,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Api {
            status: 503,
            message: "embedding service unavailable".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Completion client with a fixed reply (or a fixed failure) that records every
/// prompt it receives.
pub struct ScriptedLlm {
    reply: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers only after `delay`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.prompts.lock().await.push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().ok_or(LlmError::Api {
            status: 529,
            message: "overloaded".to_string(),
        })
    }
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    resumes: RwLock<BTreeMap<i64, ResumeRecord>>,
    jobs: RwLock<BTreeMap<i64, JobRecord>>,
}

impl InMemoryRecordStore {
    pub fn with_resume(mut self, record: ResumeRecord) -> Self {
        self.resumes.get_mut().insert(record.id, record);
        self
    }

    pub fn with_job(mut self, record: JobRecord) -> Self {
        self.jobs.get_mut().insert(record.id, record);
        self
    }

    pub async fn delete_resume(&self, id: i64) {
        self.resumes.write().await.remove(&id);
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn resume(&self, id: i64) -> Result<Option<ResumeRecord>, sqlx::Error> {
        Ok(self.resumes.read().await.get(&id).cloned())
    }

    async fn job(&self, id: i64) -> Result<Option<JobRecord>, sqlx::Error> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn resumes(&self) -> Result<Vec<ResumeRecord>, sqlx::Error> {
        Ok(self.resumes.read().await.values().cloned().collect())
    }

    async fn jobs(&self) -> Result<Vec<JobRecord>, sqlx::Error> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn counts(&self) -> Result<RecordCounts, sqlx::Error> {
        Ok(RecordCounts {
            resumes: self.resumes.read().await.len() as i64,
            jobs: self.jobs.read().await.len() as i64,
        })
    }
}

/// Record store whose every query times out waiting for a pool connection.
pub struct UnreachableRecordStore;

#[async_trait]
impl RecordStore for UnreachableRecordStore {
    async fn resume(&self, _id: i64) -> Result<Option<ResumeRecord>, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn job(&self, _id: i64) -> Result<Option<JobRecord>, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn resumes(&self) -> Result<Vec<ResumeRecord>, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn jobs(&self) -> Result<Vec<JobRecord>, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn counts(&self) -> Result<RecordCounts, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }
}

/// A resume with contact details and a short raw text naming the person and
/// their skills.
pub fn resume_record(
    id: i64,
    name: &str,
    skills: &[&str],
    experience: Value,
    education: Value,
) -> ResumeRecord {
    ResumeRecord {
        id,
        user_id: 1,
        filename: format!("cv-{id}.pdf"),
        name: Some(name.to_string()),
        email: Some(format!("candidate{id}@example.com")),
        phone: Some(format!("+44 7700 900{id:03}")),
        skills: Some(json!(skills)),
        experience: Some(experience),
        education: Some(education),
        raw_text: Some(format!("{name} resume. {}", skills.join(", "))),
        created_at: None,
    }
}

pub fn job_record(id: i64, title: &str, requirements: &[&str]) -> JobRecord {
    JobRecord {
        id,
        title: title.to_string(),
        company: "Acme".to_string(),
        description: format!("Join Acme as a {title}."),
        requirements: Some(json!(requirements)),
        location: Some("Remote".to_string()),
        salary_min: Some(50_000),
        salary_max: Some(80_000),
        employment_type: Some("Full-time".to_string()),
        category: Some("Engineering".to_string()),
        is_active: Some(true),
    }
}
