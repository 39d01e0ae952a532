pub mod job;
pub mod resume;

use serde::{Deserialize, Serialize};

pub use job::JobRecord;
pub use resume::{EducationEntry, Entry, ExperienceEntry, ResumeRecord};

/// The two record families the index is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Resume,
    Job,
}

impl SourceKind {
    /// Payload field holding the record id; this is the aggregation group key.
    pub fn id_field(self) -> &'static str {
        match self {
            SourceKind::Resume => "resume_id",
            SourceKind::Job => "job_id",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Resume => "resume",
            SourceKind::Job => "job",
        }
    }
}

/// Identity of one system-of-record row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: i64,
    pub kind: SourceKind,
}

impl SourceRef {
    pub fn resume(id: i64) -> Self {
        Self {
            id,
            kind: SourceKind::Resume,
        }
    }

    pub fn job(id: i64) -> Self {
        Self {
            id,
            kind: SourceKind::Job,
        }
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

/// A record owned by the surrounding application. Read-only here.
#[derive(Debug, Clone)]
pub enum SourceRecord {
    Resume(ResumeRecord),
    Job(JobRecord),
}

impl SourceRecord {
    pub fn source(&self) -> SourceRef {
        match self {
            SourceRecord::Resume(r) => SourceRef::resume(r.id),
            SourceRecord::Job(j) => SourceRef::job(j.id),
        }
    }
}

/// Trims a string and maps blank to `None`.
pub fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
