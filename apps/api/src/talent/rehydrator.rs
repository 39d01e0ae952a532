//! Verified Data Rehydrator: rebuilds every candidate from the system of record.
//!
//! Nothing from the vector payload reaches the caller: names, contact details,
//! skills and history are re-read and cleaned here.

use std::sync::Arc;

use chrono::NaiveDateTime;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::{clean_text, EducationEntry, Entry, ExperienceEntry, ResumeRecord};
use crate::records::RecordStore;
use crate::talent::requirements::RequirementSet;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DataCompleteness {
    pub has_contact: bool,
    pub has_skills: bool,
    pub has_experience: bool,
    pub has_education: bool,
    pub skills_count: usize,
    pub experience_count: usize,
    pub education_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifiedCandidate {
    pub source_id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub filename: Option<String>,
    pub uploaded_at: Option<NaiveDateTime>,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub raw_text_length: usize,
    pub data_completeness: DataCompleteness,
}

impl VerifiedCandidate {
    pub fn from_record(record: &ResumeRecord) -> Self {
        let skills = record.skill_list();
        let experience = structured(record.experience_entries(), ExperienceEntry::is_empty);
        let education = structured(record.education_entries(), EducationEntry::is_empty);
        let email = clean_text(record.email.as_deref());
        let phone = clean_text(record.phone.as_deref());

        let data_completeness = DataCompleteness {
            has_contact: email.is_some() || phone.is_some(),
            has_skills: !skills.is_empty(),
            has_experience: !experience.is_empty(),
            has_education: !education.is_empty(),
            skills_count: skills.len(),
            experience_count: experience.len(),
            education_count: education.len(),
        };

        Self {
            source_id: record.id,
            name: clean_text(record.name.as_deref()),
            email,
            phone,
            filename: clean_text(Some(&record.filename)),
            uploaded_at: record.created_at,
            skills,
            experience,
            education,
            raw_text_length: record.raw_text.as_deref().map_or(0, |t| t.chars().count()),
            data_completeness,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Candidate skills containing any required skill term.
    pub fn matching_skills(&self, requirements: &RequirementSet) -> Vec<&str> {
        let required = requirements.required_skill_terms();
        self.skills
            .iter()
            .filter(|skill| {
                let lower = skill.to_lowercase();
                required.iter().any(|r| lower.contains(r.as_str()))
            })
            .map(String::as_str)
            .collect()
    }

    fn experience_mentions(&self, requirements: &RequirementSet) -> bool {
        let required = requirements.required_skill_terms();
        self.experience.iter().any(|e| {
            let text = format!(
                "{} {}",
                e.title.as_deref().unwrap_or_default(),
                e.description.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            required.iter().any(|r| text.contains(r.as_str()))
        })
    }
}

/// Keeps object entries with at least one populated field. Free-form entries are
/// indexed for search but never returned as verified data.
fn structured<T>(entries: Vec<Entry<T>>, is_empty: fn(&T) -> bool) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Entry::Structured(item) if !is_empty(&item) => Some(item),
            _ => None,
        })
        .collect()
}

pub struct Rehydrator {
    records: Arc<dyn RecordStore>,
}

/// Verified candidates plus what went wrong reaching the system of record.
#[derive(Debug, Default)]
pub struct Rehydration {
    pub verified: Vec<VerifiedCandidate>,
    pub attempted: usize,
    pub failed_lookups: usize,
    pub first_error: Option<sqlx::Error>,
}

impl Rehydration {
    /// Every lookup errored, so an empty result says nothing about the data.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed_lookups == self.attempted
    }
}

impl Rehydrator {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Re-reads every id from the system of record, in input order. Missing rows
    /// and failed lookups are dropped with a log line, never fabricated.
    pub async fn rehydrate(&self, source_ids: &[i64]) -> Rehydration {
        let lookups = source_ids
            .iter()
            .map(|&id| async move { (id, self.records.resume(id).await) });

        let mut outcome = Rehydration {
            verified: Vec::with_capacity(source_ids.len()),
            attempted: source_ids.len(),
            ..Rehydration::default()
        };
        for (id, result) in join_all(lookups).await {
            match result {
                Ok(Some(record)) => outcome.verified.push(VerifiedCandidate::from_record(&record)),
                Ok(None) => info!(source_id = id, "dropping candidate: resume no longer exists"),
                Err(e) => {
                    warn!(source_id = id, error = %e, "dropping candidate: lookup failed");
                    outcome.failed_lookups += 1;
                    outcome.first_error.get_or_insert(e);
                }
            }
        }
        outcome
    }
}

/// Eligibility for the final result: a name, a contact method, some populated
/// profile data and, when skills were required, at least one of them in the
/// candidate's skills or experience.
pub fn passes_quality_gate(candidate: &VerifiedCandidate, requirements: &RequirementSet) -> bool {
    if candidate.name.is_none() {
        return false;
    }
    let completeness = &candidate.data_completeness;
    if !completeness.has_contact {
        return false;
    }
    if !(completeness.has_skills || completeness.has_experience || completeness.has_education) {
        return false;
    }
    if requirements.required_skill_terms().is_empty() {
        return true;
    }
    !candidate.matching_skills(requirements).is_empty() || candidate.experience_mentions(requirements)
}
