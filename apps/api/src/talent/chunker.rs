//! Document Chunker: splits a resume or job into semantically distinct chunks.
//!
//! Resume: full text, skills, one chunk per experience entry, one per education entry.
//! Job: full posting, requirements.
//!
//! Every chunk carries a `ChunkDetail` variant; the variant alone decides the
//! chunk type and the destination collection.

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::{
    clean_text, EducationEntry, Entry, ExperienceEntry, JobRecord, ResumeRecord, SourceRecord,
    SourceRef,
};
use crate::vector::{Collection, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    FullRecord,
    Skills,
    ExperienceItem,
    EducationItem,
    Requirements,
}

impl ChunkType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkType::FullRecord => "full_record",
            ChunkType::Skills => "skills",
            ChunkType::ExperienceItem => "experience_item",
            ChunkType::EducationItem => "education_item",
            ChunkType::Requirements => "requirements",
        }
    }
}

/// Per-variant metadata. Serialized flat into the point payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChunkDetail {
    ResumeText {
        name: String,
        email: String,
        phone: String,
        filename: String,
    },
    Skills {
        name: String,
        skills: Vec<String>,
        skills_count: usize,
    },
    Experience {
        name: String,
        experience_index: usize,
        job_title: String,
        company: String,
        duration: String,
    },
    Education {
        name: String,
        education_index: usize,
        degree: String,
        institution: String,
        year: String,
    },
    JobPosting {
        title: String,
        company: String,
        location: String,
        category: String,
        employment_type: String,
        salary_min: Option<i32>,
        salary_max: Option<i32>,
        is_active: bool,
    },
    JobRequirements {
        title: String,
        company: String,
        requirements: Vec<String>,
    },
}

impl ChunkDetail {
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            ChunkDetail::ResumeText { .. } | ChunkDetail::JobPosting { .. } => ChunkType::FullRecord,
            ChunkDetail::Skills { .. } => ChunkType::Skills,
            ChunkDetail::Experience { .. } => ChunkType::ExperienceItem,
            ChunkDetail::Education { .. } => ChunkType::EducationItem,
            ChunkDetail::JobRequirements { .. } => ChunkType::Requirements,
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            ChunkDetail::ResumeText { .. } => Collection::Resumes,
            ChunkDetail::Skills { .. } => Collection::Skills,
            ChunkDetail::Experience { .. } => Collection::Experience,
            ChunkDetail::Education { .. } => Collection::Education,
            ChunkDetail::JobPosting { .. } | ChunkDetail::JobRequirements { .. } => Collection::Jobs,
        }
    }
}

/// One embeddable unit. `text` is never blank.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub source: SourceRef,
    pub text: String,
    pub detail: ChunkDetail,
}

impl Chunk {
    fn new(source: SourceRef, text: String, detail: ChunkDetail) -> Option<Self> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            source,
            text,
            detail,
        })
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.detail.chunk_type()
    }

    pub fn collection(&self) -> Collection {
        self.detail.collection()
    }

    /// Payload stored alongside the vector. Always contains the group key
    /// (`resume_id`/`job_id`); variant metadata never overrides the core fields.
    pub fn payload(&self, indexed_at: &str) -> Payload {
        let mut payload = match serde_json::to_value(&self.detail) {
            Ok(Value::Object(map)) => map,
            _ => Payload::new(),
        };
        payload.insert("text".to_string(), json!(self.text));
        payload.insert("type".to_string(), json!(self.chunk_type().as_str()));
        payload.insert("source_kind".to_string(), json!(self.source.kind.as_str()));
        payload.insert(self.source.kind.id_field().to_string(), json!(self.source.id));
        payload.insert("indexed_at".to_string(), json!(indexed_at));
        payload
    }
}

pub fn chunk(record: &SourceRecord) -> Vec<Chunk> {
    match record {
        SourceRecord::Resume(resume) => chunk_resume(resume),
        SourceRecord::Job(job) => chunk_job(job),
    }
}

pub fn chunk_resume(resume: &ResumeRecord) -> Vec<Chunk> {
    let source = SourceRef::resume(resume.id);
    let name = clean_text(resume.name.as_deref()).unwrap_or_else(|| "Unknown".to_string());
    let mut chunks = Vec::new();

    if let Some(raw_text) = clean_text(resume.raw_text.as_deref()) {
        chunks.extend(Chunk::new(
            source,
            raw_text,
            ChunkDetail::ResumeText {
                name: name.clone(),
                email: clean_text(resume.email.as_deref()).unwrap_or_default(),
                phone: clean_text(resume.phone.as_deref()).unwrap_or_default(),
                filename: resume.filename.clone(),
            },
        ));
    }

    let skills = resume.skill_list();
    if !skills.is_empty() {
        chunks.extend(Chunk::new(
            source,
            format!("Skills and Technologies: {}", skills.join(", ")),
            ChunkDetail::Skills {
                name: name.clone(),
                skills_count: skills.len(),
                skills,
            },
        ));
    }

    for (index, entry) in resume.experience_entries().into_iter().enumerate() {
        let (text, experience) = match entry {
            Entry::Structured(e) => (join_labelled(&e.labelled_fields()), e),
            Entry::Freeform(text) => (format!("Experience: {text}"), ExperienceEntry::default()),
        };
        chunks.extend(Chunk::new(
            source,
            text,
            ChunkDetail::Experience {
                name: name.clone(),
                experience_index: index,
                job_title: experience.title.unwrap_or_default(),
                company: experience.company.unwrap_or_default(),
                duration: experience.duration.unwrap_or_default(),
            },
        ));
    }

    for (index, entry) in resume.education_entries().into_iter().enumerate() {
        let (text, education) = match entry {
            Entry::Structured(e) => (join_labelled(&e.labelled_fields()), e),
            Entry::Freeform(text) => (format!("Education: {text}"), EducationEntry::default()),
        };
        chunks.extend(Chunk::new(
            source,
            text,
            ChunkDetail::Education {
                name: name.clone(),
                education_index: index,
                degree: education.degree.unwrap_or_default(),
                institution: education.institution.unwrap_or_default(),
                year: education.year.unwrap_or_default(),
            },
        ));
    }

    chunks
}

pub fn chunk_job(job: &JobRecord) -> Vec<Chunk> {
    let source = SourceRef::job(job.id);
    let title = job.title.trim().to_string();
    let company = job.company.trim().to_string();
    let location = clean_text(job.location.as_deref());
    let employment_type = clean_text(job.employment_type.as_deref());
    let category = clean_text(job.category.as_deref());
    let description = clean_text(Some(&job.description));

    let parts: Vec<(&str, &str)> = [
        ("Job Title", Some(title.as_str())),
        ("Company", Some(company.as_str())),
        ("Location", location.as_deref()),
        ("Employment Type", employment_type.as_deref()),
        ("Category", category.as_deref()),
        ("Description", description.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.filter(|v| !v.is_empty()).map(|v| (label, v)))
    .collect();

    let mut chunks = Vec::new();
    chunks.extend(Chunk::new(
        source,
        join_labelled(&parts),
        ChunkDetail::JobPosting {
            title: title.clone(),
            company: company.clone(),
            location: location.clone().unwrap_or_default(),
            category: category.clone().unwrap_or_default(),
            employment_type: employment_type.clone().unwrap_or_default(),
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            is_active: job.is_active.unwrap_or(true),
        },
    ));

    let requirements = job.requirement_list();
    if !requirements.is_empty() {
        chunks.extend(Chunk::new(
            source,
            format!("Job Requirements: {}", requirements.join("; ")),
            ChunkDetail::JobRequirements {
                title,
                company,
                requirements,
            },
        ));
    }

    chunks
}

fn join_labelled(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::talent::testing::{job_record, resume_record};
    use serde_json::json;

    #[test]
    fn test_full_resume_yields_one_chunk_per_section_item() {
        let resume = resume_record(
            7,
            "Grace Hopper",
            &["COBOL", "Compilers"],
            json!([
                {"title": "Rear Admiral", "company": "US Navy", "duration": "1943-1986"},
                {"title": "Researcher", "company": "Harvard"}
            ]),
            json!([{"degree": "PhD Mathematics", "institution": "Yale", "year": "1934"}]),
        );
        let chunks = chunk_resume(&resume);
        let types: Vec<ChunkType> = chunks.iter().map(Chunk::chunk_type).collect();
        assert_eq!(
            types,
            vec![
                ChunkType::FullRecord,
                ChunkType::Skills,
                ChunkType::ExperienceItem,
                ChunkType::ExperienceItem,
                ChunkType::EducationItem,
            ]
        );
        assert_eq!(
            chunks[2].text,
            "Position: Rear Admiral | Company: US Navy | Duration: 1943-1986"
        );
        assert_eq!(chunks[1].text, "Skills and Technologies: COBOL, Compilers");
    }

    #[test]
    fn test_no_blank_chunks_are_emitted() {
        let mut resume = resume_record(1, "Empty", &[], json!([{}, "   "]), json!([{"degree": ""}]));
        resume.raw_text = Some("   \n ".to_string());
        assert!(chunk_resume(&resume).is_empty());
    }

    #[test]
    fn test_freeform_experience_is_wrapped_as_text() {
        let resume = resume_record(2, "Lin", &[], json!(["Independent contractor"]), json!([]));
        let chunks = chunk_resume(&resume);
        let experience: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.chunk_type() == ChunkType::ExperienceItem)
            .collect();
        assert_eq!(experience.len(), 1);
        assert_eq!(experience[0].text, "Experience: Independent contractor");
    }

    #[test]
    fn test_chunks_route_to_matching_collections() {
        let resume = resume_record(
            3,
            "Ada",
            &["Rust"],
            json!([{"title": "Engineer"}]),
            json!([{"degree": "BSc"}]),
        );
        for chunk in chunk_resume(&resume) {
            let expected = match chunk.chunk_type() {
                ChunkType::FullRecord => Collection::Resumes,
                ChunkType::Skills => Collection::Skills,
                ChunkType::ExperienceItem => Collection::Experience,
                ChunkType::EducationItem => Collection::Education,
                ChunkType::Requirements => unreachable!("resumes have no requirements chunk"),
            };
            assert_eq!(chunk.collection(), expected);
        }
        for chunk in chunk_job(&job_record(9, "Rust Engineer", &["Rust"])) {
            assert_eq!(chunk.collection(), Collection::Jobs);
        }
    }

    #[test]
    fn test_payload_always_carries_group_key() {
        let resume = resume_record(11, "Ada", &["Rust"], json!([]), json!([]));
        let chunk = &chunk_resume(&resume)[0];
        let payload = chunk.payload("2026-01-01T00:00:00Z");
        assert_eq!(payload["resume_id"], json!(11));
        assert_eq!(payload["type"], json!("full_record"));
        assert_eq!(payload["name"], json!("Ada"));
        assert_eq!(payload["source_kind"], json!("resume"));
        assert!(payload.contains_key("indexed_at"));
    }

    #[test]
    fn test_job_chunks() {
        let job = job_record(5, "Data Engineer", &["Python", "Airflow"]);
        let chunks = chunk_job(&job);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with("Job Title: Data Engineer | Company: Acme"));
        assert_eq!(chunks[1].text, "Job Requirements: Python; Airflow");
        let payload = chunks[1].payload("now");
        assert_eq!(payload["job_id"], json!(5));
        assert_eq!(payload["type"], json!("requirements"));
    }

    #[test]
    fn test_job_without_requirements_has_single_chunk() {
        let job = job_record(6, "Designer", &[]);
        let chunks = chunk(&SourceRecord::Job(job));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type(), ChunkType::FullRecord);
    }
}
