use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use tracing::debug;

/// Row of the application's `resume` table. Skills, experience and education are
/// free-form JSON written by the resume parser, so they are decoded lazily.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRecord {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills: Option<Value>,
    pub experience: Option<Value>,
    pub education: Option<Value>,
    pub raw_text: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

/// One item of an experience/education list.
///
/// Object items become `Structured`. Plain strings and numbers are coerced to
/// `Freeform` so no user text is lost; null, booleans and nested arrays carry no
/// usable text and are skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry<T> {
    Structured(T),
    Freeform(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
}

impl ExperienceEntry {
    // The resume parser writes `position`; older rows use `title`.
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            title: field_text(map, &["title", "position"]),
            company: field_text(map, &["company"]),
            duration: field_text(map, &["duration"]),
            description: field_text(map, &["description"]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.company.is_none()
            && self.duration.is_none()
            && self.description.is_none()
    }

    /// Populated fields as (label, value), in display order.
    pub fn labelled_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("Position", &self.title),
            ("Company", &self.company),
            ("Duration", &self.duration),
            ("Description", &self.description),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().map(|v| (label, v)))
        .collect()
    }
}

impl EducationEntry {
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            degree: field_text(map, &["degree"]),
            institution: field_text(map, &["institution"]),
            year: field_text(map, &["year", "graduation_year"]),
            grade: field_text(map, &["grade", "gpa"]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.degree.is_none()
            && self.institution.is_none()
            && self.year.is_none()
            && self.grade.is_none()
    }

    pub fn labelled_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("Degree", &self.degree),
            ("Institution", &self.institution),
            ("Year", &self.year),
            ("Grade", &self.grade),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().map(|v| (label, v)))
        .collect()
    }
}

impl ResumeRecord {
    /// Non-empty skill strings, in stored order.
    pub fn skill_list(&self) -> Vec<String> {
        match &self.skills {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
            _ => Vec::new(),
        }
    }

    pub fn experience_entries(&self) -> Vec<Entry<ExperienceEntry>> {
        parse_entries(self.experience.as_ref(), ExperienceEntry::from_map, self.id)
    }

    pub fn education_entries(&self) -> Vec<Entry<EducationEntry>> {
        parse_entries(self.education.as_ref(), EducationEntry::from_map, self.id)
    }
}

fn parse_entries<T>(
    value: Option<&Value>,
    from_map: fn(&Map<String, Value>) -> T,
    resume_id: i64,
) -> Vec<Entry<T>> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(Entry::Structured(from_map(map))),
            Value::String(_) | Value::Number(_) => scalar_text(item).map(Entry::Freeform),
            other => {
                debug!(resume_id, kind = json_kind(other), "skipping entry without text");
                None
            }
        })
        .collect()
}

/// First populated key among `keys`.
fn field_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| map.get(*key).and_then(scalar_text))
}

/// Text of a JSON string or number; blank strings become `None`.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
