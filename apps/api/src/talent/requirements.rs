//! Requirement Extractor: turns a free-text hiring query into a `RequirementSet`.
//!
//! The LLM is untrusted: every skill, technology, certification and job title it
//! returns must appear literally (case-insensitive) in the query, otherwise it is
//! dropped. Extraction never fails the search; any error yields the fallback set.

use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm_client::prompts::LITERAL_EXTRACTION_INSTRUCTION;
use crate::llm_client::{parse_json_reply, CompletionClient, LlmError};
use crate::talent::conversation::ConversationMessage;
use crate::talent::prompts::{REQUIREMENT_PROMPT_TEMPLATE, REQUIREMENT_SYSTEM};

pub const NOT_SPECIFIED: &str = "not_specified";

/// Messages of history passed to the LLM.
const HISTORY_WINDOW: usize = 5;
const MAX_FOLLOW_UPS: usize = 3;

/// A requirement field the query may leave open. Serializes as the value
/// itself or as the `"not_specified"` sentinel.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Specified<T> {
    Value(T),
    #[default]
    NotSpecified,
}

impl<T> Specified<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Specified::Value(v) => Some(v),
            Specified::NotSpecified => None,
        }
    }
}

impl<T: Serialize> Serialize for Specified<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Specified::Value(v) => v.serialize(serializer),
            Specified::NotSpecified => serializer.serialize_str(NOT_SPECIFIED),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperienceRange {
    pub min: Specified<f32>,
    pub max: Specified<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementSet {
    pub job_title: Specified<String>,
    pub skills_required: Vec<String>,
    pub experience_years: ExperienceRange,
    pub education_level: Specified<String>,
    pub location: Specified<String>,
    pub industry: Specified<String>,
    pub remote_work: Specified<bool>,
    pub technologies: Vec<String>,
    pub certifications: Vec<String>,
    /// Always within [0, 1].
    pub confidence: f32,
    pub missing_info: Vec<String>,
    pub follow_up_questions: Vec<String>,
    /// Set when extraction failed and the search runs unconstrained.
    pub fallback_search: bool,
}

impl RequirementSet {
    /// Used whenever extraction fails. Carries no requirements.
    pub fn fallback() -> Self {
        Self {
            job_title: Specified::NotSpecified,
            skills_required: Vec::new(),
            experience_years: ExperienceRange::default(),
            education_level: Specified::NotSpecified,
            location: Specified::NotSpecified,
            industry: Specified::NotSpecified,
            remote_work: Specified::NotSpecified,
            technologies: Vec::new(),
            certifications: Vec::new(),
            confidence: 0.0,
            missing_info: vec!["Unable to process query".to_string()],
            follow_up_questions: vec![
                "Could you please rephrase your requirements more clearly?".to_string(),
            ],
            fallback_search: true,
        }
    }

    /// Required skills, lowercased, for substring matching against candidate data.
    pub fn required_skill_terms(&self) -> Vec<String> {
        self.skills_required
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Query text used for embedding. Validated requirements are appended in the
    /// same phrasing the chunker uses, so they pull towards the matching chunks.
    pub fn search_text(&self, query: &str) -> String {
        let mut text = query.trim().to_string();
        if self.fallback_search {
            return text;
        }
        if let Some(title) = self.job_title.as_option() {
            text.push_str(&format!(" | Position: {title}"));
        }
        let terms: Vec<&str> = self
            .skills_required
            .iter()
            .chain(&self.technologies)
            .map(String::as_str)
            .collect();
        if !terms.is_empty() {
            text.push_str(&format!(" | Skills and Technologies: {}", terms.join(", ")));
        }
        text
    }
}

/// LLM reply before validation. Every field is taken as raw JSON so one badly
/// typed field does not discard the rest.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRequirements {
    job_title: Value,
    skills_required: Value,
    experience_years: Value,
    education_level: Value,
    location: Value,
    industry: Value,
    remote_work: Value,
    technologies: Value,
    certifications: Value,
    confidence: Value,
    missing_info: Value,
    follow_up_questions: Value,
}

impl RawRequirements {
    fn validate(self, query: &str) -> RequirementSet {
        let query_lower = query.to_lowercase();

        let job_title = match specified_text(&self.job_title) {
            Specified::Value(title) if !query_lower.contains(&title.to_lowercase()) => {
                debug!(%title, "dropping job title absent from query");
                Specified::NotSpecified
            }
            other => other,
        };

        let (min, max) = match &self.experience_years {
            Value::Object(map) => (
                map.get("min").map(years).unwrap_or_default(),
                map.get("max").map(years).unwrap_or_default(),
            ),
            _ => (Specified::NotSpecified, Specified::NotSpecified),
        };

        let confidence = self
            .confidence
            .as_f64()
            .filter(|c| c.is_finite() && (0.0..=1.0).contains(c))
            .unwrap_or(0.0) as f32;

        let mut follow_up_questions = string_list(&self.follow_up_questions);
        follow_up_questions.truncate(MAX_FOLLOW_UPS);

        RequirementSet {
            job_title,
            skills_required: literal_only(string_list(&self.skills_required), &query_lower),
            experience_years: ExperienceRange { min, max },
            education_level: specified_text(&self.education_level),
            location: specified_text(&self.location),
            industry: specified_text(&self.industry),
            remote_work: match self.remote_work {
                Value::Bool(b) => Specified::Value(b),
                _ => Specified::NotSpecified,
            },
            technologies: literal_only(string_list(&self.technologies), &query_lower),
            certifications: literal_only(string_list(&self.certifications), &query_lower),
            confidence,
            missing_info: string_list(&self.missing_info),
            follow_up_questions,
            fallback_search: false,
        }
    }
}

pub struct RequirementExtractor {
    llm: Arc<dyn CompletionClient>,
}

impl RequirementExtractor {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    /// Extracts requirements from `query`, using up to the last five history messages
    /// as context. Never fails: errors produce `RequirementSet::fallback()`.
    pub async fn extract(&self, query: &str, history: &[ConversationMessage]) -> RequirementSet {
        match self.try_extract(query, history).await {
            Ok(requirements) => requirements,
            Err(e) => {
                warn!(error = %e, "requirement extraction failed, using fallback search");
                RequirementSet::fallback()
            }
        }
    }

    async fn try_extract(
        &self,
        query: &str,
        history: &[ConversationMessage],
    ) -> Result<RequirementSet, LlmError> {
        let prompt = build_prompt(query, history);
        let reply = self.llm.complete(&prompt, REQUIREMENT_SYSTEM).await?;
        let raw: RawRequirements = parse_json_reply(&reply)?;
        Ok(raw.validate(query))
    }
}

fn build_prompt(query: &str, history: &[ConversationMessage]) -> String {
    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    let history_text = if recent.is_empty() {
        "(none)".to_string()
    } else {
        recent
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    };
    fill_placeholders(
        REQUIREMENT_PROMPT_TEMPLATE,
        &[
            ("literal_rule", LITERAL_EXTRACTION_INSTRUCTION),
            ("history", &history_text),
            ("query", query),
        ],
    )
}

/// Substitutes `{name}` placeholders in one pass over the template. Inserted
/// values are never rescanned, and unknown braces are copied through.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        filled.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let matched = values.iter().find(|(name, _)| {
            tail.strip_prefix(name)
                .is_some_and(|after| after.starts_with('}'))
        });
        match matched {
            Some((name, value)) => {
                filled.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                filled.push('{');
                rest = tail;
            }
        }
    }
    filled.push_str(rest);
    filled
}

fn specified_text(value: &Value) -> Specified<String> {
    match value.as_str().map(str::trim) {
        Some(s) if !s.is_empty() && !s.eq_ignore_ascii_case(NOT_SPECIFIED) => {
            Specified::Value(s.to_string())
        }
        _ => Specified::NotSpecified,
    }
}

fn years(value: &Value) -> Specified<f32> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(y) if y.is_finite() && y >= 0.0 => Specified::Value(y as f32),
        _ => Specified::NotSpecified,
    }
}

/// Non-blank strings of a JSON array; anything else is ignored.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(NOT_SPECIFIED))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Keeps items that occur literally in the query, case-insensitively, without duplicates.
fn literal_only(items: Vec<String>, query_lower: &str) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for item in items {
        let lower = item.to_lowercase();
        if !query_lower.contains(&lower) {
            debug!(%item, "dropping extracted term absent from query");
            continue;
        }
        if kept.iter().any(|k| k.to_lowercase() == lower) {
            continue;
        }
        kept.push(item);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::talent::conversation::Role;
    use crate::talent::testing::ScriptedLlm;
    use serde_json::json;

    fn extractor(reply: Result<&str, ()>) -> (RequirementExtractor, Arc<ScriptedLlm>) {
        let llm = Arc::new(match reply {
            Ok(text) => ScriptedLlm::replying(text),
            Err(()) => ScriptedLlm::failing(),
        });
        (RequirementExtractor::new(llm.clone()), llm)
    }

    #[tokio::test]
    async fn test_terms_absent_from_query_are_dropped() {
        let reply = json!({
            "job_title": "Senior Backend Engineer",
            "skills_required": ["Python", "Django", "Kubernetes"],
            "technologies": ["PostgreSQL", "AWS"],
            "certifications": ["CKA"],
            "confidence": 0.8
        })
        .to_string();
        let (extractor, _) = extractor(Ok(&reply));
        let set = extractor
            .extract("Find python developers who know Django and postgresql", &[])
            .await;
        assert_eq!(set.skills_required, vec!["Python", "Django"]);
        assert_eq!(set.technologies, vec!["PostgreSQL"]);
        assert!(set.certifications.is_empty());
        assert_eq!(set.job_title, Specified::NotSpecified);
        assert!(!set.fallback_search);
    }

    #[tokio::test]
    async fn test_literal_invariant_holds_for_generated_queries() {
        let known = ["Rust", "Go", "Terraform", "React", "SQL"];
        let invented = ["Haskell", "COBOL", "Elixir", "Kafka"];
        for mask in 1u32..(1 << known.len()) {
            let present: Vec<&str> = known
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, k)| *k)
                .collect();
            let query = format!("Looking for engineers with {}", present.join(" and "));
            let claimed: Vec<&str> = known.iter().chain(invented.iter()).copied().collect();
            let reply = json!({"skills_required": claimed, "technologies": claimed}).to_string();
            let (extractor, _) = extractor(Ok(&reply));
            let set = extractor.extract(&query, &[]).await;

            let query_lower = query.to_lowercase();
            for term in set.skills_required.iter().chain(&set.technologies) {
                assert!(query_lower.contains(&term.to_lowercase()), "{term} not in {query}");
            }
            for absent in invented {
                assert!(!set.skills_required.iter().any(|s| s == absent));
            }
        }
    }

    #[tokio::test]
    async fn test_confidence_out_of_range_resets_to_zero() {
        let (extractor, _) = extractor(Ok(r#"{"confidence": 1.7, "skills_required": []}"#));
        let set = extractor.extract("anything", &[]).await;
        assert_eq!(set.confidence, 0.0);
        assert!(!set.fallback_search);
    }

    #[tokio::test]
    async fn test_follow_ups_are_capped_at_three() {
        let reply = json!({
            "confidence": 0.4,
            "follow_up_questions": ["a?", "b?", "c?", "d?", "e?"]
        })
        .to_string();
        let (extractor, _) = extractor(Ok(&reply));
        let set = extractor.extract("someone good", &[]).await;
        assert_eq!(set.follow_up_questions, vec!["a?", "b?", "c?"]);
        assert!((set.confidence - 0.4).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_llm_failure_yields_fallback() {
        let (extractor, _) = extractor(Err(()));
        let set = extractor.extract("Find Python developers", &[]).await;
        assert_eq!(set, RequirementSet::fallback());
        assert!(set.fallback_search);
        assert_eq!(set.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_malformed_json_yields_fallback() {
        let (extractor, _) = extractor(Ok("Sure! Here are the requirements: Python"));
        let set = extractor.extract("Find Python developers", &[]).await;
        assert!(set.fallback_search);
    }

    #[tokio::test]
    async fn test_experience_years_and_remote_work() {
        let reply = json!({
            "experience_years": {"min": 5, "max": "not_specified"},
            "remote_work": true,
            "location": "Berlin",
            "education_level": "not_specified"
        })
        .to_string();
        let (extractor, _) = extractor(Ok(&reply));
        let set = extractor.extract("5+ years, remote, Berlin", &[]).await;
        assert_eq!(set.experience_years.min, Specified::Value(5.0));
        assert_eq!(set.experience_years.max, Specified::NotSpecified);
        assert_eq!(set.remote_work, Specified::Value(true));
        assert_eq!(set.location, Specified::Value("Berlin".to_string()));
        assert_eq!(set.education_level, Specified::NotSpecified);
    }

    #[tokio::test]
    async fn test_prompt_carries_only_recent_history() {
        let (extractor, llm) = extractor(Ok("{}"));
        let history: Vec<ConversationMessage> = (0..8)
            .map(|i| ConversationMessage::new(Role::User, format!("message-{i}")))
            .collect();
        extractor.extract("Find Go developers", &history).await;
        let prompts = llm.prompts().await;
        assert_eq!(prompts.len(), 1);
        assert!(!prompts[0].contains("message-2"));
        assert!(prompts[0].contains("message-3"));
        assert!(prompts[0].contains("user: message-7"));
        assert!(prompts[0].contains("Current query: Find Go developers"));
    }

    #[tokio::test]
    async fn test_placeholder_text_in_history_is_left_alone() {
        let (extractor, llm) = extractor(Ok("{}"));
        let history = vec![ConversationMessage::new(
            Role::Assistant,
            "Try a template like {query} or {history}",
        )];
        extractor.extract("Find {history} developers", &history).await;
        let prompts = llm.prompts().await;
        let prompt = &prompts[0];
        assert!(prompt.contains("assistant: Try a template like {query} or {history}"));
        assert!(prompt.contains("Current query: Find {history} developers"));
        assert!(!prompt.contains("{literal_rule}"));
        assert!(prompt.contains("\"skills_required\": [\"only explicitly mentioned skills\"]"));
    }

    #[test]
    fn test_fill_placeholders_copies_unknown_braces() {
        let filled = fill_placeholders("{a} {b} {{a}} {", &[("a", "x{a}")]);
        assert_eq!(filled, "x{a} {b} {x{a}} {");
    }

    #[test]
    fn test_sentinel_serialization() {
        let value = serde_json::to_value(RequirementSet::fallback()).unwrap();
        assert_eq!(value["job_title"], json!("not_specified"));
        assert_eq!(value["experience_years"]["min"], json!("not_specified"));
        assert_eq!(value["fallback_search"], json!(true));
    }

    #[test]
    fn test_search_text_appends_validated_terms() {
        let mut set = RequirementSet::fallback();
        assert_eq!(set.search_text(" Find Python devs "), "Find Python devs");
        set.fallback_search = false;
        set.job_title = Specified::Value("Python developer".to_string());
        set.skills_required = vec!["Python".to_string()];
        set.technologies = vec!["Django".to_string()];
        assert_eq!(
            set.search_text("Find Python developer"),
            "Find Python developer | Position: Python developer | Skills and Technologies: Python, Django"
        );
    }
}
