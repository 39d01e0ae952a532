// LLM prompt constants for talent search.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for requirement extraction.
pub const REQUIREMENT_SYSTEM: &str = "You are an assistant helping recruiters search for \
    candidates. You extract search criteria from hiring requests. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Requirement extraction template. Replace `{history}`, `{query}` and `{literal_rule}` before sending.
pub const REQUIREMENT_PROMPT_TEMPLATE: &str = r#"Extract the candidate requirements stated in the recruiter's query.

{literal_rule}

RULES:
1. Only extract information that is explicitly mentioned.
2. Use "not_specified" for anything missing. Be conservative: if uncertain, use "not_specified".
3. Extract skills and technologies exactly as written. Never add synonyms or related skills.
4. Never assume salary, company size or seniority.

Conversation history (most recent last):
{history}

Current query: {query}

Return a JSON object with this EXACT schema (no extra fields):
{
  "job_title": "string or not_specified",
  "skills_required": ["only explicitly mentioned skills"],
  "experience_years": {"min": "number or not_specified", "max": "number or not_specified"},
  "education_level": "string or not_specified",
  "location": "string or not_specified",
  "industry": "string or not_specified",
  "remote_work": "boolean or not_specified",
  "technologies": ["only explicitly mentioned technologies"],
  "certifications": ["only explicitly mentioned certifications"],
  "confidence": 0.0,
  "missing_info": ["important information the query does not give"],
  "follow_up_questions": ["at most 3 specific clarifying questions"]
}

"confidence" is a number between 0 and 1 reflecting how clear the query is.

EXAMPLE: for "Find Python developers"
- job_title: "Python developer"
- skills_required: ["Python"]
- everything else: "not_specified" or an empty list"#;
