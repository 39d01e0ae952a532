// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Common instruction appended to every extraction prompt.
pub const LITERAL_EXTRACTION_INSTRUCTION: &str = "\
    CRITICAL: Extract ONLY information that is explicitly written in the user's text. \
    Do NOT infer, interpolate, or add synonyms or related terms. \
    If something is not stated, use the value \"not_specified\" (or an empty list). \
    Never guess salary, company size, seniority or location.";
