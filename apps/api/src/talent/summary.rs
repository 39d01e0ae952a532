//! Human-readable text for search results, built only from verified fields.

use crate::talent::rehydrator::VerifiedCandidate;
use crate::talent::requirements::RequirementSet;

const SKILLS_IN_CONTEXT: usize = 3;
const SKILLS_IN_EXPLANATION: usize = 3;

/// Why a candidate is relevant, stated in counts of data actually on file.
pub fn relevance_explanation(candidate: &VerifiedCandidate, requirements: &RequirementSet) -> String {
    let mut parts = Vec::new();

    let matching = candidate.matching_skills(requirements);
    if !matching.is_empty() {
        let shown: Vec<&str> = matching.iter().take(SKILLS_IN_EXPLANATION).copied().collect();
        parts.push(format!(
            "Has {} relevant skills: {}",
            matching.len(),
            shown.join(", ")
        ));
    }
    if !candidate.experience.is_empty() {
        parts.push(format!(
            "Has {} work experience entries",
            candidate.experience.len()
        ));
    }
    if !candidate.education.is_empty() {
        parts.push(format!(
            "Has {} education qualifications",
            candidate.education.len()
        ));
    }

    if parts.is_empty() {
        "Candidate profile matches search criteria".to_string()
    } else {
        parts.join("; ")
    }
}

/// Short description of what was searched for, e.g.
/// "Backend engineer role, with Rust, Go skills, 5+ years experience".
pub fn requirement_context(requirements: &RequirementSet) -> String {
    let mut parts = Vec::new();

    if let Some(title) = requirements.job_title.as_option() {
        parts.push(format!("{title} role"));
    }

    let skills = &requirements.skills_required;
    match skills.len() {
        0 => {}
        n if n <= SKILLS_IN_CONTEXT => parts.push(format!("with {} skills", skills.join(", "))),
        n => parts.push(format!(
            "with {} and {} more skills",
            skills[..SKILLS_IN_CONTEXT].join(", "),
            n - SKILLS_IN_CONTEXT
        )),
    }

    if let Some(min) = requirements.experience_years.min.as_option() {
        parts.push(format!("{min}+ years experience"));
    }

    parts.join(", ")
}

/// Response text when at least one verified candidate survived.
pub fn verified_response(candidates: &[&VerifiedCandidate], requirements: &RequirementSet) -> String {
    let Some(top) = candidates.first() else {
        return no_results_response(requirements);
    };

    let count = candidates.len();
    let plural = if count == 1 { "" } else { "s" };
    let mut parts = Vec::new();

    if requirements.fallback_search {
        parts.push(format!("I found {count} candidate{plural} for your search."));
        parts.push(
            "Note: I had some difficulty understanding your specific requirements, \
             so I've provided a broader search result."
                .to_string(),
        );
    } else {
        parts.push(format!(
            "I found {count} verified candidate{plural} matching your requirements."
        ));
        let context = requirement_context(requirements);
        if !context.is_empty() {
            parts.push(format!("Based on your search for: {context}."));
        }
    }

    let mut highlights = Vec::new();
    let skill_count = if requirements.skills_required.is_empty() {
        top.skills.len()
    } else {
        top.matching_skills(requirements).len()
    };
    if skill_count > 0 {
        highlights.push(format!("{skill_count} relevant skills"));
    }
    if !top.experience.is_empty() {
        highlights.push(format!("{} work experience entries", top.experience.len()));
    }
    if !highlights.is_empty() {
        parts.push(format!(
            "The top match is {} with {}.",
            top.display_name(),
            highlights.join(" and ")
        ));
    }

    parts.push(
        "Please review the candidate cards below for complete details.".to_string(),
    );
    parts.push("All data shown has been verified from actual resume uploads.".to_string());
    parts.join(" ")
}

pub fn no_results_response(requirements: &RequirementSet) -> String {
    let context = requirement_context(requirements);
    if context.is_empty() {
        "I couldn't find any candidates matching your search. Please try refining your \
         requirements or using different keywords."
            .to_string()
    } else {
        format!(
            "I couldn't find any candidates matching your specific requirements for {context}. \
             You might want to try broadening your search criteria or consider similar skills \
             and experience levels."
        )
    }
}
