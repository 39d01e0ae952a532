//! Search Orchestrator.
//!
//! ExtractRequirements → Retrieve → Aggregate → RehydrateAndValidate → Summarize → Done
//!
//! Extraction failure degrades to fallback mode. Retrieval failure with no usable
//! data aborts with `SearchError::Unavailable`. Everything after retrieval only
//! filters.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SearchTuning;
use crate::embedding::EmbeddingProvider;
use crate::errors::AppError;
use crate::llm_client::CompletionClient;
use crate::models::{EducationEntry, ExperienceEntry};
use crate::records::RecordStore;
use crate::talent::aggregator::{aggregate, ScoredCandidate, ScoringPolicy};
use crate::talent::conversation::{load_history, record_exchange, ConversationStore};
use crate::talent::rehydrator::{
    passes_quality_gate, DataCompleteness, Rehydrator, VerifiedCandidate,
};
use crate::talent::requirements::{RequirementExtractor, RequirementSet};
use crate::talent::retriever::{RetrievalError, RetrievalPlan, Retriever};
use crate::talent::summary::{no_results_response, relevance_explanation, verified_response};
use crate::vector::{Collection, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
    ExtractRequirements,
    Retrieve,
    Aggregate,
    RehydrateAndValidate,
    Summarize,
    Done,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search unavailable at {stage:?}: {source}")]
    Unavailable {
        stage: SearchStage,
        source: RetrievalError,
    },

    #[error("search unavailable at {stage:?}: all {failed} record lookups failed: {source}")]
    RecordsUnavailable {
        stage: SearchStage,
        failed: usize,
        source: sqlx::Error,
    },
}

impl From<SearchError> for AppError {
    fn from(e: SearchError) -> Self {
        AppError::SearchUnavailable(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchDetails {
    pub avg_score: f32,
    pub match_count: usize,
    pub skill_matches: usize,
    pub experience_matches: usize,
    pub diversity_score: usize,
    pub best_match_score: f32,
}

/// Which parts of the profile matched, without the indexed text itself.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedSection {
    pub collection: Collection,
    pub chunk_type: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub candidate: VerifiedCandidate,
    pub search_score: f32,
    pub match_details: MatchDetails,
    pub matched_sections: Vec<MatchedSection>,
    pub relevance_explanation: String,
}

impl RankedCandidate {
    fn new(candidate: VerifiedCandidate, scored: &ScoredCandidate, requirements: &RequirementSet) -> Self {
        let relevance_explanation = relevance_explanation(&candidate, requirements);
        Self {
            search_score: scored.final_score,
            match_details: MatchDetails {
                avg_score: scored.avg_score,
                match_count: scored.match_count,
                skill_matches: scored.skill_matches,
                experience_matches: scored.experience_matches,
                diversity_score: scored.diversity_score,
                best_match_score: scored.best_match_score,
            },
            matched_sections: scored
                .top_matches
                .iter()
                .map(|hit| MatchedSection {
                    collection: hit.collection,
                    chunk_type: hit.chunk_type.clone(),
                    score: hit.weighted_score,
                })
                .collect(),
            relevance_explanation,
            candidate,
        }
    }
}

const CARD_SKILLS: usize = 10;
const CARD_EXPERIENCE: usize = 2;

/// Condensed view of a ranked candidate for list display.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateCard {
    pub source_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub filename: Option<String>,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Option<EducationEntry>,
    /// Final score as a percentage with one decimal.
    pub match_score: f32,
    pub match_details: MatchDetails,
    pub data_completeness: DataCompleteness,
    pub relevance_explanation: String,
}

impl From<&RankedCandidate> for CandidateCard {
    fn from(ranked: &RankedCandidate) -> Self {
        let candidate = &ranked.candidate;
        Self {
            source_id: candidate.source_id,
            name: candidate.display_name().to_string(),
            email: candidate.email.clone(),
            phone: candidate.phone.clone(),
            filename: candidate.filename.clone(),
            skills: candidate.skills.iter().take(CARD_SKILLS).cloned().collect(),
            experience: candidate.experience.iter().take(CARD_EXPERIENCE).cloned().collect(),
            education: candidate.education.first().cloned(),
            match_score: (ranked.search_score * 1000.0).round() / 10.0,
            match_details: ranked.match_details.clone(),
            data_completeness: candidate.data_completeness.clone(),
            relevance_explanation: ranked.relevance_explanation.clone(),
        }
    }
}

/// Candidate counts at each funnel stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchMetadata {
    pub raw_hits: usize,
    pub initial_results: usize,
    pub verified_candidates: usize,
    pub final_candidates: usize,
    pub quality_filtered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub candidates: Vec<RankedCandidate>,
    pub candidate_cards: Vec<CandidateCard>,
    pub ai_response: String,
    pub requirements_extracted: RequirementSet,
    pub total_found: usize,
    pub search_metadata: SearchMetadata,
}

pub struct TalentSearch {
    extractor: RequirementExtractor,
    retriever: Retriever,
    rehydrator: Rehydrator,
    conversations: Arc<dyn ConversationStore>,
    policy: ScoringPolicy,
    top_k: usize,
}

impl TalentSearch {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        records: Arc<dyn RecordStore>,
        conversations: Arc<dyn ConversationStore>,
        tuning: &SearchTuning,
    ) -> Self {
        Self {
            extractor: RequirementExtractor::new(llm),
            retriever: Retriever::new(store, embedder),
            rehydrator: Rehydrator::new(records),
            conversations,
            policy: ScoringPolicy::from_tuning(tuning),
            top_k: tuning.top_k,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        conversation_id: Option<&str>,
    ) -> Result<SearchOutcome, SearchError> {
        let query = query.trim();
        info!(query, "starting candidate search");

        debug!(stage = ?SearchStage::ExtractRequirements);
        let history = match conversation_id {
            Some(id) => load_history(self.conversations.as_ref(), id).await,
            None => Vec::new(),
        };
        let requirements = self.extractor.extract(query, &history).await;
        debug!(
            skills = ?requirements.skills_required,
            fallback = requirements.fallback_search,
            confidence = requirements.confidence,
            "requirements extracted"
        );

        debug!(stage = ?SearchStage::Retrieve);
        let plan = RetrievalPlan::for_candidates(self.top_k);
        let hits = self
            .retriever
            .retrieve(&requirements.search_text(query), &plan)
            .await
            .map_err(|source| SearchError::Unavailable {
                stage: SearchStage::Retrieve,
                source,
            })?;
        let raw_hits = hits.len();

        debug!(stage = ?SearchStage::Aggregate);
        let scored = aggregate(hits, self.top_k, &self.policy);

        let mut metadata = SearchMetadata {
            raw_hits,
            initial_results: scored.len(),
            ..SearchMetadata::default()
        };

        let candidates = if scored.is_empty() {
            Vec::new()
        } else {
            debug!(stage = ?SearchStage::RehydrateAndValidate);
            let ids: Vec<i64> = scored.iter().map(|c| c.source_id).collect();
            let rehydration = self.rehydrator.rehydrate(&ids).await;
            if rehydration.all_failed() {
                if let Some(source) = rehydration.first_error {
                    return Err(SearchError::RecordsUnavailable {
                        stage: SearchStage::RehydrateAndValidate,
                        failed: rehydration.failed_lookups,
                        source,
                    });
                }
            }
            metadata.verified_candidates = rehydration.verified.len();
            rank(scored, rehydration.verified, &requirements)
        };
        metadata.final_candidates = candidates.len();
        metadata.quality_filtered = metadata.initial_results - metadata.final_candidates;

        debug!(stage = ?SearchStage::Summarize);
        let ai_response = if candidates.is_empty() {
            no_results_response(&requirements)
        } else {
            let verified: Vec<&VerifiedCandidate> = candidates.iter().map(|c| &c.candidate).collect();
            verified_response(&verified, &requirements)
        };

        if let Some(id) = conversation_id {
            record_exchange(self.conversations.as_ref(), id, query, &ai_response).await;
        }

        debug!(stage = ?SearchStage::Done);
        info!(
            raw_hits = metadata.raw_hits,
            initial = metadata.initial_results,
            verified = metadata.verified_candidates,
            returned = metadata.final_candidates,
            "candidate search finished"
        );

        Ok(SearchOutcome {
            total_found: candidates.len(),
            candidate_cards: candidates.iter().map(CandidateCard::from).collect(),
            candidates,
            ai_response,
            requirements_extracted: requirements,
            search_metadata: metadata,
        })
    }
}

/// Pairs verified records with their scores in ranked order, dropping anything
/// that failed rehydration or the quality gate.
fn rank(
    scored: Vec<ScoredCandidate>,
    verified: Vec<VerifiedCandidate>,
    requirements: &RequirementSet,
) -> Vec<RankedCandidate> {
    let mut by_id: HashMap<i64, VerifiedCandidate> =
        verified.into_iter().map(|c| (c.source_id, c)).collect();

    scored
        .iter()
        .filter_map(|score| {
            let candidate = by_id.remove(&score.source_id)?;
            if !passes_quality_gate(&candidate, requirements) {
                info!(source_id = score.source_id, "candidate filtered by quality gate");
                return None;
            }
            Some(RankedCandidate::new(candidate, score, requirements))
        })
        .collect()
}
