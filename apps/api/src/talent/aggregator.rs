//! Result Aggregator & Validator: groups raw hits by resume and ranks them.
//!
//! final = avg(weighted scores)
//!       + diversity_bonus  × distinct collections
//!       + skill_bonus      × hits from the skills collection
//!       + experience_bonus × hits from the experience collection
//!
//! Candidates under `min_score` are dropped; the rest are capped at `score_cap`.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::config::SearchTuning;
use crate::talent::retriever::RawHit;
use crate::vector::Collection;

const TOP_MATCHES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    pub min_score: f32,
    pub score_cap: f32,
    pub diversity_bonus: f32,
    pub skill_bonus: f32,
    pub experience_bonus: f32,
}

impl ScoringPolicy {
    pub fn from_tuning(tuning: &SearchTuning) -> Self {
        Self {
            min_score: tuning.min_score,
            score_cap: tuning.score_cap,
            ..Self::default()
        }
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            min_score: 0.3,
            score_cap: 2.0,
            diversity_bonus: 0.1,
            skill_bonus: 0.15,
            experience_bonus: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub source_id: i64,
    pub name: String,
    /// Always within [0, score_cap].
    pub final_score: f32,
    pub avg_score: f32,
    pub match_count: usize,
    pub skill_matches: usize,
    pub experience_matches: usize,
    /// Number of distinct collections matched.
    pub diversity_score: usize,
    pub best_match_score: f32,
    /// Up to three strongest hits, by weighted score.
    pub top_matches: Vec<RawHit>,
}

struct Group {
    source_id: i64,
    name: String,
    hits: Vec<RawHit>,
    collections: BTreeSet<Collection>,
}

/// Groups `hits` by source, scores each group and returns at most `top_k`
/// candidates in non-increasing `final_score` order. Ties keep the order in
/// which each source was first retrieved.
pub fn aggregate(hits: Vec<RawHit>, top_k: usize, policy: &ScoringPolicy) -> Vec<ScoredCandidate> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for hit in hits {
        let slot = *index.entry(hit.source_id).or_insert_with(|| {
            groups.push(Group {
                source_id: hit.source_id,
                name: hit.name.clone(),
                hits: Vec::new(),
                collections: BTreeSet::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.collections.insert(hit.collection);
        group.hits.push(hit);
    }

    let mut candidates: Vec<ScoredCandidate> = groups
        .into_iter()
        .filter_map(|group| score_group(group, policy))
        .collect();

    candidates.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    candidates.truncate(top_k);
    candidates
}

fn score_group(group: Group, policy: &ScoringPolicy) -> Option<ScoredCandidate> {
    let match_count = group.hits.len();
    if match_count == 0 {
        return None;
    }

    let total: f32 = group.hits.iter().map(|h| h.weighted_score).sum();
    let avg_score = total / match_count as f32;
    let skill_matches = count_in(&group.hits, Collection::Skills);
    let experience_matches = count_in(&group.hits, Collection::Experience);
    let diversity_score = group.collections.len();

    let final_score = avg_score
        + policy.diversity_bonus * diversity_score as f32
        + policy.skill_bonus * skill_matches as f32
        + policy.experience_bonus * experience_matches as f32;

    if !final_score.is_finite() || final_score < policy.min_score {
        return None;
    }

    let best_match_score = group
        .hits
        .iter()
        .map(|h| h.weighted_score)
        .fold(0.0_f32, f32::max);

    let mut top_matches = group.hits;
    top_matches.sort_by(|a, b| b.weighted_score.total_cmp(&a.weighted_score));
    top_matches.truncate(TOP_MATCHES);

    Some(ScoredCandidate {
        source_id: group.source_id,
        name: group.name,
        final_score: final_score.max(0.0).min(policy.score_cap),
        avg_score,
        match_count,
        skill_matches,
        experience_matches,
        diversity_score,
        best_match_score,
        top_matches,
    })
}

fn count_in(hits: &[RawHit], collection: Collection) -> usize {
    hits.iter().filter(|h| h.collection == collection).count()
}
