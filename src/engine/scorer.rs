//! Opportunity scoring.
//!
//! A pure, deterministic weighted heuristic: same candidate + config
//! always produces the same score, clamped to [0, 10]. No I/O, no
//! side effects — independently unit-testable.

use crate::config::ScoringConfig;
use crate::types::OpportunityCandidate;

/// Score one candidate against the configured weights.
///
/// Components:
/// - base score
/// - keyword bonus if the collection or display name contains any
///   curated keyword (case-insensitive substring match)
/// - image bonus if an image URL is present
/// - flat discovery bonus
/// - per-source reliability bonus (table lookup with a default)
/// - free bonus if the native price is exactly zero
pub fn score_candidate(candidate: &OpportunityCandidate, cfg: &ScoringConfig) -> f64 {
    let mut score = cfg.base;

    let haystack = format!(
        "{} {}",
        candidate.collection_name.as_deref().unwrap_or(""),
        candidate.name.as_deref().unwrap_or("")
    )
    .to_lowercase();
    if cfg.keywords.iter().any(|k| haystack.contains(&k.to_lowercase())) {
        score += cfg.keyword_bonus;
    }

    if candidate.image_url.as_deref().is_some_and(|u| !u.is_empty()) {
        score += cfg.image_bonus;
    }

    score += cfg.discovery_bonus;

    score += cfg
        .source_reliability
        .get(&candidate.source)
        .copied()
        .unwrap_or(cfg.default_reliability);

    if candidate.price_native == 0.0 {
        score += cfg.free_bonus;
    }

    score.clamp(0.0, 10.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
