//! City resolver: picks the best candidate for a (city name, postal code) pair.
//!
//! Flow: missing field → no match; unknown postal code → no match;
//! otherwise score every candidate, take the lowest distance (first in index
//! order on ties) and accept it when it is within the threshold.

use super::index::PostalCodeIndex;
use super::similarity::normalized_distance;
use super::types::{AddressQuery, AtomicCityEntry, MatchResult, ScoredCandidate};

/// Threshold used by the linking pipeline unless configured otherwise.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Stateless resolver bound to a published index.
#[derive(Debug, Clone, Copy)]
pub struct CityResolver<'a> {
    index: &'a PostalCodeIndex,
    threshold: f64,
}

impl<'a> CityResolver<'a> {
    pub fn new(index: &'a PostalCodeIndex, threshold: f64) -> Self {
        Self { index, threshold }
    }

    pub fn with_default_threshold(index: &'a PostalCodeIndex) -> Self {
        Self::new(index, DEFAULT_THRESHOLD)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn index(&self) -> &'a PostalCodeIndex {
        self.index
    }

    pub fn resolve(&self, query: &AddressQuery) -> MatchResult {
        self.resolve_scored(query).map(|c| c.to_match())
    }

    /// Like [`resolve`](Self::resolve) but keeps the winning distance.
    pub fn resolve_scored(&self, query: &AddressQuery) -> Option<ScoredCandidate> {
        let best = self.best_candidate(query)?;
        if best.distance <= self.threshold {
            Some(best)
        } else {
            None
        }
    }

    /// Lowest-distance candidate regardless of threshold.
    pub fn best_candidate(&self, query: &AddressQuery) -> Option<ScoredCandidate> {
        let (name, entries) = self.lookup(query)?;

        let mut best: Option<ScoredCandidate> = None;
        for entry in entries {
            let distance = normalized_distance(name, &entry.label);
            // Strict `<` keeps the earliest candidate on ties.
            if best.as_ref().map_or(true, |b| distance < b.distance) {
                best = Some(ScoredCandidate {
                    entity_id: entry.entity_id.clone(),
                    label: entry.label.clone(),
                    distance,
                });
            }
        }
        best
    }

    /// All candidates for the query's postal code, ascending by distance.
    /// Ties keep index order.
    pub fn ranked_candidates(&self, query: &AddressQuery) -> Vec<ScoredCandidate> {
        let Some((name, entries)) = self.lookup(query) else {
            return Vec::new();
        };
        let mut scored: Vec<ScoredCandidate> = entries
            .iter()
            .map(|e| ScoredCandidate {
                entity_id: e.entity_id.clone(),
                label: e.label.clone(),
                distance: normalized_distance(name, &e.label),
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored
    }

    fn lookup<'q>(&self, query: &'q AddressQuery) -> Option<(&'q str, &'a [AtomicCityEntry])> {
        let name = query.city_name.as_deref()?;
        let postal_code = query.postal_code.as_deref()?;
        let entries = self.index.candidates(postal_code)?;
        Some((name, entries))
    }
}

/// Resolve one query against `index`.
pub fn resolve(query: &AddressQuery, index: &PostalCodeIndex, threshold: f64) -> MatchResult {
    CityResolver::new(index, threshold).resolve(query)
}
