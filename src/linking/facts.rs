//! Per-city facts handed to the graph emitter: one entry per distinct
//! matched city with its labels, same-as link and dominant region.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::pipeline::{AddressRecord, LinkedRecord};

/// Base URI for same-as links to the external knowledge base.
pub const DEFAULT_SAME_AS_BASE: &str = "http://www.wikidata.org/wiki/Q";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityFact {
    pub entity_id: String,
    /// Every distinct label the city was matched with, first seen first
    pub labels: Vec<String>,
    pub same_as: String,
    /// Region most often seen on addresses linked to this city
    pub region: Option<String>,
}

/// Collect city facts in first-seen order (legal before headquarters).
///
/// A city collects each distinct label it was matched with. Its region is the one
/// co-occurring most often across all linked addresses; ties go to the
/// lexicographically smallest region.
pub fn derive_city_facts(
    records: &[AddressRecord],
    linked: &[LinkedRecord],
    same_as_base: &str,
) -> Vec<CityFact> {
    let mut order: Vec<String> = Vec::new();
    let mut labels: HashMap<String, Vec<String>> = HashMap::new();
    let mut regions: HashMap<String, BTreeMap<String, usize>> = HashMap::new();

    for (record, link) in records.iter().zip(linked) {
        let pairs = [
            (&link.legal, &record.legal.region),
            (&link.headquarters, &record.headquarters.region),
        ];
        for (matched, region) in pairs {
            let Some(city) = matched else { continue };
            if !regions.contains_key(&city.entity_id) {
                order.push(city.entity_id.clone());
            }
            let seen = labels.entry(city.entity_id.clone()).or_default();
            if !seen.contains(&city.label) {
                seen.push(city.label.clone());
            }
            let counts = regions.entry(city.entity_id.clone()).or_default();
            if let Some(region) = region {
                *counts.entry(region.clone()).or_insert(0) += 1;
            }
        }
    }

    order
        .into_iter()
        .map(|entity_id| {
            let region = regions.get(&entity_id).and_then(dominant_region);
            CityFact {
                same_as: format!("{}{}", same_as_base, entity_id),
                labels: labels.remove(&entity_id).unwrap_or_default(),
                entity_id,
                region,
            }
        })
        .collect()
}

fn dominant_region(counts: &BTreeMap<String, usize>) -> Option<String> {
    let mut best: Option<(&String, usize)> = None;
    for (region, &count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((region, count));
        }
    }
    best.map(|(r, _)| r.clone())
}
