//! City linking subsystem.
//!
//! Builds a postal-code index of city entities and resolves address
//! (city name, postal code) pairs against it with normalized edit distance.

pub mod facts;
pub mod index;
pub mod pipeline;
pub mod resolver;
pub mod similarity;
pub mod types;

pub use facts::{derive_city_facts, CityFact, DEFAULT_SAME_AS_BASE};
pub use index::{
    unfold_token, IndexOptions, IndexStats, PostalCodeIndex, DEFAULT_RANGE_SEPARATOR,
};
pub use pipeline::{link_records, summarize, Address, AddressRecord, LinkSummary, LinkedRecord};
pub use resolver::{resolve, CityResolver, DEFAULT_THRESHOLD};
pub use similarity::normalized_distance;
pub use types::{
    AddressQuery, AtomicCityEntry, CityMatch, LinkError, MatchResult, RawCityRecord,
    ScoredCandidate,
};
