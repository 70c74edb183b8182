//! Core types for the city linking subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A city entity row as read from the external city dataset.
///
/// `postal_code_token` is the raw, irregular field: a single code, a
/// comma-separated list, or a two-sided range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCityRecord {
    pub entity_id: String,
    pub postal_code_token: Option<String>,
    pub label: String,
}

impl RawCityRecord {
    pub fn new(entity_id: &str, postal_code_token: Option<&str>, label: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            postal_code_token: postal_code_token.map(|s| s.to_string()),
            label: label.to_string(),
        }
    }
}

/// The unfolded, indexable unit: one entity under one atomic postal code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtomicCityEntry {
    pub entity_id: String,
    pub postal_code: String,
    pub label: String,
}

impl AtomicCityEntry {
    pub(crate) fn derive(record: &RawCityRecord, postal_code: String) -> Self {
        Self {
            entity_id: record.entity_id.clone(),
            postal_code,
            label: record.label.clone(),
        }
    }
}

/// City name + postal code pulled from one address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressQuery {
    pub city_name: Option<String>,
    pub postal_code: Option<String>,
}

impl AddressQuery {
    pub fn new(city_name: Option<&str>, postal_code: Option<&str>) -> Self {
        Self {
            city_name: city_name.map(|s| s.to_string()),
            postal_code: postal_code.map(|s| s.to_string()),
        }
    }
}

/// A resolved city entity. A `MatchResult` is `Option<CityMatch>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CityMatch {
    pub entity_id: String,
    pub label: String,
}

pub type MatchResult = Option<CityMatch>;

impl fmt::Display for CityMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.entity_id)
    }
}

/// A candidate together with its normalized distance to the queried name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub entity_id: String,
    pub label: String,
    /// Normalized edit distance in [0.0, 1.0]
    pub distance: f64,
}

impl ScoredCandidate {
    pub fn to_match(&self) -> CityMatch {
        CityMatch {
            entity_id: self.entity_id.clone(),
            label: self.label.clone(),
        }
    }
}

/// Errors from the I/O and configuration layers.
///
/// The index builder and resolver never produce these: malformed or absent
/// data degrades to fallback entries or "no match".
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Required column '{column}' is missing from '{path}'")]
    MissingColumn { column: String, path: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
