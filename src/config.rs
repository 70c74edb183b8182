//! Linker configuration at <config_dir>/citylink/config.json.
//!
//! Every field has a default, so partial files are fine. A missing default
//! file means "use defaults"; an explicit path that cannot be read is an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::linking::{
    IndexOptions, LinkError, DEFAULT_RANGE_SEPARATOR, DEFAULT_SAME_AS_BASE, DEFAULT_THRESHOLD,
};

/// Prefix carried by entity ids in the raw city dataset.
pub const DEFAULT_ENTITY_PREFIX: &str = "http://www.wikidata.org/entity/Q";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Maximum normalized distance accepted as a match
    pub threshold: f64,
    pub range_separator: char,
    pub max_range_span: Option<u64>,
    pub entity_prefix: String,
    pub same_as_base: String,
    pub city_delimiter: char,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            range_separator: DEFAULT_RANGE_SEPARATOR,
            max_range_span: None,
            entity_prefix: DEFAULT_ENTITY_PREFIX.to_string(),
            same_as_base: DEFAULT_SAME_AS_BASE.to_string(),
            city_delimiter: ';',
        }
    }
}

impl LinkerConfig {
    /// Load from `explicit` if given, else from the default location if it
    /// exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, LinkError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, LinkError> {
        let data = fs::read_to_string(path).map_err(|source| LinkError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("citylink").join("config.json"))
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(LinkError::InvalidConfig(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.range_separator == ',' {
            return Err(LinkError::InvalidConfig(
                "range separator cannot be a comma".into(),
            ));
        }
        if !self.city_delimiter.is_ascii() {
            return Err(LinkError::InvalidConfig(format!(
                "CSV delimiter must be a single ASCII character, got '{}'",
                self.city_delimiter
            )));
        }
        Ok(())
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            range_separator: self.range_separator,
            max_range_span: self.max_range_span,
        }
    }
}
