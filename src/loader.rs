//! CSV loaders and writers around the linking core.
//!
//! City dataset: `city;postalcode;cityLabel`, entity ids as full URIs.
//! Address dataset: the LEI golden-copy columns for legal and headquarters
//! addresses. Empty cells count as absent. Address cells holding only
//! whitespace are absent too; a blank city postal code is kept as a token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::config::LinkerConfig;
use crate::linking::{
    Address, AddressRecord, CityFact, IndexStats, LinkError, LinkSummary, LinkedRecord,
    RawCityRecord,
};

const CITY_COLUMNS: &[&str] = &["city", "postalcode", "cityLabel"];
const ADDRESS_COLUMNS: &[&str] = &["LEI"];

#[derive(Deserialize)]
struct CityRow {
    city: String,
    postalcode: Option<String>,
    #[serde(rename = "cityLabel")]
    city_label: String,
}

#[derive(Deserialize)]
struct AddressRow {
    #[serde(rename = "LEI")]
    lei: String,
    #[serde(rename = "Entity.LegalAddress.City", default)]
    legal_city: Option<String>,
    #[serde(rename = "Entity.LegalAddress.PostalCode", default)]
    legal_postal_code: Option<String>,
    #[serde(rename = "Entity.LegalAddress.Region", default)]
    legal_region: Option<String>,
    #[serde(rename = "Entity.HeadquartersAddress.City", default)]
    headquarters_city: Option<String>,
    #[serde(rename = "Entity.HeadquartersAddress.PostalCode", default)]
    headquarters_postal_code: Option<String>,
    #[serde(rename = "Entity.HeadquartersAddress.Region", default)]
    headquarters_region: Option<String>,
}

#[derive(Serialize)]
struct LinkedRow<'a> {
    owner_id: &'a str,
    legal_city_id: Option<&'a str>,
    legal_city_label: Option<&'a str>,
    headquarters_city_id: Option<&'a str>,
    headquarters_city_label: Option<&'a str>,
}

/// JSON document written next to the linked CSV.
#[derive(Debug, Serialize)]
pub struct FactsReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub index: &'a IndexStats,
    pub summary: &'a LinkSummary,
    pub cities: &'a [CityFact],
}

fn open(path: &Path) -> Result<File, LinkError> {
    File::open(path).map_err(|source| LinkError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn require_columns(
    headers: &csv::StringRecord,
    required: &[&str],
    origin: &str,
) -> Result<(), LinkError> {
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(LinkError::MissingColumn {
                column: column.to_string(),
                path: origin.to_string(),
            });
        }
    }
    Ok(())
}

/// Strip the configured URI prefix; ids without it are kept as-is.
pub fn normalize_entity_id(raw: &str, prefix: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix(prefix).unwrap_or(raw).to_string()
}

pub fn load_city_records(
    path: &Path,
    config: &LinkerConfig,
) -> Result<Vec<RawCityRecord>, LinkError> {
    let records = read_city_records(open(path)?, config, &path.display().to_string())?;
    tracing::info!(path = %path.display(), count = records.len(), "city records loaded");
    Ok(records)
}

/// Read city rows. Malformed rows are skipped with a warning.
pub fn read_city_records<R: Read>(
    reader: R,
    config: &LinkerConfig,
    origin: &str,
) -> Result<Vec<RawCityRecord>, LinkError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(config.city_delimiter as u8)
        .from_reader(reader);
    require_columns(rdr.headers()?, CITY_COLUMNS, origin)?;

    let mut records = Vec::new();
    for (line, row) in rdr.deserialize::<CityRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(origin, line = line + 2, error = %e, "skipping malformed city row");
                continue;
            }
        };
        records.push(RawCityRecord {
            entity_id: normalize_entity_id(&row.city, &config.entity_prefix),
            postal_code_token: row.postalcode.filter(|v| !v.is_empty()),
            label: row.city_label,
        });
    }
    Ok(records)
}

pub fn load_address_records(path: &Path) -> Result<Vec<AddressRecord>, LinkError> {
    let records = read_address_records(open(path)?, &path.display().to_string())?;
    tracing::info!(path = %path.display(), count = records.len(), "address records loaded");
    Ok(records)
}

/// Read address rows. Rows without an LEI are skipped.
pub fn read_address_records<R: Read>(
    reader: R,
    origin: &str,
) -> Result<Vec<AddressRecord>, LinkError> {
    let mut rdr = csv::Reader::from_reader(reader);
    require_columns(rdr.headers()?, ADDRESS_COLUMNS, origin)?;

    let mut records = Vec::new();
    for (line, row) in rdr.deserialize::<AddressRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(
                    origin,
                    line = line + 2,
                    error = %e,
                    "skipping malformed address row"
                );
                continue;
            }
        };
        if row.lei.trim().is_empty() {
            continue;
        }
        records.push(AddressRecord {
            owner_id: row.lei,
            legal: Address {
                city: present(row.legal_city),
                postal_code: present(row.legal_postal_code),
                region: present(row.legal_region),
            },
            headquarters: Address {
                city: present(row.headquarters_city),
                postal_code: present(row.headquarters_postal_code),
                region: present(row.headquarters_region),
            },
        });
    }
    Ok(records)
}

pub fn write_linked_csv<W: Write>(writer: W, linked: &[LinkedRecord]) -> Result<(), LinkError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for link in linked {
        wtr.serialize(LinkedRow {
            owner_id: &link.owner_id,
            legal_city_id: link.legal.as_ref().map(|c| c.entity_id.as_str()),
            legal_city_label: link.legal.as_ref().map(|c| c.label.as_str()),
            headquarters_city_id: link.headquarters.as_ref().map(|c| c.entity_id.as_str()),
            headquarters_city_label: link.headquarters.as_ref().map(|c| c.label.as_str()),
        })?;
    }
    wtr.flush().map_err(|source| LinkError::Io {
        path: "<linked output>".into(),
        source,
    })?;
    Ok(())
}

pub fn write_facts_json<W: Write>(writer: W, report: &FactsReport<'_>) -> Result<(), LinkError> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}
