//! Linking of company address records to city entities.
//!
//! Each record carries a legal and a headquarters address. When both share
//! the same (city, postal code) pair the resolver runs once and the result
//! is reused for both.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::resolver::CityResolver;
use super::types::{AddressQuery, MatchResult};

/// One postal address as it appears on a company record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub region: Option<String>,
}

impl Address {
    pub fn query(&self) -> AddressQuery {
        AddressQuery {
            city_name: self.city.clone(),
            postal_code: self.postal_code.clone(),
        }
    }
}

/// A company record with its two addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub owner_id: String,
    pub legal: Address,
    pub headquarters: Address,
}

/// Resolution outcome for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedRecord {
    pub owner_id: String,
    pub legal: MatchResult,
    pub headquarters: MatchResult,
}

/// Counters for a linking run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    pub records: usize,
    pub legal_matched: usize,
    pub headquarters_matched: usize,
    /// Records whose headquarters result was reused from the legal address.
    pub reused: usize,
}

/// Link a single record using `resolve` for each distinct address.
pub fn link_record_with<F>(record: &AddressRecord, resolve: F) -> LinkedRecord
where
    F: Fn(&AddressQuery) -> MatchResult,
{
    let legal_query = record.legal.query();
    let headquarters_query = record.headquarters.query();

    let legal = resolve(&legal_query);
    let headquarters = if headquarters_query == legal_query {
        legal.clone()
    } else {
        resolve(&headquarters_query)
    };

    LinkedRecord {
        owner_id: record.owner_id.clone(),
        legal,
        headquarters,
    }
}

pub fn link_record(record: &AddressRecord, resolver: &CityResolver<'_>) -> LinkedRecord {
    link_record_with(record, |q| resolver.resolve(q))
}

/// Link all records in parallel. Output order matches input order.
pub fn link_records(records: &[AddressRecord], resolver: &CityResolver<'_>) -> Vec<LinkedRecord> {
    records
        .par_iter()
        .map(|record| link_record(record, resolver))
        .collect()
}

pub fn summarize(records: &[AddressRecord], linked: &[LinkedRecord]) -> LinkSummary {
    LinkSummary {
        records: linked.len(),
        legal_matched: linked.iter().filter(|l| l.legal.is_some()).count(),
        headquarters_matched: linked.iter().filter(|l| l.headquarters.is_some()).count(),
        reused: records
            .iter()
            .filter(|r| r.legal.query() == r.headquarters.query())
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linking::index::PostalCodeIndex;
    use crate::linking::types::RawCityRecord;
    use std::cell::Cell;

    fn address(city: Option<&str>, postal_code: Option<&str>) -> Address {
        Address {
            city: city.map(String::from),
            postal_code: postal_code.map(String::from),
            region: None,
        }
    }

    fn record(owner: &str, legal: Address, headquarters: Address) -> AddressRecord {
        AddressRecord {
            owner_id: owner.into(),
            legal,
            headquarters,
        }
    }

    fn index() -> PostalCodeIndex {
        PostalCodeIndex::build(&[
            RawCityRecord::new("Q72", Some("8000,8001"), "Zurich"),
            RawCityRecord::new("Q71", Some("1200\u{2013}1209"), "Geneva"),
        ])
    }

    #[test]
    fn test_identical_addresses_resolved_once() {
        let calls = Cell::new(0);
        let rec = record(
            "LEI1",
            address(Some("Zurich"), Some("8000")),
            address(Some("Zurich"), Some("8000")),
        );
        let linked = link_record_with(&rec, |_| {
            calls.set(calls.get() + 1);
            None
        });
        assert_eq!(calls.get(), 1);
        assert_eq!(linked.legal, linked.headquarters);
    }

    #[test]
    fn test_distinct_addresses_resolved_separately() {
        let calls = Cell::new(0);
        let rec = record(
            "LEI1",
            address(Some("Zurich"), Some("8000")),
            address(Some("Zurich"), Some("8001")),
        );
        link_record_with(&rec, |_| {
            calls.set(calls.get() + 1);
            None
        });
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_link_records_preserves_order() {
        let index = index();
        let resolver = CityResolver::new(&index, 0.3);
        let records: Vec<AddressRecord> = (0..50)
            .map(|i| {
                let (city, code) = if i % 2 == 0 {
                    ("Zürich", "8001")
                } else {
                    ("Geneve", "1204")
                };
                record(&format!("LEI{}", i), address(Some(city), Some(code)), Address::default())
            })
            .collect();

        let linked = link_records(&records, &resolver);
        assert_eq!(linked.len(), 50);
        for (i, l) in linked.iter().enumerate() {
            assert_eq!(l.owner_id, format!("LEI{}", i));
            let expected = if i % 2 == 0 { "Q72" } else { "Q71" };
            assert_eq!(l.legal.as_ref().unwrap().entity_id, expected);
            assert!(l.headquarters.is_none());
        }
    }

    #[test]
    fn test_summary() {
        let index = index();
        let resolver = CityResolver::new(&index, 0.3);
        let records = vec![
            record(
                "A",
                address(Some("Zurich"), Some("8000")),
                address(Some("Zurich"), Some("8000")),
            ),
            record(
                "B",
                address(Some("Basel"), Some("4000")),
                address(Some("Geneva"), Some("1201")),
            ),
        ];
        let linked = link_records(&records, &resolver);
        let summary = summarize(&records, &linked);
        assert_eq!(
            summary,
            LinkSummary {
                records: 2,
                legal_matched: 1,
                headquarters_matched: 2,
                reused: 1,
            }
        );
    }
}
