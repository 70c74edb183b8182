//! Postal-code index over city entities.
//!
//! Raw postal-code tokens are unfolded in two strict phases: comma lists
//! first, then ranges on whatever the comma phase produced. Tokens that
//! cannot be expanded are kept verbatim. Each phase keeps the items it leaves
//! alone in input order and appends what it unfolds after them. Entries are
//! then deduplicated and grouped by atomic postal code, keeping the first
//! occurrence.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::types::{AtomicCityEntry, RawCityRecord};

/// En dash, the separator used by the city dataset for ranges like `01000–01005`.
pub const DEFAULT_RANGE_SEPARATOR: char = '\u{2013}';

/// Options controlling token unfolding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOptions {
    pub range_separator: char,
    /// Ranges spanning more than this many codes are retained unexpanded.
    pub max_range_span: Option<u64>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            range_separator: DEFAULT_RANGE_SEPARATOR,
            max_range_span: None,
        }
    }
}

/// Summary numbers for an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub postal_codes: usize,
    pub entries: usize,
    pub entities: usize,
    /// Tokens with a range separator that were kept unexpanded.
    pub retained_tokens: usize,
    /// Records dropped because they had no postal code.
    pub dropped_records: usize,
}

/// Immutable mapping from atomic postal code to its candidate entries.
#[derive(Debug, Clone, Default)]
pub struct PostalCodeIndex {
    groups: BTreeMap<String, Vec<AtomicCityEntry>>,
    retained_tokens: usize,
    dropped_records: usize,
}

/// What one unfolding phase does with a single item. Items that pass through
/// keep their relative order; replaced items are appended after all of them.
enum Unfold {
    InPlace(AtomicCityEntry),
    Moved(Vec<AtomicCityEntry>),
}

fn settle(items: Vec<Unfold>) -> Vec<AtomicCityEntry> {
    let mut kept = Vec::with_capacity(items.len());
    let mut moved = Vec::new();
    for item in items {
        match item {
            Unfold::InPlace(entry) => kept.push(entry),
            Unfold::Moved(entries) => moved.extend(entries),
        }
    }
    kept.extend(moved);
    kept
}

impl PostalCodeIndex {
    /// Build the index with default options.
    pub fn build(records: &[RawCityRecord]) -> Self {
        Self::build_with_options(records, &IndexOptions::default())
    }

    /// Build the index. Each phase maps its items in parallel and is then
    /// settled in input order; deduplication and grouping run last, so the
    /// result is deterministic.
    pub fn build_with_options(records: &[RawCityRecord], opts: &IndexOptions) -> Self {
        let mut index = PostalCodeIndex::default();

        let with_token: Vec<&RawCityRecord> = records
            .iter()
            .filter(|r| r.postal_code_token.is_some())
            .collect();
        index.dropped_records = records.len() - with_token.len();

        let phase1: Vec<Unfold> = with_token.par_iter().map(|r| comma_phase(r)).collect();
        let (phase2, retained): (Vec<Unfold>, Vec<bool>) = settle(phase1)
            .into_par_iter()
            .map(|entry| range_phase(entry, opts))
            .unzip();
        index.retained_tokens = retained.into_iter().filter(|r| *r).count();

        let mut seen: HashSet<AtomicCityEntry> = HashSet::new();
        for entry in settle(phase2) {
            if seen.contains(&entry) {
                continue;
            }
            seen.insert(entry.clone());
            index
                .groups
                .entry(entry.postal_code.clone())
                .or_default()
                .push(entry);
        }

        index
    }

    /// Candidates sharing `postal_code`, in index order.
    pub fn candidates(&self, postal_code: &str) -> Option<&[AtomicCityEntry]> {
        self.groups.get(postal_code).map(|v| v.as_slice())
    }

    pub fn contains(&self, postal_code: &str) -> bool {
        self.groups.contains_key(postal_code)
    }

    /// Number of distinct atomic postal codes.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate postal codes (sorted) with their entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[AtomicCityEntry])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn stats(&self) -> IndexStats {
        let entities: HashSet<&str> = self
            .groups
            .values()
            .flatten()
            .map(|e| e.entity_id.as_str())
            .collect();
        IndexStats {
            postal_codes: self.groups.len(),
            entries: self.groups.values().map(Vec::len).sum(),
            entities: entities.len(),
            retained_tokens: self.retained_tokens,
            dropped_records: self.dropped_records,
        }
    }
}

fn comma_phase(record: &RawCityRecord) -> Unfold {
    let token = record.postal_code_token.as_deref().unwrap_or_default();
    if token.contains(',') {
        Unfold::Moved(
            unfold_commas(token)
                .into_iter()
                .map(|part| AtomicCityEntry::derive(record, part))
                .collect(),
        )
    } else {
        Unfold::InPlace(AtomicCityEntry::derive(record, token.to_string()))
    }
}

/// The flag is set when a token carrying the separator stays unexpanded.
fn range_phase(entry: AtomicCityEntry, opts: &IndexOptions) -> (Unfold, bool) {
    let has_sep = entry.postal_code.contains(opts.range_separator);
    if !is_range_candidate(&entry.postal_code, opts) {
        return (Unfold::InPlace(entry), has_sep);
    }
    match unfold_range(&entry.postal_code, opts) {
        Some(codes) => {
            let expanded = codes
                .into_iter()
                .map(|postal_code| AtomicCityEntry {
                    postal_code,
                    ..entry.clone()
                })
                .collect();
            (Unfold::Moved(expanded), false)
        }
        None => {
            tracing::debug!(
                entity = %entry.entity_id,
                token = %entry.postal_code,
                "range not expandable, retaining token"
            );
            (Unfold::Moved(vec![entry]), true)
        }
    }
}

fn is_range_candidate(token: &str, opts: &IndexOptions) -> bool {
    token.matches(opts.range_separator).count() == 1
}

/// Unfold a raw token into its atomic postal codes, applying both phases.
/// Codes that needed no range expansion come first.
pub fn unfold_token(token: &str, opts: &IndexOptions) -> Vec<String> {
    let (ranges, mut codes): (Vec<String>, Vec<String>) = unfold_commas(token)
        .into_iter()
        .partition(|part| is_range_candidate(part, opts));
    for part in ranges {
        match unfold_range(&part, opts) {
            Some(expanded) => codes.extend(expanded),
            None => codes.push(part),
        }
    }
    codes
}

/// Phase 1: split on commas and trim each part. Tokens without a comma pass
/// through untouched.
fn unfold_commas(token: &str) -> Vec<String> {
    if !token.contains(',') {
        return vec![token.to_string()];
    }
    token.split(',').map(|p| p.trim().to_string()).collect()
}

/// Phase 2: expand `first<sep>second` into every code in between, or `None`
/// when the token is not an expandable range.
fn unfold_range(token: &str, opts: &IndexOptions) -> Option<Vec<String>> {
    if !is_range_candidate(token, opts) {
        return None;
    }
    let (first, second) = token.split_once(opts.range_separator)?;

    if first.contains('-') || second.contains('-') {
        return None;
    }
    let width = first.chars().count();
    if width != second.chars().count() {
        return None;
    }
    let lo = parse_bound(first)?;
    let hi = parse_bound(second)?;
    if lo > hi {
        return None;
    }
    if let Some(max) = opts.max_range_span {
        if hi - lo > u128::from(max) {
            return None;
        }
    }

    Some(expand_range(lo, hi, width))
}

fn parse_bound(s: &str) -> Option<u128> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Inclusive range, zero-padded to `width`. Callers have already checked
/// the bounds; a descending range here is a bug in the guards.
fn expand_range(lo: u128, hi: u128, width: usize) -> Vec<String> {
    assert!(lo <= hi, "range guard let through descending bounds {}..{}", lo, hi);
    (lo..=hi).map(|n| format!("{:0width$}", n, width = width)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, token: &str, label: &str) -> RawCityRecord {
        RawCityRecord::new(id, Some(token), label)
    }

    fn codes(index: &PostalCodeIndex) -> Vec<&str> {
        index.iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_comma_unfolding() {
        let index = PostalCodeIndex::build(&[rec("Q1", "a, b,c", "Town")]);
        assert_eq!(codes(&index), vec!["a", "b", "c"]);
        for code in ["a", "b", "c"] {
            let entries = index.candidates(code).unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].entity_id, "Q1");
            assert_eq!(entries[0].label, "Town");
        }
        assert!(!index.contains("a, b,c"));
    }

    #[test]
    fn test_range_unfolding() {
        let opts = IndexOptions::default();
        assert_eq!(
            unfold_token("01000\u{2013}01005", &opts),
            vec!["01000", "01001", "01002", "01003", "01004", "01005"]
        );
    }

    #[test]
    fn test_range_single_code() {
        let opts = IndexOptions::default();
        assert_eq!(unfold_token("0500\u{2013}0500", &opts), vec!["0500"]);
    }

    #[test]
    fn test_range_fallback_retention() {
        let opts = IndexOptions::default();
        for token in [
            "100\u{2013}1000",
            "12A\u{2013}12B",
            "1-2\u{2013}3-4",
            "10\u{2013}20\u{2013}30",
            "\u{2013}",
            "200\u{2013}100",
        ] {
            assert_eq!(unfold_token(token, &opts), vec![token.to_string()], "{}", token);
        }

        let index = PostalCodeIndex::build(&[rec("Q9", "12A\u{2013}12B", "Nowhere")]);
        assert_eq!(codes(&index), vec!["12A\u{2013}12B"]);
        assert_eq!(index.stats().retained_tokens, 1);
    }

    #[test]
    fn test_comma_then_range() {
        let opts = IndexOptions::default();
        assert_eq!(
            unfold_token("8000, 8010\u{2013}8012", &opts),
            vec!["8000", "8010", "8011", "8012"]
        );
    }

    #[test]
    fn test_custom_separator() {
        let opts = IndexOptions {
            range_separator: '~',
            max_range_span: None,
        };
        assert_eq!(unfold_token("10~12", &opts), vec!["10", "11", "12"]);
        assert_eq!(
            unfold_token("10\u{2013}12", &opts),
            vec!["10\u{2013}12".to_string()]
        );
    }

    #[test]
    fn test_max_range_span() {
        let opts = IndexOptions {
            max_range_span: Some(2),
            ..IndexOptions::default()
        };
        assert_eq!(unfold_token("10\u{2013}12", &opts).len(), 3);
        assert_eq!(unfold_token("10\u{2013}13", &opts), vec!["10\u{2013}13"]);
    }

    #[test]
    fn test_missing_token_dropped() {
        let index = PostalCodeIndex::build(&[
            RawCityRecord::new("Q1", None, "Ghost"),
            rec("Q2", "3000", "Bern"),
        ]);
        assert_eq!(codes(&index), vec!["3000"]);
        assert_eq!(index.stats().dropped_records, 1);
    }

    #[test]
    fn test_unfolded_entries_follow_plain_ones() {
        let index = PostalCodeIndex::build(&[
            rec("Q3", "7999\u{2013}8000", "Other"),
            rec("Q1", "8000,8001", "Zurich"),
            rec("Q2", "8000", "Zürich"),
            rec("Q2", "8000", "Zürich"),
        ]);
        let ids: Vec<&str> = index
            .candidates("8000")
            .unwrap()
            .iter()
            .map(|e| e.entity_id.as_str())
            .collect();
        assert_eq!(ids, vec!["Q2", "Q1", "Q3"]);
        assert_eq!(index.candidates("8001").unwrap().len(), 1);
    }

    #[test]
    fn test_range_retention_after_comma_parts() {
        let index = PostalCodeIndex::build(&[
            rec("Q1", "12A\u{2013}12B", "Kept"),
            rec("Q2", "12A\u{2013}12B, 500", "Split"),
            rec("Q3", "12A\u{2013}12B", "Plain"),
        ]);
        let ids: Vec<&str> = index
            .candidates("12A\u{2013}12B")
            .unwrap()
            .iter()
            .map(|e| e.entity_id.as_str())
            .collect();
        assert_eq!(ids, vec!["Q1", "Q3", "Q2"]);
        assert_eq!(index.stats().retained_tokens, 3);
    }

    #[test]
    fn test_unfold_token_plain_codes_first() {
        let opts = IndexOptions::default();
        assert_eq!(
            unfold_token("8010\u{2013}8011, 8000", &opts),
            vec!["8000", "8010", "8011"]
        );
    }

    #[test]
    fn test_wide_numeric_bounds() {
        let opts = IndexOptions::default();
        let big = "123456789012345678901";
        let token = format!("{}\u{2013}{}", big, big);
        assert_eq!(unfold_token(&token, &opts), vec![big.to_string()]);
    }

    #[test]
    fn test_same_entity_different_label_kept() {
        let index = PostalCodeIndex::build(&[
            rec("Q1", "8000", "Zurich"),
            rec("Q1", "8000", "Zürich"),
        ]);
        assert_eq!(index.candidates("8000").unwrap().len(), 2);
    }

    #[test]
    fn test_deterministic() {
        let records: Vec<RawCityRecord> = (0..200)
            .map(|i| rec(&format!("Q{}", i % 17), &format!("{:04}", i % 23), "X"))
            .collect();
        let a = PostalCodeIndex::build(&records);
        let b = PostalCodeIndex::build(&records);
        let flat = |idx: &PostalCodeIndex| -> Vec<AtomicCityEntry> {
            idx.iter().flat_map(|(_, e)| e.to_vec()).collect()
        };
        assert_eq!(flat(&a), flat(&b));
    }

    #[test]
    fn test_stats() {
        let index = PostalCodeIndex::build(&[
            rec("Q1", "8000,8001", "Zurich"),
            rec("Q2", "1200", "Geneva"),
        ]);
        let stats = index.stats();
        assert_eq!(stats.postal_codes, 3);
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.retained_tokens, 0);
    }

    #[test]
    #[should_panic(expected = "descending")]
    fn test_expand_range_asserts_order() {
        expand_range(5, 4, 1);
    }
}
