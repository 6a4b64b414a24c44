use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::trace;

use crate::record::Record;

/// Global free text plus per column filters. Absent columns are unfiltered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub global_text: String,
    pub per_column: BTreeMap<String, String>,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        !self.global_text.is_empty() || !self.per_column.is_empty()
    }

    /// An empty text clears the column filter.
    pub fn set_column(&mut self, column: &str, text: &str) {
        if text.is_empty() {
            self.per_column.remove(column);
        } else {
            self.per_column.insert(column.to_string(), text.to_string());
        }
    }

    pub fn column(&self, column: &str) -> Option<&str> {
        self.per_column.get(column).map(String::as_str)
    }
}

/// Lower cased terms, prepared once per pipeline run.
struct Predicate {
    global: String,
    columns: Vec<(String, String)>,
}

impl Predicate {
    fn new(state: &FilterState) -> Self {
        Predicate {
            global: state.global_text.to_lowercase(),
            columns: state
                .per_column
                .iter()
                .filter(|(_, text)| !text.is_empty())
                .map(|(id, text)| (id.clone(), text.to_lowercase()))
                .collect(),
        }
    }

    fn matches_global(&self, record: &Record) -> bool {
        self.global.is_empty()
            || record
                .values()
                .any(|v| v.as_text().to_lowercase().contains(&self.global))
    }

    fn matches_columns(&self, record: &Record) -> bool {
        self.columns.iter().all(|(id, term)| {
            record
                .field(id)
                .is_some_and(|v| v.as_text().to_lowercase().contains(term))
        })
    }

    fn matches(&self, record: &Record) -> bool {
        self.matches_global(record) && self.matches_columns(record)
    }
}

/// Positions of the records passing `state`, in input order.
pub fn filter(records: &[Record], state: &FilterState) -> Vec<usize> {
    if !state.is_active() {
        return (0..records.len()).collect();
    }
    let start_time = Instant::now();
    let predicate = Predicate::new(state);
    let rows: Vec<usize> = (0..records.len())
        .into_par_iter()
        .filter(|&idx| predicate.matches(&records[idx]))
        .collect();
    trace!(
        "Filter kept {}/{} records in {}ms",
        rows.len(),
        records.len(),
        start_time.elapsed().as_millis()
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn dataset() -> Vec<Record> {
        vec![
            Record::new()
                .with("legal_name", "Acme Trucking")
                .with("entity_type", "CARRIER")
                .with("power_units", 12.0),
            Record::new()
                .with("legal_name", "Blue Ridge")
                .with("entity_type", "BROKER"),
            Record::new()
                .with("legal_name", "Coastline")
                .with("entity_type", Value::Null)
                .with("power_units", 120.0),
            Record::new().with("dba_name", "ACME"),
        ]
    }

    fn state(global: &str, columns: &[(&str, &str)]) -> FilterState {
        let mut s = FilterState {
            global_text: global.to_string(),
            ..Default::default()
        };
        for (c, t) in columns {
            s.set_column(c, t);
        }
        s
    }

    #[test]
    fn empty_filter_is_identity() {
        let data = dataset();
        assert_eq!(filter(&data, &FilterState::default()), vec![0, 1, 2, 3]);
        assert!(filter(&[], &FilterState::default()).is_empty());
    }

    #[test]
    fn global_text_is_case_insensitive_over_all_fields() {
        let data = dataset();
        assert_eq!(filter(&data, &state("acme", &[])), vec![0, 3]);
        assert_eq!(filter(&data, &state("12", &[])), vec![0, 2]);
        assert!(filter(&data, &state("nowhere", &[])).is_empty());
    }

    #[test]
    fn column_filter_excludes_absent_fields() {
        let data = dataset();
        assert_eq!(filter(&data, &state("", &[("entity_type", "car")])), vec![0]);
        assert_eq!(filter(&data, &state("", &[("entity_type", "R")])), vec![0, 1]);
        // Records 1 and 3 have no power_units at all.
        assert_eq!(filter(&data, &state("", &[("power_units", "1")])), vec![0, 2]);
    }

    #[test]
    fn global_and_columns_are_combined() {
        let data = dataset();
        let s = state("e", &[("entity_type", "r")]);
        let kept = filter(&data, &s);
        assert_eq!(kept, vec![0, 1]);

        // Every excluded record fails at least one clause.
        let p = Predicate::new(&s);
        for (idx, r) in data.iter().enumerate() {
            assert_eq!(kept.contains(&idx), p.matches_global(r) && p.matches_columns(r));
        }
    }

    #[test]
    fn clearing_a_column_filter_removes_it() {
        let mut s = state("", &[("legal_name", "acme")]);
        assert!(s.is_active());
        s.set_column("legal_name", "");
        assert!(!s.is_active());
        assert_eq!(s.column("legal_name"), None);
    }
}
