use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::trace;

use crate::record::{Record, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

/// Single key sort. No key keeps the load order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn by(key: &str, direction: SortDirection) -> Self {
        SortState {
            key: Some(key.to_string()).filter(|k| !k.is_empty()),
            direction,
        }
    }

    pub fn active_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }

    /// Header click: the active ascending key flips to descending, everything else sorts ascending.
    pub fn toggle(&self, key: &str) -> SortState {
        let direction =
            if self.active_key() == Some(key) && self.direction == SortDirection::Ascending {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
        SortState::by(key, direction)
    }
}

/// Total order over cells: absent or empty values first, then numbers, then text.
/// Numbers use `f64::total_cmp`, so NaN has a fixed place.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            Some(Value::Number(_)) => 1,
            Some(Value::Text(t)) if !t.is_empty() => 2,
            _ => 0,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.total_cmp(y),
        (Some(Value::Text(x)), Some(Value::Text(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Stable sort of `rows` (positions into `records`).
pub fn sort(records: &[Record], rows: &[usize], state: &SortState) -> Vec<usize> {
    let mut sorted = rows.to_vec();
    let Some(key) = state.active_key() else {
        return sorted;
    };

    // Descending flips the comparator; ties keep their input order in both directions.
    match state.direction {
        SortDirection::Ascending => sorted.sort_by(|&a, &b| {
            compare_values(records[a].field(key), records[b].field(key))
        }),
        SortDirection::Descending => sorted.sort_by(|&a, &b| {
            compare_values(records[b].field(key), records[a].field(key))
        }),
    }
    trace!("Sorted {} rows by {key} {:?}", sorted.len(), state.direction);
    sorted
}
