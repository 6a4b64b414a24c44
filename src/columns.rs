use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::trace;

use crate::domain::TVError;
use crate::record::Value;

const DATETIME_DISPLAY: &str = "%Y-%m-%d %H:%M:%S";
const MISSING_CELL: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnFormat {
    #[default]
    Plain,
    DateTime,
}

impl ColumnFormat {
    /// Display text of a cell. Only text cells are formatted, absent cells show `N/A`.
    pub fn render(&self, value: Option<&Value>) -> String {
        match (self, value) {
            (_, None) | (_, Some(Value::Null)) => MISSING_CELL.to_string(),
            (ColumnFormat::DateTime, Some(Value::Text(s))) => Self::format_datetime(s),
            (_, Some(v)) => {
                let text = v.as_text();
                if text.is_empty() {
                    MISSING_CELL.to_string()
                } else {
                    text
                }
            }
        }
    }

    fn format_datetime(s: &str) -> String {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return dt.with_timezone(&Local).format(DATETIME_DISPLAY).to_string();
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return dt.format(DATETIME_DISPLAY).to_string();
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            && let Some(dt) = d.and_hms_opt(0, 0, 0)
        {
            return dt.format(DATETIME_DISPLAY).to_string();
        }
        s.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub format: ColumnFormat,
}

impl ColumnDescriptor {
    pub fn new(id: &str, label: &str) -> Self {
        ColumnDescriptor {
            id: id.to_string(),
            label: label.to_string(),
            format: ColumnFormat::Plain,
        }
    }

    pub fn datetime(id: &str, label: &str) -> Self {
        ColumnDescriptor {
            format: ColumnFormat::DateTime,
            ..Self::new(id, label)
        }
    }
}

/// Ordered column set. Ids are unique, reordering only permutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnLayout(Vec<ColumnDescriptor>);

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::canonical()
    }
}

impl ColumnLayout {
    /// The FMCSA carrier schema in its canonical order.
    pub fn canonical() -> Self {
        ColumnLayout(vec![
            ColumnDescriptor::datetime("created_dt", "Created_DT"),
            ColumnDescriptor::datetime("data_source_modified_dt", "Modified_DT"),
            ColumnDescriptor::new("entity_type", "Entity"),
            ColumnDescriptor::new("operating_status", "Operating status"),
            ColumnDescriptor::new("legal_name", "Legal name"),
            ColumnDescriptor::new("dba_name", "DBA name"),
            ColumnDescriptor::new("physical_address", "Physical address"),
            ColumnDescriptor::new("phone", "Phone"),
            ColumnDescriptor::new("usdot_number", "DOT"),
            ColumnDescriptor::new("mc_mx_ff_number", "MC/MX/FF"),
            ColumnDescriptor::new("power_units", "Power units"),
            ColumnDescriptor::new("out_of_service_date", "Out of service date"),
        ])
    }

    pub fn from_descriptors(columns: Vec<ColumnDescriptor>) -> Result<Self, TVError> {
        let layout = ColumnLayout(columns);
        if !layout.has_unique_ids() {
            return Err(TVError::MalformedSnapshot(
                "column ids are not unique".to_string(),
            ));
        }
        Ok(layout)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, idx: usize) -> Option<&ColumnDescriptor> {
        self.0.get(idx)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.id.as_str())
    }

    pub fn has_unique_ids(&self) -> bool {
        let mut seen = HashSet::new();
        self.0.iter().all(|c| seen.insert(c.id.as_str()))
    }

    /// True if both layouts hold the same unique ids, in any order.
    pub fn is_permutation_of(&self, other: &ColumnLayout) -> bool {
        if self.len() != other.len() || !self.has_unique_ids() {
            return false;
        }
        let ours: HashSet<&str> = self.ids().collect();
        other.ids().all(|id| ours.contains(id))
    }

    /// Take the column at `from` out and insert it at `to`.
    pub fn reorder(&self, from: usize, to: usize) -> Result<ColumnLayout, TVError> {
        let len = self.0.len();
        if from >= len || to >= len {
            return Err(TVError::InvalidColumnMove { from, to, len });
        }
        let mut columns = self.0.clone();
        let moved = columns.remove(from);
        columns.insert(to, moved);
        trace!("Moved column {} from {from} to {to}", columns[to].id);
        Ok(ColumnLayout(columns))
    }

    pub fn reset(&self) -> ColumnLayout {
        Self::canonical()
    }
}
