use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::columns::{ColumnDescriptor, ColumnLayout};
use crate::domain::TVError;
use crate::filter::FilterState;
use crate::pagination::{PageSize, PageState};
use crate::record::Record;
use crate::sort::{SortDirection, SortState};

/// Serializable bundle of a view. `data` is only filled for share links.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSnapshot {
    pub columns: ColumnLayout,
    pub filter: FilterState,
    pub sort: SortState,
    pub page: PageState,
    pub data: Option<Vec<Record>>,
}

// Stored text layout of a snapshot.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredView {
    columns_config: Vec<ColumnDescriptor>,
    filter_text: String,
    column_filters: BTreeMap<String, String>,
    order: SortDirection,
    order_by: String,
    page: usize,
    rows_per_page: PageSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filtered_data: Option<Vec<Record>>,
}

impl ViewSnapshot {
    pub fn with_page_size(size: PageSize) -> Self {
        ViewSnapshot {
            page: PageState::first(size),
            ..Default::default()
        }
    }

    /// The same view without materialized rows.
    pub fn without_data(&self) -> Self {
        ViewSnapshot {
            data: None,
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> Result<String, TVError> {
        let stored = StoredView {
            columns_config: self.columns.columns().to_vec(),
            filter_text: self.filter.global_text.clone(),
            column_filters: self.filter.per_column.clone(),
            order: self.sort.direction,
            order_by: self.sort.active_key().unwrap_or_default().to_string(),
            page: self.page.index,
            rows_per_page: self.page.size,
            filtered_data: self.data.clone(),
        };
        Ok(serde_json::to_string(&stored)?)
    }

    pub fn from_json(text: &str) -> Result<Self, TVError> {
        let stored: StoredView = serde_json::from_str(text)
            .map_err(|e| TVError::MalformedSnapshot(e.to_string()))?;

        let mut filter = FilterState {
            global_text: stored.filter_text,
            ..Default::default()
        };
        for (column, text) in stored.column_filters.iter() {
            filter.set_column(column, text);
        }

        Ok(ViewSnapshot {
            columns: ColumnLayout::from_descriptors(stored.columns_config)?,
            filter,
            sort: SortState::by(&stored.order_by, stored.order),
            page: PageState {
                index: stored.page,
                size: stored.rows_per_page,
            },
            data: stored.filtered_data,
        })
    }
}
