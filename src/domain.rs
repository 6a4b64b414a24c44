use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use std::io;
use thiserror::Error;

use crate::pagination::PageSize;
use crate::record::Record;
use crate::sort::SortState;
use crate::views::KeyScheme;

#[derive(Debug, Error)]
pub enum TVError {
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
    #[error("Please enter a name to save the view.")]
    EmptyViewName,
    #[error("No saved view found with the name '{0}'.")]
    ViewNotFound(String),
    #[error("malformed view snapshot: {0}")]
    MalformedSnapshot(String),
    #[error("cannot move column {from} to {to} in a layout of {len} columns")]
    InvalidColumnMove { from: usize, to: usize, len: usize },
    #[error("page size {0} is not one of 5, 10, 25")]
    InvalidPageSize(usize),
}

/// Prompt kinds of the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    GlobalFilter,
    ColumnFilter,
    SaveView,
    LoadView,
    DeleteView,
    OpenShareLink,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::GlobalFilter => "Search: ",
            CMDMode::ColumnFilter => "Filter column: ",
            CMDMode::SaveView => "Save view as: ",
            CMDMode::LoadView => "Load view: ",
            CMDMode::DeleteView => "Delete view: ",
            CMDMode::OpenShareLink => "Open link: ",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Quit,
    Help,
    Exit,
    RawKey(KeyEvent),
    EnterCommand(CMDMode),

    // Data loading
    Loaded(Vec<Record>),
    LoadFailed(String),

    // Filtering and sorting
    SetGlobalFilter(String),
    SetColumnFilter(String, String),
    RequestSort(String),
    SortSelectedColumn,
    SetSort(SortState),

    // Pagination
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    SetPageSize(PageSize),
    CyclePageSize,

    // Column layout
    MoveLeft,
    MoveRight,
    MoveColumnLeft,
    MoveColumnRight,
    ReorderColumn(usize, usize),

    // Views
    SaveView(String),
    LoadView(String),
    DeleteView(String),
    ShowViews,
    ShareLink,
    OpenShareLink(String),
    Reset,
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub base_url: String,
    pub key_scheme: KeyScheme,
    pub page_size: PageSize,
    pub copy_share_link: bool,
}

impl Default for TVConfig {
    fn default() -> Self {
        TVConfig {
            event_poll_time: 100,
            max_column_width: 30,
            base_url: "tv://fmcsa".to_string(),
            key_scheme: KeyScheme::Namespaced,
            page_size: PageSize::default(),
            copy_share_link: true,
        }
    }
}

pub const HELP_TEXT: &str = "\
/        search all columns
f        filter the selected column
s        sort by the selected column (again to flip direction)
←/→ h/l  select column
</>      move the selected column left/right
n/p      next/previous page
g/G      first/last page
r        cycle page size (5, 10, 25)
w        save the current view
o        load a saved view
d        delete a saved view
V        list saved views
S        generate a share link
v        open a share link
R        reset the view
?        this help
Esc      close popup / cancel input
q        quit";
