use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::columns::{ColumnDescriptor, ColumnLayout};
use crate::domain::{CMDMode, HELP_TEXT, Message, TVConfig, TVError};
use crate::filter::{FilterState, filter};
use crate::inputter::{InputResult, Inputter};
use crate::pagination::{PageSize, PageState, page_count, paginate};
use crate::record::{LoadState, Record, RecordStore};
use crate::snapshot::ViewSnapshot;
use crate::sort::{SortState, sort};
use crate::views::ViewStore;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

/// The live view driving the current render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingView {
    pub columns: ColumnLayout,
    pub filter: FilterState,
    pub sort: SortState,
    pub page: PageState,
}

impl WorkingView {
    pub fn snapshot(&self, data: Option<Vec<Record>>) -> ViewSnapshot {
        ViewSnapshot {
            columns: self.columns.clone(),
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            page: self.page,
            data,
        }
    }
}

impl From<ViewSnapshot> for WorkingView {
    fn from(snapshot: ViewSnapshot) -> Self {
        WorkingView {
            columns: snapshot.columns,
            filter: snapshot.filter,
            sort: snapshot.sort,
            page: snapshot.page,
        }
    }
}

/// Everything the ui needs for one frame.
#[derive(Debug, Clone)]
pub struct UIData {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Vec<String>>,
    pub total_records: usize,
    pub filtered_records: usize,
    pub filter: FilterState,
    pub sort: SortState,
    pub page: PageState,
    pub page_count: usize,
    pub selected_column: usize,
    pub saved_views: Vec<String>,
    pub load_state: LoadState,
    pub shared: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            total_records: 0,
            filtered_records: 0,
            filter: FilterState::default(),
            sort: SortState::default(),
            page: PageState::default(),
            page_count: 1,
            selected_column: 0,
            saved_views: Vec::new(),
            load_state: LoadState::Loading,
            shared: false,
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            last_update: Instant::now(),
        }
    }

    /// First and last (1 based) row number of the page, `None` for an empty page.
    pub fn row_range(&self) -> Option<(usize, usize)> {
        if self.rows.is_empty() {
            return None;
        }
        let first = self.page.index * self.page.size.rows() + 1;
        Some((first, first + self.rows.len() - 1))
    }
}

pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    records: RecordStore,
    // Rows captured by a share link replace the live records until the next load/reset.
    frozen: Option<Vec<Record>>,
    view: WorkingView,
    views: ViewStore,
    rows: Vec<usize>,
    selected_column: usize,
    saved_views: Vec<String>,
    share_link: Option<String>,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    edit_backup: Option<String>,
    status_message: String,
}

impl Model {
    pub fn init(config: &TVConfig, views: ViewStore) -> Self {
        let view = WorkingView::from(views.reset());
        let saved_views = views.list();
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            records: RecordStore::loading(),
            frozen: None,
            view,
            views,
            rows: Vec::new(),
            selected_column: 0,
            saved_views,
            share_link: None,
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            edit_backup: None,
            status_message: "Loading ...".to_string(),
        };
        model.recompute();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn working_view(&self) -> &WorkingView {
        &self.view
    }

    pub fn share_link(&self) -> Option<&str> {
        self.share_link.as_deref()
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// Records the pipeline runs on: the captured rows of a share link, or the live dataset.
    fn source(&self) -> &[Record] {
        self.frozen.as_deref().unwrap_or(self.records.records())
    }

    /// The filtered and sorted records, in display order.
    pub fn materialize(&self) -> Vec<Record> {
        let source = self.source();
        self.rows.iter().map(|&idx| source[idx].clone()).collect()
    }

    // ------------------------- Pipeline ----------------------------- //

    fn recompute(&mut self) {
        let start_time = Instant::now();
        let rows = {
            let source = self.source();
            let filtered = filter(source, &self.view.filter);
            sort(source, &filtered, &self.view.sort)
        };
        self.rows = rows;
        trace!(
            "Pipeline produced {} rows in {}ms",
            self.rows.len(),
            start_time.elapsed().as_millis()
        );
        self.update_uidata();
    }

    fn update_uidata(&mut self) {
        let source = self.source();
        let columns = self.view.columns.columns();
        let rows = paginate(&self.rows, &self.view.page)
            .iter()
            .map(|&idx| {
                let record = &source[idx];
                columns
                    .iter()
                    .map(|c| c.format.render(record.get(&c.id)))
                    .collect::<Vec<String>>()
            })
            .collect();

        let name = match self.frozen {
            Some(_) => "FMCSA [shared]".to_string(),
            None => "FMCSA".to_string(),
        };

        self.uidata = UIData {
            name,
            columns: columns.to_vec(),
            rows,
            total_records: source.len(),
            filtered_records: self.rows.len(),
            filter: self.view.filter.clone(),
            sort: self.view.sort.clone(),
            page: self.view.page,
            page_count: page_count(self.rows.len(), self.view.page.size),
            selected_column: self.selected_column,
            saved_views: self.saved_views.clone(),
            load_state: self.records.state().clone(),
            shared: self.frozen.is_some(),
            show_popup: self.modus == Modus::POPUP,
            popup_message: self.uidata.popup_message.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_update: Instant::now(),
        };
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        info!("{}", self.status_message);
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_update = Instant::now();
    }

    pub fn update(&mut self, message: Message) -> Result<(), TVError> {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);
        // The load result arrives once, whatever the ui is showing.
        if let Message::Loaded(_) | Message::LoadFailed(_) = message {
            self.apply(message);
            return Ok(());
        }
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::Help => self.show_popup(HELP_TEXT.to_string()),
                Message::ShowViews => self.show_saved_views(),
                Message::EnterCommand(mode) => self.enter_cmd_mode(mode),
                Message::MoveLeft => self.select_column(self.selected_column.saturating_sub(1)),
                Message::MoveRight => self.select_column(self.selected_column + 1),
                Message::SortSelectedColumn => self.sort_selected_column(),
                other => self.apply(other),
            },
            Modus::POPUP => match message {
                Message::Quit => self.quit(),
                Message::Exit => self.close_popup(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = message {
                    self.raw_input(key)
                }
            }
        }
        Ok(())
    }

    /// State transitions shared by key bindings, prompts and startup.
    /// Each one completes before the pipeline runs again.
    fn apply(&mut self, message: Message) {
        match message {
            Message::Loaded(records) => self.data_loaded(records),
            Message::LoadFailed(reason) => self.data_failed(reason),
            Message::SetGlobalFilter(text) => {
                self.view.filter.global_text = text;
                self.view.page.index = 0;
                self.recompute();
            }
            Message::SetColumnFilter(column, text) => {
                self.view.filter.set_column(&column, &text);
                self.view.page.index = 0;
                self.recompute();
            }
            Message::RequestSort(key) => {
                self.view.sort = self.view.sort.toggle(&key);
                self.view.page.index = 0;
                self.recompute();
            }
            Message::SetSort(state) => {
                self.view.sort = state;
                self.view.page.index = 0;
                self.recompute();
            }
            Message::NextPage => {
                let last = self.uidata.page_count.saturating_sub(1);
                self.set_page_index((self.view.page.index + 1).min(last));
            }
            Message::PreviousPage => self.set_page_index(self.view.page.index.saturating_sub(1)),
            Message::FirstPage => self.set_page_index(0),
            Message::LastPage => self.set_page_index(self.uidata.page_count.saturating_sub(1)),
            Message::SetPageSize(size) => self.set_page_size(size),
            Message::CyclePageSize => self.set_page_size(self.view.page.size.next()),
            Message::MoveColumnLeft => {
                let from = self.selected_column;
                if from > 0 {
                    self.reorder_column(from, from - 1);
                }
            }
            Message::MoveColumnRight => {
                let from = self.selected_column;
                if from + 1 < self.view.columns.len() {
                    self.reorder_column(from, from + 1);
                }
            }
            Message::ReorderColumn(from, to) => self.reorder_column(from, to),
            Message::SaveView(name) => self.save_view(&name),
            Message::LoadView(name) => self.load_view(&name),
            Message::DeleteView(name) => self.delete_view(&name),
            Message::ShareLink => self.generate_share_link(),
            Message::OpenShareLink(url) => self.open_share_link(&url),
            Message::Reset => self.reset_view(),
            other => trace!("Ignoring {other:?}"),
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn data_loaded(&mut self, records: Vec<Record>) {
        let n = records.len();
        self.records = RecordStore::ready(records);
        self.recompute();
        self.set_status_message(format!("Loaded {n} records."));
    }

    fn data_failed(&mut self, reason: String) {
        error!("Error fetching data: {reason}");
        self.records = RecordStore::failed(reason.clone());
        self.recompute();
        self.set_status_message(format!("Loading data failed: {reason}"));
    }

    fn set_page_index(&mut self, index: usize) {
        self.view.page.index = index;
        self.update_uidata();
    }

    fn set_page_size(&mut self, size: PageSize) {
        self.view.page = PageState::first(size);
        self.update_uidata();
    }

    fn select_column(&mut self, column: usize) {
        self.selected_column = column.min(self.view.columns.len().saturating_sub(1));
        self.update_uidata();
    }

    fn sort_selected_column(&mut self) {
        if let Some(column) = self.view.columns.get(self.selected_column) {
            let key = column.id.clone();
            self.apply(Message::RequestSort(key));
        }
    }

    fn reorder_column(&mut self, from: usize, to: usize) {
        match self.view.columns.reorder(from, to) {
            Ok(columns) => {
                self.view.columns = columns;
                if self.selected_column == from {
                    self.selected_column = to;
                }
                self.update_uidata();
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn save_view(&mut self, name: &str) {
        match self.views.save(name, &self.view.snapshot(None)) {
            Ok(()) => {
                self.saved_views = self.views.list();
                self.update_uidata();
                self.set_status_message(format!("View '{name}' saved."));
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    /// Replace the working view in one step. `frozen` selects the record source.
    fn apply_snapshot(&mut self, snapshot: ViewSnapshot, frozen: Option<Vec<Record>>) {
        if !snapshot.columns.is_permutation_of(&ColumnLayout::canonical()) {
            warn!("Applying a column layout that differs from the dataset columns");
        }
        self.view = WorkingView::from(snapshot);
        self.frozen = frozen;
        self.selected_column = self
            .selected_column
            .min(self.view.columns.len().saturating_sub(1));
        self.recompute();
    }

    fn load_view(&mut self, name: &str) {
        match self.views.load(name) {
            Ok(snapshot) => {
                self.apply_snapshot(snapshot.without_data(), None);
                self.set_status_message(format!("View '{name}' loaded."));
            }
            Err(e) => {
                warn!("Loading view '{name}' failed: {e}");
                self.set_status_message(e.to_string());
            }
        }
    }

    fn delete_view(&mut self, name: &str) {
        match self.views.delete(name) {
            Ok(()) => {
                self.saved_views = self.views.list();
                self.update_uidata();
                self.set_status_message(format!("View '{name}' deleted."));
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn generate_share_link(&mut self) {
        let snapshot = self.view.snapshot(Some(self.materialize()));
        match self.views.generate_share_link(&snapshot) {
            Ok(link) => {
                if self.config.copy_share_link {
                    self.copy_to_clipboard(&link);
                }
                self.share_link = Some(link.clone());
                self.set_status_message(format!("Share this link with others: {link}"));
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn open_share_link(&mut self, url: &str) {
        match self.views.resolve_share_link(url) {
            Some(mut snapshot) => {
                let data = snapshot.data.take();
                debug!(
                    "Opening shared view with {} captured rows",
                    data.as_ref().map_or(0, Vec::len)
                );
                self.apply_snapshot(snapshot, data);
                self.set_status_message("Shared view loaded.");
            }
            None => self.set_status_message(format!("No shared view found for '{url}'.")),
        }
    }

    fn reset_view(&mut self) {
        let snapshot = self.views.reset();
        self.apply_snapshot(snapshot, None);
        self.selected_column = 0;
        self.update_uidata();
        self.set_status_message("View reset to default.");
    }

    fn copy_to_clipboard(&mut self, text: &str) {
        if self.clipboard.is_none() {
            self.clipboard = Clipboard::new()
                .inspect_err(|e| warn!("No clipboard available: {:?}", e))
                .ok();
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(text) {
                Ok(_) => trace!("Copied share link to clipboard."),
                Err(e) => trace!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    fn show_popup(&mut self, message: String) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = message;
        self.uidata.show_popup = true;
        self.uidata.last_update = Instant::now();
    }

    fn show_saved_views(&mut self) {
        self.saved_views = self.views.list();
        let message = if self.saved_views.is_empty() {
            "No saved views.".to_string()
        } else {
            self.saved_views.join("\n")
        };
        self.show_popup(message);
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.uidata.show_popup = false;
        self.uidata.last_update = Instant::now();
    }

    fn selected_column_id(&self) -> Option<String> {
        self.view
            .columns
            .get(self.selected_column)
            .map(|c| c.id.clone())
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();

        // Filter prompts start from the value held by the working view.
        let current = match mode {
            CMDMode::GlobalFilter => Some(self.view.filter.global_text.clone()),
            CMDMode::ColumnFilter => self.selected_column_id().map(|id| {
                self.view.filter.column(&id).unwrap_or_default().to_string()
            }),
            _ => None,
        };
        if let Some(text) = &current {
            self.input.set(text);
        }
        self.edit_backup = current;

        self.last_input = self.input.get();
        self.update_uidata();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        let previous = self.last_input.input.clone();
        self.last_input = self.input.read(key);

        if self.last_input.finished {
            self.handle_cmd_input();
        } else if self.last_input.input != previous {
            // Filters follow every keystroke.
            self.live_filter(self.last_input.input.clone());
        }
        self.update_uidata();
    }

    fn live_filter(&mut self, text: String) {
        match self.cmd_mode {
            Some(CMDMode::GlobalFilter) => self.apply(Message::SetGlobalFilter(text)),
            Some(CMDMode::ColumnFilter) => {
                if let Some(id) = self.selected_column_id() {
                    self.apply(Message::SetColumnFilter(id, text));
                }
            }
            _ => (),
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let mode = self.cmd_mode.take();
        if self.last_input.canceled {
            // Restore a filter edited live.
            if let Some(text) = self.edit_backup.take() {
                self.cmd_mode = mode;
                self.live_filter(text);
                self.cmd_mode = None;
            }
            return;
        }
        self.edit_backup = None;

        let cmd_input = self.last_input.input.clone();
        let message = match mode {
            Some(CMDMode::GlobalFilter) => Message::SetGlobalFilter(cmd_input),
            Some(CMDMode::ColumnFilter) => match self.selected_column_id() {
                Some(id) => Message::SetColumnFilter(id, cmd_input),
                None => return,
            },
            Some(CMDMode::SaveView) => Message::SaveView(cmd_input.trim().to_string()),
            Some(CMDMode::LoadView) => Message::LoadView(cmd_input.trim().to_string()),
            Some(CMDMode::DeleteView) => Message::DeleteView(cmd_input.trim().to_string()),
            Some(CMDMode::OpenShareLink) => Message::OpenShareLink(cmd_input.trim().to_string()),
            None => {
                info!("Cmd mode is none!");
                return;
            }
        };
        self.apply(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use crate::sort::SortDirection;
    use crate::store::MemoryStore;
    use crate::views::KeyScheme;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn config() -> TVConfig {
        TVConfig::default().with_copy_share_link(false)
    }

    fn model() -> Model {
        let views = ViewStore::new(Box::new(MemoryStore::new()), KeyScheme::Namespaced, "tv://fmcsa");
        Model::init(&config(), views)
    }

    fn carriers(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let name = if i % 5 == 0 {
                    format!("ACME {i:02}")
                } else {
                    format!("Carrier {i:02}")
                };
                Record::new()
                    .with("legal_name", name.as_str())
                    .with("entity_type", if i % 2 == 0 { "CARRIER" } else { "BROKER" })
                    .with("power_units", (i % 3) as f64)
            })
            .collect()
    }

    fn loaded(n: usize) -> Model {
        let mut m = model();
        m.update(Message::Loaded(carriers(n))).unwrap();
        m
    }

    fn names(m: &Model) -> Vec<String> {
        m.materialize()
            .iter()
            .map(|r| r.field("legal_name").map(Value::as_text).unwrap_or_default())
            .collect()
    }

    fn key(m: &mut Model, code: KeyCode) {
        m.update(Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE)))
            .unwrap();
    }

    fn type_text(m: &mut Model, text: &str) {
        for c in text.chars() {
            key(m, KeyCode::Char(c));
        }
    }

    #[test]
    fn loading_state_until_data_arrives() {
        let mut m = model();
        let ui = m.get_uidata();
        assert_eq!(ui.load_state, LoadState::Loading);
        assert!(ui.rows.is_empty());
        assert_eq!(ui.total_records, 0);

        m.update(Message::Loaded(carriers(12))).unwrap();
        let ui = m.get_uidata();
        assert_eq!(ui.load_state, LoadState::Ready);
        assert_eq!(ui.total_records, 12);
        assert_eq!(ui.filtered_records, 12);
        assert_eq!(ui.rows.len(), 10);
        assert_eq!(ui.row_range(), Some((1, 10)));
    }

    #[test]
    fn load_failure_is_not_fatal() {
        let mut m = model();
        m.update(Message::LoadFailed("boom".to_string())).unwrap();
        let ui = m.get_uidata();
        assert_eq!(ui.load_state, LoadState::Failed("boom".to_string()));
        assert!(ui.rows.is_empty());
        assert!(ui.status_message.contains("boom"));
        assert_eq!(m.status, Status::READY);
    }

    #[test]
    fn filtering_resets_the_page() {
        let mut m = loaded(15);
        m.update(Message::NextPage).unwrap();
        assert_eq!(m.get_uidata().page.index, 1);
        assert_eq!(m.get_uidata().rows.len(), 5);

        m.update(Message::SetGlobalFilter("acme".to_string())).unwrap();
        let ui = m.get_uidata();
        assert_eq!(ui.page.index, 0);
        assert_eq!(ui.filtered_records, 3);
        assert_eq!(ui.rows.len(), 3);
        assert_eq!(names(&m), vec!["ACME 00", "ACME 05", "ACME 10"]);
    }

    #[test]
    fn page_size_and_sort_reset_the_page() {
        let mut m = loaded(30);
        m.update(Message::LastPage).unwrap();
        assert_eq!(m.get_uidata().page.index, 2);
        m.update(Message::SetPageSize(PageSize::Five)).unwrap();
        assert_eq!(m.get_uidata().page, PageState::first(PageSize::Five));

        m.update(Message::NextPage).unwrap();
        m.update(Message::RequestSort("legal_name".to_string())).unwrap();
        assert_eq!(m.get_uidata().page.index, 0);

        m.update(Message::NextPage).unwrap();
        m.update(Message::SetColumnFilter("entity_type".to_string(), "broker".to_string()))
            .unwrap();
        assert_eq!(m.get_uidata().page.index, 0);
        assert_eq!(m.get_uidata().filtered_records, 15);
    }

    #[test]
    fn next_page_stops_at_the_last_page() {
        let mut m = loaded(12);
        for _ in 0..5 {
            m.update(Message::NextPage).unwrap();
        }
        assert_eq!(m.get_uidata().page.index, 1);
        assert_eq!(m.get_uidata().row_range(), Some((11, 12)));
    }

    #[test]
    fn sort_requests_toggle_direction() {
        let mut m = loaded(6);
        m.update(Message::RequestSort("power_units".to_string())).unwrap();
        assert_eq!(
            names(&m),
            vec!["ACME 00", "Carrier 03", "Carrier 01", "Carrier 04", "Carrier 02", "ACME 05"]
        );
        m.update(Message::RequestSort("power_units".to_string())).unwrap();
        assert_eq!(m.working_view().sort.direction, SortDirection::Descending);
        // Ties (same power units) keep load order.
        assert_eq!(
            names(&m),
            vec!["Carrier 02", "ACME 05", "Carrier 01", "Carrier 04", "ACME 00", "Carrier 03"]
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let mut m = loaded(15);
        m.update(Message::SetGlobalFilter("carrier".to_string())).unwrap();
        m.update(Message::RequestSort("legal_name".to_string())).unwrap();
        m.update(Message::ReorderColumn(0, 2)).unwrap();
        m.update(Message::SetPageSize(PageSize::Five)).unwrap();
        m.update(Message::NextPage).unwrap();
        let saved = m.working_view().clone();

        m.update(Message::SaveView("brokers".to_string())).unwrap();
        assert_eq!(m.get_uidata().saved_views, vec!["brokers"]);

        m.update(Message::Reset).unwrap();
        assert_eq!(m.working_view().columns, ColumnLayout::canonical());
        assert!(!m.working_view().filter.is_active());

        m.update(Message::LoadView("brokers".to_string())).unwrap();
        assert_eq!(m.working_view(), &saved);
        assert_eq!(m.get_uidata().status_message, "View 'brokers' loaded.");
    }

    #[test]
    fn failed_view_operations_keep_the_working_state() {
        let mut m = loaded(15);
        m.update(Message::SetGlobalFilter("acme".to_string())).unwrap();
        let before = m.working_view().clone();

        m.update(Message::SaveView(String::new())).unwrap();
        assert_eq!(m.get_uidata().status_message, TVError::EmptyViewName.to_string());
        assert!(m.get_uidata().saved_views.is_empty());

        m.update(Message::LoadView("nope".to_string())).unwrap();
        assert_eq!(
            m.get_uidata().status_message,
            "No saved view found with the name 'nope'."
        );
        m.update(Message::OpenShareLink("tv://fmcsa?view=zzz".to_string()))
            .unwrap();
        assert_eq!(m.working_view(), &before);
    }

    #[test]
    fn delete_then_load_is_not_found() {
        let mut m = loaded(5);
        m.update(Message::SaveView("x".to_string())).unwrap();
        m.update(Message::DeleteView("x".to_string())).unwrap();
        assert!(m.get_uidata().saved_views.is_empty());
        m.update(Message::LoadView("x".to_string())).unwrap();
        assert!(m.get_uidata().status_message.starts_with("No saved view"));
        m.update(Message::DeleteView("x".to_string())).unwrap();
        assert_eq!(m.get_uidata().status_message, "View 'x' deleted.");
    }

    #[test]
    fn share_link_reproduces_the_captured_rows() {
        let mut m = loaded(15);
        m.update(Message::SetGlobalFilter("acme".to_string())).unwrap();
        m.update(Message::SetSort(SortState::by("legal_name", SortDirection::Descending)))
            .unwrap();
        let captured = m.materialize();
        m.update(Message::ShareLink).unwrap();
        let link = m.share_link().unwrap().to_string();
        assert!(link.starts_with("tv://fmcsa?view="));

        // The live dataset changes afterwards.
        m.update(Message::Reset).unwrap();
        m.update(Message::Loaded(carriers(40))).unwrap();
        assert_eq!(m.get_uidata().total_records, 40);

        m.update(Message::OpenShareLink(link)).unwrap();
        assert!(m.get_uidata().shared);
        assert_eq!(m.materialize(), captured);
        assert_eq!(names(&m), vec!["ACME 10", "ACME 05", "ACME 00"]);
        assert_eq!(m.get_uidata().total_records, 3);

        // Reset goes back to the live data.
        m.update(Message::Reset).unwrap();
        assert!(!m.get_uidata().shared);
        assert_eq!(m.get_uidata().total_records, 40);
    }

    #[test]
    fn shared_non_finite_numbers_stay_searchable() {
        let mut m = model();
        let mut data = carriers(4);
        data[1].insert("power_units", Value::from(f64::NAN));
        m.update(Message::Loaded(data)).unwrap();
        m.update(Message::SetGlobalFilter("nan".to_string())).unwrap();
        assert_eq!(m.get_uidata().filtered_records, 1);
        let captured = m.materialize();

        m.update(Message::ShareLink).unwrap();
        let link = m.share_link().unwrap().to_string();
        m.update(Message::Reset).unwrap();
        m.update(Message::OpenShareLink(link)).unwrap();
        assert_eq!(m.materialize(), captured);
        assert_eq!(m.get_uidata().filtered_records, 1);
    }

    #[test]
    fn share_prompt_accepts_a_bare_id() {
        let mut m = loaded(15);
        m.update(Message::SetGlobalFilter("acme".to_string())).unwrap();
        m.update(Message::ShareLink).unwrap();
        let link = m.share_link().unwrap().to_string();
        let id = link.rsplit('=').next().unwrap().to_string();
        m.update(Message::Reset).unwrap();

        m.update(Message::EnterCommand(CMDMode::OpenShareLink)).unwrap();
        type_text(&mut m, &id);
        key(&mut m, KeyCode::Enter);
        assert!(m.get_uidata().shared);
        assert_eq!(m.get_uidata().filtered_records, 3);
        assert_eq!(m.get_uidata().status_message, "Shared view loaded.");
    }

    #[test]
    fn column_moves_follow_the_selection() {
        let mut m = loaded(3);
        m.update(Message::MoveRight).unwrap();
        m.update(Message::MoveColumnLeft).unwrap();
        let ids: Vec<&str> = m.working_view().columns.ids().take(2).collect();
        assert_eq!(ids, vec!["data_source_modified_dt", "created_dt"]);
        assert_eq!(m.get_uidata().selected_column, 0);

        m.update(Message::ReorderColumn(0, 40)).unwrap();
        assert!(m.get_uidata().status_message.contains("cannot move column"));
        assert_eq!(m.working_view().columns.len(), 12);
    }

    #[test]
    fn filter_prompt_applies_live_and_restores_on_escape() {
        let mut m = loaded(15);
        m.update(Message::EnterCommand(CMDMode::GlobalFilter)).unwrap();
        assert!(m.raw_keyevents());
        type_text(&mut m, "acme");
        assert_eq!(m.get_uidata().filtered_records, 3);
        key(&mut m, KeyCode::Esc);
        assert!(!m.raw_keyevents());
        assert_eq!(m.working_view().filter.global_text, "");
        assert_eq!(m.get_uidata().filtered_records, 15);

        m.update(Message::EnterCommand(CMDMode::ColumnFilter)).unwrap();
        type_text(&mut m, "2024");
        key(&mut m, KeyCode::Enter);
        assert_eq!(m.working_view().filter.column("created_dt"), Some("2024"));
        assert_eq!(m.get_uidata().filtered_records, 0);
    }

    #[test]
    fn save_prompt() {
        let mut m = loaded(5);
        m.update(Message::EnterCommand(CMDMode::SaveView)).unwrap();
        type_text(&mut m, "mine");
        key(&mut m, KeyCode::Enter);
        assert_eq!(m.get_uidata().saved_views, vec!["mine"]);
        assert_eq!(m.get_uidata().status_message, "View 'mine' saved.");
    }

    #[test]
    fn popups_swallow_table_keys() {
        let mut m = loaded(15);
        m.update(Message::Help).unwrap();
        assert!(m.get_uidata().show_popup);
        m.update(Message::NextPage).unwrap();
        assert_eq!(m.get_uidata().page.index, 0);
        m.update(Message::Exit).unwrap();
        assert!(!m.get_uidata().show_popup);
        m.update(Message::Quit).unwrap();
        assert_eq!(m.status, Status::QUITTING);
    }

    #[test]
    fn data_arrives_while_a_popup_is_open() {
        let mut m = model();
        m.update(Message::Help).unwrap();
        m.update(Message::Loaded(carriers(7))).unwrap();
        assert!(m.get_uidata().show_popup);
        assert_eq!(m.get_uidata().total_records, 7);
    }
}
