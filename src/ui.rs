use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::domain::TVConfig;
use crate::model::{Model, UIData};
use crate::record::LoadState;
use crate::sort::SortDirection;

pub const CMDLINE_HEIGH: u16 = 1;
pub const FOOTER_HEIGHT: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 2;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(config: &TVConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, footer_area, cmdline_area] = Layout::vertical([
            Constraint::Min(TABLE_HEADER_HEIGHT + 1),
            Constraint::Length(FOOTER_HEIGHT),
            Constraint::Length(CMDLINE_HEIGH),
        ])
        .areas(frame.area());

        match &uidata.load_state {
            LoadState::Loading => self.draw_message(frame, table_area, uidata, "Loading ..."),
            LoadState::Failed(reason) if uidata.total_records == 0 => {
                let text = format!("No data: {reason}");
                self.draw_message(frame, table_area, uidata, &text)
            }
            _ => self.draw_table(frame, table_area, uidata),
        }
        self.draw_footer(frame, footer_area, uidata);
        self.draw_cmdline(frame, cmdline_area, uidata);

        if uidata.show_popup {
            self.draw_popup(frame, &uidata.popup_message);
        }
    }

    fn block(uidata: &UIData) -> Block<'static> {
        Block::bordered()
            .title(Line::from(format!(" {} ", uidata.name).bold()).centered())
            .border_set(border::PLAIN)
    }

    fn draw_message(&self, frame: &mut Frame, area: Rect, uidata: &UIData, message: &str) {
        let paragraph = Paragraph::new(message.to_string().yellow())
            .centered()
            .block(Self::block(uidata));
        frame.render_widget(paragraph, area);
    }

    fn clip(text: &str, width: usize) -> String {
        if text.chars().count() <= width {
            return text.to_string();
        }
        if width < 3 {
            return text.chars().take(width).collect();
        }
        let mut clipped: String = text.chars().take(width - 3).collect();
        clipped.push_str("...");
        clipped
    }

    fn column_widths(&self, uidata: &UIData) -> Vec<usize> {
        uidata
            .columns
            .iter()
            .enumerate()
            .map(|(cidx, column)| {
                let filter_width = uidata
                    .filter
                    .column(&column.id)
                    .map_or(0, |f| f.chars().count() + 2);
                let data_width = uidata
                    .rows
                    .iter()
                    .map(|row| row.get(cidx).map_or(0, |c| c.chars().count()))
                    .max()
                    .unwrap_or(0);
                let width = (column.label.chars().count() + 2)
                    .max(filter_width)
                    .max(data_width)
                    + COLUMN_WIDTH_MARGIN;
                width.min(self.max_column_width)
            })
            .collect()
    }

    fn header_cell(uidata: &UIData, cidx: usize, width: usize) -> Cell<'static> {
        let column = &uidata.columns[cidx];
        let marker = match (uidata.sort.active_key(), uidata.sort.direction) {
            (Some(key), SortDirection::Ascending) if key == column.id => " ▲",
            (Some(key), SortDirection::Descending) if key == column.id => " ▼",
            _ => "",
        };
        let label = Self::clip(&format!("{}{}", column.label, marker), width);
        let filter = uidata
            .filter
            .column(&column.id)
            .map(|f| Self::clip(&format!("[{f}]"), width))
            .unwrap_or_default();

        let mut style = Style::default().add_modifier(Modifier::BOLD);
        if cidx == uidata.selected_column {
            style = style.add_modifier(Modifier::REVERSED);
        }
        Cell::from(Text::from(vec![
            Line::from(Span::styled(label, style)),
            Line::from(filter.cyan()),
        ]))
    }

    fn draw_table(&self, frame: &mut Frame, area: Rect, uidata: &UIData) {
        let widths = self.column_widths(uidata);
        let header = Row::new(
            widths
                .iter()
                .enumerate()
                .map(|(cidx, &w)| Self::header_cell(uidata, cidx, w)),
        )
        .height(TABLE_HEADER_HEIGHT);

        let rows = uidata.rows.iter().map(|row| {
            Row::new(
                row.iter()
                    .zip(widths.iter())
                    .map(|(cell, &w)| Cell::from(Self::clip(cell, w))),
            )
        });

        let table = Table::new(rows, widths.iter().map(|&w| Constraint::Length(w as u16)))
            .header(header)
            .column_spacing(1)
            .block(Self::block(uidata));
        frame.render_widget(table, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect, uidata: &UIData) {
        let range = match uidata.row_range() {
            Some((first, last)) => format!("rows {first}-{last}"),
            None => "no rows".to_string(),
        };
        let mut spans = vec![
            Span::from(format!(
                " {range} of {} ({} total)",
                uidata.filtered_records, uidata.total_records
            )),
            Span::from(format!(
                " | page {}/{} | {} per page",
                uidata.page.index + 1,
                uidata.page_count,
                uidata.page.size.rows()
            )),
        ];
        if !uidata.filter.global_text.is_empty() {
            spans.push(format!(" | search: {}", uidata.filter.global_text).cyan());
        }
        if !uidata.saved_views.is_empty() {
            spans.push(Span::from(format!(
                " | views: {}",
                uidata.saved_views.join(", ")
            )));
        }
        spans.push(" | ? help".blue().bold());
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_cmdline(&self, frame: &mut Frame, area: Rect, uidata: &UIData) {
        if uidata.active_cmdinput
            && let Some(mode) = uidata.cmd_mode
        {
            let prompt = mode.prompt();
            let line = Line::from(vec![
                prompt.bold(),
                Span::from(uidata.cmdinput.input.clone()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        } else {
            frame.render_widget(Paragraph::new(uidata.status_message.clone().italic()), area);
        }
    }

    fn draw_popup(&self, frame: &mut Frame, message: &str) {
        let area = frame.area();
        let width = (area.width * 3 / 5).max(20).min(area.width);
        let height = (message.lines().count() as u16 + 2).min(area.height);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(message.to_string())
                .wrap(Wrap { trim: false })
                .block(
                    Block::bordered()
                        .title(Line::from(" <Esc> to close ".bold()).centered())
                        .border_set(border::THICK),
                ),
            popup,
        );
    }
}
