//! Rendering the visible page

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gridview_core::{RowStore, SortDirection, TypeConverter};
use gridview_engine::ViewEngine;
use serde::Serialize;

/// Header labels: configured names, or 1-based column numbers
pub fn headers<S: RowStore>(view: &ViewEngine<S>) -> Vec<String> {
    let width = view
        .visible_rows()
        .iter()
        .map(|row| row.len())
        .max()
        .unwrap_or(0)
        .max(view.config().configured_column_count());
    (0..width)
        .map(|index| {
            view.config()
                .column(index)
                .name
                .unwrap_or_else(|| format!("#{}", index + 1))
        })
        .collect()
}

pub fn render_table<S: RowStore>(view: &ViewEngine<S>) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers(view));

    for row in view.visible_rows() {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| TypeConverter::text_content(cell))
            .collect();
        table.add_row(cells);
    }

    format!("{table}\n{}", footer(view))
}

fn footer<S: RowStore>(view: &ViewEngine<S>) -> String {
    let state = view.page_state();
    let mut footer = format!(
        "Page {} of {} ({} rows)",
        view.current_page(),
        view.max_page(),
        state.total_row_count
    );
    let sort = view.sort_state();
    if let Some(column) = sort.column {
        let arrow = match sort.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        footer.push_str(&format!(", sorted by column {} {}", column + 1, arrow));
    }
    if !view.filters().is_empty() {
        footer.push_str(&format!(", {} filter(s)", view.filters().len()));
    }
    footer
}

#[derive(Debug, Serialize)]
pub struct PageOutput {
    pub page: usize,
    pub max_page: usize,
    pub total_rows: usize,
    pub page_size: usize,
    pub sort_column: Option<usize>,
    pub sort_direction: i32,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl PageOutput {
    pub fn from_view<S: RowStore>(view: &ViewEngine<S>) -> Self {
        let state = view.page_state();
        let sort = view.sort_state();
        Self {
            page: view.current_page(),
            max_page: view.max_page(),
            total_rows: state.total_row_count,
            page_size: state.page_size,
            sort_column: sort.column.map(|c| c + 1),
            sort_direction: sort.direction.sign(),
            columns: headers(view),
            rows: view
                .visible_rows()
                .iter()
                .map(|row| row.cells.clone())
                .collect(),
        }
    }
}

pub fn render_json<S: RowStore>(view: &ViewEngine<S>) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&PageOutput::from_view(view))?)
}
