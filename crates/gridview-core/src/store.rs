//! Row store abstraction
//!
//! The view engine never renders anything itself. It reads cells from a
//! [`RowStore`] and tells the store which order, exclusions, highlights and
//! window to present. [`MemoryRowStore`] is the in-process implementation.

use std::collections::HashSet;

use crate::types::{RowId, RowRecord};

/// Presentation-side row storage driven by the view engine
pub trait RowStore: Send {
    /// Number of rows held, including excluded ones
    fn raw_row_count(&self) -> usize;

    /// Row with the given arena id
    fn row(&self, id: RowId) -> Option<&RowRecord>;

    /// Publish the visible slice `[start, end)` of the surviving rows
    fn set_visible_window(&mut self, start: usize, end: usize);

    /// Publish a new row order, a permutation of all row ids
    fn replace_row_order(&mut self, order: &[RowId]);

    fn mark_excluded(&mut self, rows: &[RowId]);

    fn mark_included(&mut self, rows: &[RowId]);

    /// Replace the whole row set; ids are reassigned as `0..rows.len()`
    fn replace_rows(&mut self, rows: Vec<Vec<String>>);

    /// Publish the highlighted rows
    fn set_highlighted(&mut self, _rows: &[RowId]) {}
}

/// Arena-backed in-memory row store.
///
/// Rows never move inside the arena; order, exclusion and highlight state are
/// kept alongside as plain id lists so callers can inspect what was published.
#[derive(Debug, Clone, Default)]
pub struct MemoryRowStore {
    rows: Vec<RowRecord>,
    order: Vec<RowId>,
    excluded: HashSet<RowId>,
    highlighted: Vec<RowId>,
    window: (usize, usize),
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let mut store = Self::new();
        store.replace_rows(rows);
        store
    }

    /// Convenience constructor for string literals
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Self::from_rows(
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    /// Last published order
    pub fn order(&self) -> &[RowId] {
        &self.order
    }

    pub fn is_excluded(&self, id: RowId) -> bool {
        self.excluded.contains(&id)
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    pub fn highlighted(&self) -> &[RowId] {
        &self.highlighted
    }

    /// Last published window over the surviving rows
    pub fn visible_window(&self) -> (usize, usize) {
        self.window
    }

    pub fn rows(&self) -> &[RowRecord] {
        &self.rows
    }
}

impl RowStore for MemoryRowStore {
    fn raw_row_count(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, id: RowId) -> Option<&RowRecord> {
        self.rows.get(id)
    }

    fn set_visible_window(&mut self, start: usize, end: usize) {
        self.window = (start, end);
    }

    fn replace_row_order(&mut self, order: &[RowId]) {
        self.order = order.to_vec();
    }

    fn mark_excluded(&mut self, rows: &[RowId]) {
        self.excluded.extend(rows.iter().copied());
    }

    fn mark_included(&mut self, rows: &[RowId]) {
        for id in rows {
            self.excluded.remove(id);
        }
    }

    fn replace_rows(&mut self, rows: Vec<Vec<String>>) {
        self.rows = rows
            .into_iter()
            .enumerate()
            .map(|(id, cells)| RowRecord::new(id, cells))
            .collect();
        self.order = (0..self.rows.len()).collect();
        self.excluded.clear();
        self.highlighted.clear();
        self.window = (0, 0);
    }

    fn set_highlighted(&mut self, rows: &[RowId]) {
        self.highlighted = rows.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_rows_reassigns_ids_and_resets_state() {
        let mut store = MemoryRowStore::from_strs(&[&["a"], &["b"], &["c"]]);
        store.mark_excluded(&[1]);
        store.replace_row_order(&[2, 0, 1]);
        assert!(store.is_excluded(1));
        assert_eq!(store.order(), &[2, 0, 1]);

        store.replace_rows(vec![vec!["x".into()], vec!["y".into()]]);
        assert_eq!(store.raw_row_count(), 2);
        assert_eq!(store.order(), &[0, 1]);
        assert_eq!(store.excluded_count(), 0);
        assert_eq!(store.row(1).and_then(|r| r.cell(0)), Some("y"));
    }

    #[test]
    fn included_rows_are_removed_from_exclusions() {
        let mut store = MemoryRowStore::from_strs(&[&["a"], &["b"], &["c"]]);
        store.mark_excluded(&[0, 2]);
        store.mark_included(&[2]);
        assert!(store.is_excluded(0));
        assert!(!store.is_excluded(2));
    }
}
