//! Page state and window computation
//!
//! Pages are 0-based internally. The view engine converts to the 1-based
//! numbering of its public API.

use gridview_core::PageState;

/// Half-open `[start, end)` range over the surviving rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageWindow {
    pub start: usize,
    pub end: usize,
}

impl PageWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Tracks the current page against a page size and row total
#[derive(Debug, Clone)]
pub struct PageController {
    state: PageState,
}

impl PageController {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: PageState {
                current_page: 0,
                page_size: page_size.max(1),
                total_row_count: 0,
            },
        }
    }

    /// `max(1, ceil(total / page_size))`
    pub fn max_page_for(total_row_count: usize, page_size: usize) -> usize {
        total_row_count.div_ceil(page_size.max(1)).max(1)
    }

    /// Clamp a 0-based page request into `[0, max_page - 1]`
    pub fn clamp_page(requested: i64, total_row_count: usize, page_size: usize) -> usize {
        let last = Self::max_page_for(total_row_count, page_size) - 1;
        if requested <= 0 {
            0
        } else {
            (requested as u64).min(last as u64) as usize
        }
    }

    /// Clamp a textual 0-based page request; non-numeric input maps to page 0
    pub fn clamp_page_input(input: &str, total_row_count: usize, page_size: usize) -> usize {
        match input.trim().parse::<i64>() {
            Ok(requested) => Self::clamp_page(requested, total_row_count, page_size),
            Err(_) => {
                tracing::debug!(input = %input, "non-numeric page request, using first page");
                0
            }
        }
    }

    pub fn compute_window(page: usize, page_size: usize, total_row_count: usize) -> PageWindow {
        let start = page.saturating_mul(page_size).min(total_row_count);
        let end = start.saturating_add(page_size).min(total_row_count);
        PageWindow { start, end }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn current_page(&self) -> usize {
        self.state.current_page
    }

    pub fn page_size(&self) -> usize {
        self.state.page_size
    }

    pub fn total_row_count(&self) -> usize {
        self.state.total_row_count
    }

    pub fn max_page(&self) -> usize {
        Self::max_page_for(self.state.total_row_count, self.state.page_size)
    }

    /// Move to a 0-based page, clamped. Returns whether the page changed.
    pub fn set_page(&mut self, requested: i64) -> bool {
        let page = Self::clamp_page(requested, self.state.total_row_count, self.state.page_size);
        let changed = page != self.state.current_page;
        self.state.current_page = page;
        changed
    }

    /// Update the row total and re-clamp the current page.
    /// Returns whether the current page moved.
    pub fn set_total_row_count(&mut self, total_row_count: usize) -> bool {
        self.state.total_row_count = total_row_count;
        let current = self.state.current_page as i64;
        self.set_page(current)
    }

    /// Change the page size and go back to the first page
    pub fn set_page_size(&mut self, page_size: usize) -> bool {
        let page_size = page_size.max(1);
        if page_size == self.state.page_size {
            return false;
        }
        self.state.page_size = page_size;
        self.state.current_page = 0;
        true
    }

    /// Window of the current page
    pub fn window(&self) -> PageWindow {
        Self::compute_window(
            self.state.current_page,
            self.state.page_size,
            self.state.total_row_count,
        )
    }

    pub fn can_go_next(&self) -> bool {
        self.state.current_page + 1 < self.max_page()
    }

    pub fn can_go_prev(&self) -> bool {
        self.state.current_page > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_page_matches_ceiling_for_all_small_inputs() {
        for page_size in 1..=12usize {
            for total in 0..=60usize {
                let expected = std::cmp::max(1, (total + page_size - 1) / page_size);
                assert_eq!(
                    PageController::max_page_for(total, page_size),
                    expected,
                    "total={total} page_size={page_size}"
                );
            }
        }
    }

    #[test]
    fn any_request_clamps_into_range() {
        for requested in [-1_000_000i64, -1, 0, 1, 2, 3, 4, 99, i64::MAX] {
            let page = PageController::clamp_page(requested, 5, 2);
            assert!(page <= 2, "requested {requested} gave {page}");
        }
        assert_eq!(PageController::clamp_page(4, 5, 2), 2);
        assert_eq!(PageController::clamp_page(-3, 5, 2), 0);
        assert_eq!(PageController::clamp_page(7, 0, 10), 0);
    }

    #[test]
    fn last_page_window_is_partial() {
        // pageSize=2, total=5 -> 3 pages, last page holds row 4 only
        let page = PageController::clamp_page(4, 5, 2);
        assert_eq!(page, 2);
        assert_eq!(
            PageController::compute_window(page, 2, 5),
            PageWindow { start: 4, end: 5 }
        );
        assert_eq!(
            PageController::compute_window(0, 10, 0),
            PageWindow { start: 0, end: 0 }
        );
    }

    #[test]
    fn non_numeric_input_goes_to_first_page() {
        assert_eq!(PageController::clamp_page_input("abc", 50, 10), 0);
        assert_eq!(PageController::clamp_page_input(" 3 ", 50, 10), 3);
        assert_eq!(PageController::clamp_page_input("30", 50, 10), 4);
    }

    #[test]
    fn shrinking_total_reclamps_current_page() {
        let mut pager = PageController::new(10);
        pager.set_total_row_count(95);
        assert!(pager.set_page(9));
        assert_eq!(pager.window(), PageWindow { start: 90, end: 95 });

        assert!(pager.set_total_row_count(31));
        assert_eq!(pager.current_page(), 3);
        assert!(!pager.can_go_next());

        assert!(pager.set_total_row_count(0));
        assert_eq!(pager.current_page(), 0);
        assert!(pager.window().is_empty());
    }

    #[test]
    fn page_size_change_resets_to_first_page() {
        let mut pager = PageController::new(10);
        pager.set_total_row_count(100);
        pager.set_page(5);
        assert!(pager.set_page_size(25));
        assert_eq!(pager.current_page(), 0);
        assert_eq!(pager.max_page(), 4);
        assert!(!pager.set_page_size(25));
    }
}
