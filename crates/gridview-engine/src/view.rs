//! The view engine: page, sort and filter state over a row store
//!
//! [`ViewEngine`] composes the filter, sort, paging and remote controllers.
//! Every state-changing call updates the relevant sub-state, re-clamps the
//! page and then either re-slices the local rows or asks the remote source
//! for new ones. Sorting and fetching are asynchronous: the engine is driven
//! by [`ViewEngine::tick`] or [`ViewEngine::run_until_idle`].

use std::sync::Arc;

use gridview_core::{
    ComparableValue, FunctionRegistry, GridError, MemoryRowStore, PageState, RowId, RowRecord,
    RowStore, SortDirection, SortState, TypeConverter, ViewConfig, ViewEvent,
};
use tokio::sync::mpsc;

use crate::filter::{FilterEngine, FilterOutcome, FilterPredicate, FilterRemoval};
use crate::paging::{PageController, PageWindow};
use crate::remote::{
    CacheStats, DataSource, Dispatch, FetchOutcome, FetchRequest, FetchResponse, RemoteSource,
};
use crate::sort::{SortEngine, SortOutcome};

/// Page, page size and sort an in-flight fetch will commit when it lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingView {
    page: usize,
    page_size: usize,
    sort: SortState,
}

/// Stateful controller of one tabular view
pub struct ViewEngine<S: RowStore = MemoryRowStore> {
    config: ViewConfig,
    registry: FunctionRegistry,
    store: S,
    /// Published order, a permutation of every row id in the store
    order: Vec<RowId>,
    filters: FilterEngine,
    sorter: SortEngine,
    pager: PageController,
    /// Sort of the published order
    sort_state: SortState,
    /// Most recently requested sort, which may still be running or loading
    requested_sort: SortState,
    remote: Option<RemoteSource>,
    pending: Option<PendingView>,
    subscribers: Vec<mpsc::UnboundedSender<ViewEvent>>,
    last_page: Option<(usize, usize, PageWindow)>,
}

impl ViewEngine<MemoryRowStore> {
    /// View over an in-memory row set
    pub fn from_rows(config: ViewConfig, rows: Vec<Vec<String>>) -> Self {
        Self::new(config, MemoryRowStore::from_rows(rows))
    }
}

impl<S: RowStore> ViewEngine<S> {
    pub fn new(config: ViewConfig, store: S) -> Self {
        let config = config.validate();
        let mut engine = Self {
            registry: FunctionRegistry::new(),
            order: (0..store.raw_row_count()).collect(),
            store,
            filters: FilterEngine::new(),
            sorter: SortEngine::new(config.sort_batch_size),
            pager: PageController::new(config.page_size),
            sort_state: SortState::unsorted(),
            requested_sort: SortState::unsorted(),
            remote: None,
            pending: None,
            subscribers: Vec::new(),
            last_page: None,
            config,
        };
        engine.store.replace_row_order(&engine.order);
        engine.publish_window();
        engine
    }

    /// Use `registry` to resolve custom comparators and predicates
    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Delegate paging and/or sorting to `source`, as configured
    pub fn with_remote(mut self, source: Arc<dyn DataSource>) -> Self {
        self.remote = Some(RemoteSource::new(source, &self.config));
        self
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ViewEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn server_paging(&self) -> bool {
        self.remote.as_ref().is_some_and(|r| r.server_paging())
    }

    fn server_sort(&self) -> bool {
        self.remote.as_ref().is_some_and(|r| r.server_sort())
    }

    /// Issue the initial load.
    ///
    /// Remote views fetch their first page (or the whole row set when
    /// `load_all_on_init` is set); local views just publish their first page.
    pub fn load(&mut self) {
        let remote_owned = self.server_paging() || self.server_sort();
        if self.remote.is_some() && (remote_owned || self.config.load_all_on_init) {
            let target = self.target(0, self.requested_sort);
            self.request_remote(target);
        } else {
            self.last_page = None;
            self.publish_window();
        }
    }

    // Paging

    /// 1-based current page
    pub fn current_page(&self) -> usize {
        self.pager.current_page() + 1
    }

    pub fn max_page(&self) -> usize {
        self.pager.max_page()
    }

    pub fn page_state(&self) -> PageState {
        self.pager.state()
    }

    /// Go to a 1-based page; out-of-range requests are clamped
    pub fn goto_page(&mut self, page: i64) {
        let requested = page.saturating_sub(1);
        if self.server_paging() {
            let page = PageController::clamp_page(
                requested,
                self.pager.total_row_count(),
                self.target_page_size(),
            );
            if page == self.pager.current_page() && self.pending.is_none() {
                return;
            }
            let target = self.target(page, self.requested_sort);
            self.request_remote(target);
            return;
        }

        if self.pager.set_page(requested) {
            tracing::debug!(page = self.current_page(), "page changed");
        }
        self.publish_window();
    }

    /// Go to a page typed by a user; anything non-numeric means the first page
    pub fn goto_page_input(&mut self, input: &str) {
        match input.trim().parse::<i64>() {
            Ok(page) => self.goto_page(page),
            Err(_) => {
                tracing::debug!(input = %input, "non-numeric page request, using first page");
                self.goto_page(1);
            }
        }
    }

    /// 0-based page the view is on or heading to
    fn target_page(&self) -> usize {
        self.pending
            .map(|p| p.page)
            .unwrap_or_else(|| self.pager.current_page())
    }

    /// Page size the view has or is heading to
    fn target_page_size(&self) -> usize {
        self.pending
            .map(|p| p.page_size)
            .unwrap_or_else(|| self.pager.page_size())
    }

    fn target(&self, page: usize, sort: SortState) -> PendingView {
        PendingView {
            page,
            page_size: self.target_page_size(),
            sort,
        }
    }

    pub fn goto_next_page(&mut self) {
        let next = self.target_page() as i64 + 2;
        self.goto_page(next);
    }

    pub fn goto_prev_page(&mut self) {
        let prev = self.target_page() as i64;
        self.goto_page(prev);
    }

    pub fn goto_first_page(&mut self) {
        self.goto_page(1);
    }

    pub fn goto_last_page(&mut self) {
        let last = self.pager.max_page() as i64;
        self.goto_page(last);
    }

    /// Change the page size and go back to the first page.
    ///
    /// With server paging the new size is committed only once the first page
    /// at that size arrives.
    pub fn set_page_size(&mut self, page_size: usize) {
        let page_size = page_size.max(1);
        if self.server_paging() {
            if page_size == self.target_page_size() {
                return;
            }
            tracing::debug!(page_size, "fetching first page at new page size");
            let target = PendingView {
                page: 0,
                page_size,
                sort: self.requested_sort,
            };
            self.request_remote(target);
            return;
        }

        if !self.pager.set_page_size(page_size) {
            return;
        }
        self.config.page_size = self.pager.page_size();
        tracing::debug!(page_size, "page size changed");
        self.publish_window();
    }

    // Sorting

    pub fn sort_state(&self) -> SortState {
        self.sort_state
    }

    /// Sort by a 1-based column.
    ///
    /// Without an explicit direction, sorting the column that is already
    /// sorted toggles the direction and any other column starts ascending.
    /// Unknown columns are ignored.
    pub fn sort(&mut self, column_number: usize, direction: Option<SortDirection>) {
        let column_count = self.column_count();
        if column_number == 0 || column_number > column_count {
            tracing::debug!(column_number, column_count, "ignoring sort on unknown column");
            return;
        }
        let column = column_number - 1;
        let direction = direction.unwrap_or(match self.requested_sort.column {
            Some(current) if current == column => self.requested_sort.direction.toggled(),
            _ => SortDirection::Ascending,
        });
        let sort = SortState::new(column, direction);
        self.requested_sort = sort;

        if self.server_sort() {
            self.sorter.cancel();
            let target = self.target(self.target_page(), sort);
            self.request_remote(target);
        } else {
            self.start_local_sort(sort);
        }
    }

    /// Cancel any running local sort; the published order is left untouched
    pub fn cancel_sort(&mut self) {
        self.sorter.cancel();
        self.requested_sort = self.sort_state;
    }

    pub fn is_sorting(&self) -> bool {
        self.sorter.is_running()
    }

    fn start_local_sort(&mut self, sort: SortState) {
        let Some(column) = sort.column else {
            return;
        };
        let spec = self.config.column(column);
        let rows = rows_in_order(&self.store, &self.order);
        self.sorter.start(&rows, &spec, sort.direction, &self.registry);
    }

    fn sort_now(&self, sort: SortState) -> Vec<RowId> {
        let Some(column) = sort.column else {
            return self.order.clone();
        };
        let spec = self.config.column(column);
        let rows = rows_in_order(&self.store, &self.order);
        SortEngine::sort_now(&rows, &spec, sort.direction, &self.registry)
    }

    fn commit_order(&mut self, order: Vec<RowId>, sort: SortState) {
        self.order = order;
        self.store.replace_row_order(&self.order);
        self.sort_state = sort;
        self.emit(ViewEvent::RowOrderChanged { sort });
        self.publish_window();
    }

    fn column_count(&self) -> usize {
        let widest = self
            .order
            .iter()
            .filter_map(|id| self.store.row(*id))
            .map(|row| row.len())
            .max()
            .unwrap_or(0);
        widest.max(self.config.configured_column_count())
    }

    // Filtering

    /// Exclude the rows `predicate` rejects
    pub fn filter_rows(&mut self, predicate: FilterPredicate) -> FilterOutcome {
        self.apply_filters(vec![predicate])
    }

    /// Apply several predicates at once, left to right.
    ///
    /// Predicates on a column no row has are ignored.
    pub fn apply_filters(&mut self, predicates: Vec<FilterPredicate>) -> FilterOutcome {
        let predicates: Vec<FilterPredicate> = predicates
            .into_iter()
            .filter(|predicate| self.known_column(predicate))
            .collect();
        let rows = rows_in_order(&self.store, &self.order);
        let outcome = self.filters.apply_filters(&rows, predicates, &self.registry);
        self.store.mark_excluded(&outcome.filtered_rows);
        self.store.set_highlighted(self.filters.highlighted());
        self.emit(ViewEvent::FilterApplied {
            filtered: outcome.filtered_rows.clone(),
            remaining: outcome.remaining_rows.len(),
        });
        self.publish_window();
        outcome
    }

    /// Remove filters equal to `descriptor`, or every filter when `None`
    pub fn remove_filter_rows(&mut self, descriptor: Option<&FilterPredicate>) -> FilterRemoval {
        let rows = rows_in_order(&self.store, &self.order);
        let removal = match descriptor {
            Some(descriptor) => self.filters.remove_filter(&rows, descriptor, &self.registry),
            None => self.filters.clear(&rows, &self.registry),
        };
        self.store.mark_included(&removal.restored_rows);
        self.store.set_highlighted(self.filters.highlighted());
        self.emit(ViewEvent::FilterRemoved {
            restored: removal.restored_rows.clone(),
            remaining: removal.remaining_rows.len(),
        });
        self.publish_window();
        removal
    }

    pub fn clear_filters(&mut self) -> FilterRemoval {
        self.remove_filter_rows(None)
    }

    pub fn filters(&self) -> &[FilterPredicate] {
        self.filters.predicates()
    }

    /// Highlight surviving rows matched by `predicate`; returns the matches
    pub fn highlight_rows(&mut self, predicate: FilterPredicate) -> Vec<RowId> {
        if !self.known_column(&predicate) {
            return Vec::new();
        }
        let rows = rows_in_order(&self.store, &self.order);
        let matched = self.filters.highlight(&rows, predicate, &self.registry);
        self.publish_highlights();
        matched
    }

    /// Drop highlights equal to `descriptor`, or all highlights when `None`
    pub fn remove_highlight_rows(&mut self, descriptor: Option<&FilterPredicate>) -> Vec<RowId> {
        let rows = rows_in_order(&self.store, &self.order);
        let remaining = self
            .filters
            .remove_highlight(&rows, descriptor, &self.registry);
        self.publish_highlights();
        remaining
    }

    pub fn highlighted_rows(&self) -> &[RowId] {
        self.filters.highlighted()
    }

    fn known_column(&self, predicate: &FilterPredicate) -> bool {
        match predicate.column {
            Some(column) if column >= self.column_count() => {
                tracing::debug!(
                    column,
                    column_count = self.column_count(),
                    "ignoring filter on unknown column"
                );
                false
            }
            _ => true,
        }
    }

    fn publish_highlights(&mut self) {
        let highlighted = self.filters.highlighted().to_vec();
        self.store.set_highlighted(&highlighted);
        self.emit(ViewEvent::HighlightChanged { highlighted });
    }

    // Data access

    /// Ids of the rows that survive the filters, in published order
    pub fn surviving_rows(&self) -> Vec<RowId> {
        self.filters.surviving(&self.order)
    }

    /// Rows of the current page
    pub fn visible_rows(&self) -> Vec<&RowRecord> {
        let survivors = self.surviving_rows();
        let window = self.current_window(survivors.len());
        survivors[window.start..window.end]
            .iter()
            .filter_map(|id| self.store.row(*id))
            .collect()
    }

    /// Typed value of a cell; `row` is a 0-based position among the surviving rows
    pub fn cell_data(&self, row: usize, column: usize) -> Option<ComparableValue> {
        let record = self.surviving_record(row)?;
        let raw = record.cell(column)?;
        Some(self.convert(raw, column))
    }

    /// Raw text of a cell
    pub fn cell_text(&self, row: usize, column: usize) -> Option<&str> {
        self.surviving_record(row)?.cell(column)
    }

    pub fn row_data(&self, row: usize) -> Option<Vec<ComparableValue>> {
        let record = self.surviving_record(row)?;
        Some(
            record
                .cells
                .iter()
                .enumerate()
                .map(|(column, raw)| self.convert(raw, column))
                .collect(),
        )
    }

    /// Typed values of one column over every surviving row
    pub fn column_data(&self, column: usize) -> Vec<ComparableValue> {
        self.surviving_rows()
            .into_iter()
            .filter_map(|id| self.store.row(id))
            .filter_map(|record| record.cell(column))
            .map(|raw| self.convert(raw, column))
            .collect()
    }

    fn surviving_record(&self, position: usize) -> Option<&RowRecord> {
        let id = self
            .order
            .iter()
            .filter(|id| !self.filters.is_excluded(**id))
            .nth(position)?;
        self.store.row(*id)
    }

    fn convert(&self, raw: &str, column: usize) -> ComparableValue {
        let spec = self.config.column(column);
        TypeConverter::convert(raw, &spec.column_type, spec.wants_markup)
    }

    // Remote

    pub fn is_loading(&self) -> bool {
        self.remote.as_ref().is_some_and(|r| r.is_loading())
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.remote.as_ref().map(|r| r.cache_stats())
    }

    /// Re-issue the current request, optionally dropping cached pages first.
    ///
    /// Local views re-evaluate their filters.
    pub fn refresh(&mut self, clear_cache: bool) {
        if let Some(remote) = self.remote.as_mut() {
            if clear_cache {
                remote.clear_cache();
            }
            let target = self.target(self.target_page(), self.requested_sort);
            self.request_remote(target);
            return;
        }

        let rows = rows_in_order(&self.store, &self.order);
        let outcome = self.filters.reapply(&rows, &self.registry);
        let all: Vec<RowId> = self.order.clone();
        self.store.mark_included(&all);
        self.store.mark_excluded(&outcome.filtered_rows);
        self.store.set_highlighted(self.filters.highlighted());
        self.publish_window();
    }

    fn request_remote(&mut self, target: PendingView) {
        let Some(remote) = self.remote.as_mut() else {
            return;
        };
        let page_state = PageState {
            current_page: target.page,
            page_size: target.page_size,
            ..self.pager.state()
        };
        let request = remote.build_request(&page_state, &target.sort, &self.config);
        let key = request.cache_key();
        let dispatch = remote.fetch(request.clone());

        self.pending = Some(target);
        match dispatch {
            Ok(Dispatch::Cached(response)) => {
                self.apply_response(key, &request, response, true);
            }
            Ok(Dispatch::Started(id)) => {
                tracing::debug!(request = id, key = %key, page = target.page, "waiting for remote rows");
                self.emit(ViewEvent::FetchStarted { key });
            }
            Err(err) => self.fail_fetch(key, err),
        }
    }

    fn handle_outcome(&mut self, outcome: FetchOutcome) {
        match outcome.result {
            Ok(response) => self.apply_response(outcome.key, &outcome.request, response, false),
            Err(err) => self.fail_fetch(outcome.key, err),
        }
    }

    fn apply_response(
        &mut self,
        key: String,
        request: &FetchRequest,
        response: Arc<FetchResponse>,
        from_cache: bool,
    ) {
        let target = self.pending.take().unwrap_or(PendingView {
            page: self.pager.current_page(),
            page_size: self.pager.page_size(),
            sort: self.requested_sort,
        });

        // Row ids are reassigned, so nothing computed over the old rows survives
        self.sorter.cancel();
        self.store.replace_rows(response.rows.clone());
        self.order = (0..self.store.raw_row_count()).collect();

        let rows = rows_in_order(&self.store, &self.order);
        let outcome = self.filters.reapply(&rows, &self.registry);
        self.store.mark_excluded(&outcome.filtered_rows);
        self.store.set_highlighted(self.filters.highlighted());

        if self.server_paging() {
            if self.pager.set_page_size(target.page_size) {
                self.config.page_size = target.page_size;
                tracing::debug!(page_size = target.page_size, "page size changed");
            }
            self.pager.set_total_row_count(response.effective_total(request));
            self.pager.set_page(target.page as i64);
        }

        self.emit(ViewEvent::FetchCompleted {
            key,
            from_cache,
            rows: response.rows.len(),
        });

        let sort = self.requested_sort;
        if self.server_sort() {
            self.requested_sort = target.sort;
            self.commit_order(self.order.clone(), target.sort);
        } else if !sort.is_sorted() {
            self.commit_order(self.order.clone(), SortState::unsorted());
        } else if self.server_paging() {
            // A single page is sorted in one pass before anything is published
            let order = self.sort_now(sort);
            self.commit_order(order, sort);
        } else {
            // The whole row set: show it as received and publish the sorted
            // order when the local sort completes
            self.store.replace_row_order(&self.order);
            self.publish_window();
            self.start_local_sort(sort);
        }
    }

    fn fail_fetch(&mut self, key: String, err: GridError) {
        tracing::warn!(key = %key, error = %err, "keeping last good view after failed fetch");
        self.pending = None;
        if self.server_sort() {
            self.requested_sort = self.sort_state;
        }
        self.emit(ViewEvent::FetchFailed {
            key,
            status: err.status(),
            message: err.to_string(),
        });
    }

    // Scheduling

    /// Run one unit of scheduled work: apply a finished fetch, or advance the
    /// running sort by one batch. Returns `false` when there was nothing to do.
    pub fn tick(&mut self) -> bool {
        if let Some(outcome) = self.remote.as_mut().and_then(|r| r.try_next_outcome()) {
            self.handle_outcome(outcome);
            return true;
        }
        self.tick_sort()
    }

    fn tick_sort(&mut self) -> bool {
        match self.sorter.tick() {
            Some(SortOutcome::Completed {
                column,
                direction,
                order,
                ..
            }) => {
                self.commit_order(order, SortState::new(column, direction));
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Drive sorts and fetches until no work remains, yielding to the runtime
    /// between sort batches
    #[tracing::instrument(skip_all)]
    pub async fn run_until_idle(&mut self) {
        loop {
            while self.sorter.has_pending() {
                self.tick_sort();
                tokio::task::yield_now().await;
            }
            let outcome = match self.remote.as_mut() {
                Some(remote) => remote.next_outcome().await,
                None => None,
            };
            match outcome {
                Some(outcome) => self.handle_outcome(outcome),
                None => break,
            }
        }
    }

    // Publishing

    fn current_window(&self, surviving: usize) -> PageWindow {
        if self.server_paging() {
            PageWindow {
                start: 0,
                end: surviving.min(self.pager.page_size()),
            }
        } else {
            PageController::compute_window(
                self.pager.current_page(),
                self.pager.page_size(),
                surviving,
            )
        }
    }

    /// Re-clamp the page against the surviving rows and publish the window
    fn publish_window(&mut self) {
        let surviving = self.filters.surviving(&self.order).len();
        if !self.server_paging() {
            self.pager.set_total_row_count(surviving);
        }
        let window = self.current_window(surviving);
        self.store.set_visible_window(window.start, window.end);

        let page = (self.pager.current_page(), self.pager.max_page(), window);
        if self.last_page != Some(page) {
            self.last_page = Some(page);
            self.emit(ViewEvent::PageChanged {
                page: page.0 + 1,
                max_page: page.1,
                start: window.start,
                end: window.end,
            });
        }
    }

    fn emit(&mut self, event: ViewEvent) {
        tracing::debug!(event = event.name(), "view event");
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

impl<S: RowStore> std::fmt::Debug for ViewEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewEngine")
            .field("rows", &self.store.raw_row_count())
            .field("page", &self.pager.state())
            .field("sort", &self.sort_state)
            .field("filters", &self.filters.predicates().len())
            .field("remote", &self.remote)
            .finish()
    }
}

fn rows_in_order<'a, S: RowStore>(store: &'a S, order: &[RowId]) -> Vec<&'a RowRecord> {
    order.iter().filter_map(|id| store.row(*id)).collect()
}
