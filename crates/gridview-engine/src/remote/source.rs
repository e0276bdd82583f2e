use std::sync::Arc;

use futures::FutureExt;
use gridview_core::{GridError, PageState, Result, SortState, ViewConfig};
use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;

use super::cache::{CacheStats, ResponseCache};
use super::{DataSource, FetchRequest, FetchResponse};

pub type RequestId = u64;

/// How a fetch call was served
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Served from the cache without touching the source
    Cached(Arc<FetchResponse>),
    /// A request was spawned; collect it with [`RemoteSource::next_outcome`]
    Started(RequestId),
}

/// A finished request, successful or not
#[derive(Debug)]
pub struct FetchOutcome {
    pub id: RequestId,
    pub request: FetchRequest,
    pub key: String,
    pub result: Result<Arc<FetchResponse>>,
}

struct InFlight {
    id: RequestId,
    request: FetchRequest,
    key: String,
    handle: JoinHandle<Result<FetchResponse>>,
}

/// Issues requests to a [`DataSource`], at most one at a time, and caches
/// successful responses.
pub struct RemoteSource {
    source: Arc<dyn DataSource>,
    cache: ResponseCache,
    cache_enabled: bool,
    server_paging: bool,
    server_sort: bool,
    in_flight: Option<InFlight>,
    next_id: RequestId,
}

impl RemoteSource {
    pub fn new(source: Arc<dyn DataSource>, config: &ViewConfig) -> Self {
        Self {
            source,
            cache: ResponseCache::new(),
            cache_enabled: config.cache_responses,
            server_paging: config.server_paging,
            server_sort: config.server_sort,
            in_flight: None,
            next_id: 1,
        }
    }

    pub fn server_paging(&self) -> bool {
        self.server_paging
    }

    pub fn server_sort(&self) -> bool {
        self.server_sort
    }

    pub fn caching(&self) -> bool {
        self.cache_enabled
    }

    /// Request for the current page and sort, limited to what the server owns
    pub fn build_request(
        &self,
        page: &PageState,
        sort: &SortState,
        config: &ViewConfig,
    ) -> FetchRequest {
        let mut request = FetchRequest::all_rows();
        if self.server_paging {
            request = request.with_page(page.current_page, page.page_size);
        }
        if self.server_sort {
            if let Some(column) = sort.column {
                request = request.with_sort(
                    config.column(column).remote_identifier(),
                    sort.direction.sign(),
                );
            }
        }
        request
    }

    /// Serve `request` from the cache or spawn it on the current runtime.
    ///
    /// Any request still in flight is aborted first; its response is never
    /// delivered.
    pub fn fetch(&mut self, request: FetchRequest) -> Result<Dispatch> {
        self.abort();

        let key = request.cache_key();
        if self.cache_enabled {
            if let Some(response) = self.cache.get(&key) {
                tracing::debug!(key = %key, rows = response.rows.len(), "serving page from cache");
                return Ok(Dispatch::Cached(response));
            }
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            GridError::Configuration("remote fetch needs a running tokio runtime".to_string())
        })?;

        let id = self.next_id;
        self.next_id += 1;

        let source = Arc::clone(&self.source);
        let task_request = request.clone();
        let span = tracing::debug_span!("remote_fetch", request = id, key = %key, source = %source.describe());
        let handle = runtime.spawn(async move { source.fetch(task_request).await }.instrument(span));

        tracing::debug!(request = id, key = %key, "remote fetch started");
        self.in_flight = Some(InFlight {
            id,
            request,
            key,
            handle,
        });
        Ok(Dispatch::Started(id))
    }

    /// Abort the in-flight request, if any
    pub fn abort(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            tracing::debug!(request = in_flight.id, key = %in_flight.key, "aborting superseded fetch");
            in_flight.handle.abort();
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Key of the request currently in flight
    pub fn pending_key(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|f| f.key.as_str())
    }

    /// Wait for the in-flight request to finish.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_outcome(&mut self) -> Option<FetchOutcome> {
        let in_flight = self.in_flight.take()?;
        let joined = in_flight.handle.await;
        self.complete(in_flight.id, in_flight.request, in_flight.key, joined)
    }

    /// Collect the in-flight request only if it already finished
    pub fn try_next_outcome(&mut self) -> Option<FetchOutcome> {
        let finished = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.handle.is_finished());
        if !finished {
            return None;
        }

        let mut in_flight = self.in_flight.take()?;
        match (&mut in_flight.handle).now_or_never() {
            Some(joined) => self.complete(in_flight.id, in_flight.request, in_flight.key, joined),
            None => {
                self.in_flight = Some(in_flight);
                None
            }
        }
    }

    fn complete(
        &mut self,
        id: RequestId,
        request: FetchRequest,
        key: String,
        joined: std::result::Result<Result<FetchResponse>, JoinError>,
    ) -> Option<FetchOutcome> {
        let result = match joined {
            Ok(Ok(response)) => {
                let response = Arc::new(response);
                if self.cache_enabled {
                    self.cache.put(key.clone(), Arc::clone(&response));
                }
                tracing::info!(request = id, key = %key, rows = response.rows.len(), "remote fetch completed");
                Ok(response)
            }
            Ok(Err(err)) => {
                tracing::warn!(request = id, key = %key, error = %err, "remote fetch failed");
                Err(err)
            }
            Err(err) if err.is_cancelled() => {
                tracing::debug!(request = id, "fetch task was cancelled");
                return None;
            }
            Err(err) => {
                tracing::warn!(request = id, key = %key, error = %err, "fetch task panicked");
                Err(GridError::fetch(format!("request task failed: {err}")))
            }
        };
        Some(FetchOutcome {
            id,
            request,
            key,
            result,
        })
    }

    /// Drop all cached responses
    pub fn clear_cache(&mut self) {
        tracing::debug!(entries = self.cache.stats().entry_count, "clearing response cache");
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Drop for RemoteSource {
    fn drop(&mut self) {
        self.abort();
    }
}

impl std::fmt::Debug for RemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSource")
            .field("source", &self.source.describe())
            .field("server_paging", &self.server_paging)
            .field("server_sort", &self.server_sort)
            .field("cache", &self.cache.stats())
            .field("in_flight", &self.pending_key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gridview_core::{ColumnSpec, ColumnType, SortDirection};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataSource for CountingSource {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchResponse::new(vec![vec![request.cache_key()]]).with_total(1))
        }
    }

    fn remote(config: &ViewConfig) -> (Arc<CountingSource>, RemoteSource) {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let remote = RemoteSource::new(source.clone(), config);
        (source, remote)
    }

    #[test]
    fn request_only_carries_delegated_state() {
        let config = ViewConfig::default()
            .with_server_sort(true)
            .with_columns(vec![ColumnSpec::new(1, ColumnType::StrSensitive).named("name")]);
        let (_, remote) = remote(&config);
        let page = PageState {
            current_page: 3,
            page_size: 10,
            total_row_count: 100,
        };

        let request = remote.build_request(
            &page,
            &SortState::new(1, SortDirection::Descending),
            &config,
        );
        assert_eq!(request.page, None);
        assert_eq!(request.sort_column.as_deref(), Some("name"));
        assert_eq!(request.sort_direction, Some(-1));

        let unsorted = remote.build_request(&page, &SortState::unsorted(), &config);
        assert_eq!(unsorted, FetchRequest::all_rows());
    }

    #[test]
    fn fetch_outside_a_runtime_is_an_error() {
        let (_, mut remote) = remote(&ViewConfig::default());
        let result = remote.fetch(FetchRequest::all_rows());
        assert!(matches!(result, Err(GridError::Configuration(_))));
        assert!(!remote.is_loading());
    }

    #[tokio::test]
    async fn second_fetch_of_a_key_is_served_from_cache() {
        let (source, mut remote) = remote(&ViewConfig::default());
        let request = FetchRequest::all_rows().with_page(2, 10).with_sort("1", 1);

        assert!(matches!(remote.fetch(request.clone()), Ok(Dispatch::Started(_))));
        let outcome = remote.next_outcome().await.unwrap();
        assert_eq!(outcome.key, "2_10_1_1");
        assert!(outcome.result.is_ok());

        match remote.fetch(request) {
            Ok(Dispatch::Cached(response)) => assert_eq!(response.rows[0][0], "2_10_1_1"),
            other => panic!("expected cached response, got {:?}", other),
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(remote.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn disabled_cache_always_fetches() {
        let (source, mut remote) = remote(&ViewConfig::default().with_cache(false));
        for _ in 0..2 {
            remote.fetch(FetchRequest::all_rows()).unwrap();
            remote.next_outcome().await.unwrap();
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(remote.cache_stats().entry_count, 0);
    }
}
