//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use gridview_engine::remote::{DataSource, FetchRequest, FetchResponse};
use gridview_engine::{GridError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Mock remote source that pages and sorts an in-memory row set.
///
/// Sort columns are resolved by name first, then by index. Every request is
/// logged before any delay so tests can see superseded requests too.
pub struct MockDataSource {
    pub rows: Vec<Vec<String>>,
    pub column_names: Vec<String>,
    pub declare_total: bool,
    /// Artificial latency per 0-based page
    pub delays: HashMap<usize, Duration>,
    pub should_fail: Arc<parking_lot::Mutex<bool>>,
    pub request_count: Arc<parking_lot::Mutex<usize>>,
    pub request_log: Arc<parking_lot::Mutex<Vec<FetchRequest>>>,
}

impl MockDataSource {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            column_names: vec![],
            declare_total: true,
            delays: HashMap::new(),
            should_fail: Arc::new(parking_lot::Mutex::new(false)),
            request_count: Arc::new(parking_lot::Mutex::new(0)),
            request_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    /// `count` rows of `["00", "name-<count-1>"]`, `["01", "name-<count-2>"]`, ...
    pub fn numbered(count: usize) -> Self {
        Self::new(
            (0..count)
                .map(|i| vec![format!("{:02}", i), format!("name-{:02}", count - 1 - i)])
                .collect(),
        )
    }

    pub fn with_column_names(mut self, names: &[&str]) -> Self {
        self.column_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_delay(mut self, page: usize, delay: Duration) -> Self {
        self.delays.insert(page, delay);
        self
    }

    pub fn without_total(mut self) -> Self {
        self.declare_total = false;
        self
    }

    pub fn with_failure(self) -> Self {
        *self.should_fail.lock() = true;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        *self.should_fail.lock() = failing;
    }

    pub fn request_count(&self) -> usize {
        *self.request_count.lock()
    }

    pub fn request_log(&self) -> Vec<FetchRequest> {
        self.request_log.lock().clone()
    }

    /// Number of logged requests with the given cache key
    pub fn requests_for(&self, key: &str) -> usize {
        self.request_log
            .lock()
            .iter()
            .filter(|r| r.cache_key() == key)
            .count()
    }

    fn column_index(&self, column: &str) -> usize {
        self.column_names
            .iter()
            .position(|name| name == column)
            .or_else(|| column.parse().ok())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        *self.request_count.lock() += 1;
        self.request_log.lock().push(request.clone());

        let delay = request.page.and_then(|page| self.delays.get(&page).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = *self.should_fail.lock();
        if failing {
            return Err(GridError::Fetch {
                status: Some(503),
                message: "service unavailable".into(),
            });
        }

        let mut rows = self.rows.clone();
        if let Some(column) = &request.sort_column {
            let index = self.column_index(column);
            rows.sort_by(|a, b| a[index].cmp(&b[index]));
            if request.sort_direction == Some(-1) {
                rows.reverse();
            }
        }

        let total = rows.len();
        if let (Some(page), Some(page_size)) = (request.page, request.page_size) {
            rows = rows.into_iter().skip(page * page_size).take(page_size).collect();
        }

        let response = FetchResponse::new(rows);
        Ok(if self.declare_total {
            response.with_total(total)
        } else {
            response
        })
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Rows as owned strings
pub fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
    data.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

/// Drain every event received so far
pub fn drain_events<T>(rx: &mut tokio::sync::mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
