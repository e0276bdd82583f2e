use async_trait::async_trait;
use gridview_core::{GridError, Result};

use super::{DataSource, FetchRequest, FetchResponse};

/// Fetches pages from an HTTP endpoint.
///
/// Request state goes into the query string (`page`, `page_size`,
/// `sort_column`, `sort_direction`); the body must be
/// `{"rows": [[...], ...], "total_rows": n}` with `total_rows` optional.
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    client: reqwest::Client,
    url: String,
}

impl HttpDataSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let response = self
            .client
            .get(&self.url)
            .query(&request.query_params())
            .send()
            .await
            .map_err(|e| GridError::Fetch {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GridError::Fetch {
                status: Some(status.as_u16()),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }

        response
            .json::<FetchResponse>()
            .await
            .map_err(|e| GridError::Fetch {
                status: Some(status.as_u16()),
                message: format!("invalid response body: {e}"),
            })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
