//! Full catalog download: paginated match-all query with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use crate::error::FetchError;
use crate::recipe::Recipe;
use crate::remote::{QueryPage, QueryRequest, RecordDatabase};

/// Fixed-delay retry applied to each page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per page, first try included.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// A successful fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Decoded recipes, sorted by name.
    pub recipes: Vec<Recipe>,
    /// Records that failed or could not be decoded.
    pub skipped: usize,
    pub pages: usize,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.skipped == 0
    }
}

/// Sort by name (ordinal), ties broken by id.
pub fn sort_by_name(recipes: &mut [Recipe]) {
    recipes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

#[derive(Clone)]
pub struct CatalogFetcher {
    database: Arc<dyn RecordDatabase>,
    record_type: String,
    policy: RetryPolicy,
}

impl CatalogFetcher {
    pub fn new(database: Arc<dyn RecordDatabase>, record_type: impl Into<String>) -> Self {
        Self {
            database,
            record_type: record_type.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Download every page of the catalog.
    pub async fn fetch_catalog(&self) -> Result<FetchReport, FetchError> {
        let mut report = FetchReport::default();
        let mut request = QueryRequest::Start {
            record_type: self.record_type.clone(),
        };

        loop {
            let page = self.query_with_retry(&request, report.pages).await?;
            report.pages += 1;

            for result in page.records {
                let record = match result {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!("Skipping failed record: {}", e);
                        report.skipped += 1;
                        continue;
                    }
                };
                match Recipe::try_from(&record) {
                    Ok(recipe) => report.recipes.push(recipe),
                    Err(e) => {
                        tracing::warn!("Skipping undecodable record: {}", e);
                        report.skipped += 1;
                    }
                }
            }

            match page.cursor {
                Some(cursor) => request = QueryRequest::Continue { cursor },
                None => break,
            }
        }

        sort_by_name(&mut report.recipes);
        tracing::info!(
            "Fetched {} recipes from {} ({} page(s), {} skipped)",
            report.recipes.len(),
            self.database.backend_name(),
            report.pages,
            report.skipped
        );
        Ok(report)
    }

    async fn query_with_retry(
        &self,
        request: &QueryRequest,
        page: usize,
    ) -> Result<QueryPage, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.database.query(request.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let err = FetchError::new(e, attempt);
                    if !err.kind.is_retryable() || attempt >= max_attempts {
                        tracing::error!("Page {} failed permanently: {}", page, err);
                        return Err(err);
                    }
                    tracing::warn!(
                        "Page {} failed (attempt {}/{}), retrying in {:?}: {}",
                        page,
                        attempt,
                        max_attempts,
                        self.policy.delay,
                        err.source
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }
}
