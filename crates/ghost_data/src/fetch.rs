use std::time::Duration;

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::api::{BrowseQuery, ContentApi, Pagination, Resource};
use crate::config::{FetchMode, Tunables};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Follow `meta.pagination.next`, pausing between requests.
    Sequential { delay: Duration },
    /// Fetch page 1, then every remaining page in one batch.
    Concurrent,
}

impl FetchStrategy {
    pub fn from_tunables(tunables: &Tunables) -> Self {
        match tunables.fetch_mode {
            FetchMode::Sequential => FetchStrategy::Sequential {
                delay: tunables.fetch_delay,
            },
            FetchMode::Concurrent => FetchStrategy::Concurrent,
        }
    }
}

/// A listing page that could not be fetched, or one record of it that could not be decoded.
#[derive(Debug)]
pub struct PageFailure {
    pub resource: Resource,
    pub page: u32,
    pub error: ApiError,
}

#[derive(Debug)]
pub struct FetchOutcome<T> {
    /// Records of every successful page, in page order.
    pub records: Vec<T>,
    pub failures: Vec<PageFailure>,
    /// Total page count reported by the API, or 0 when page 1 itself failed.
    pub total_pages: u32,
}

impl<T> FetchOutcome<T> {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            failures: Vec::new(),
            total_pages: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn absorb(&mut self, resource: Resource, page: u32, fetched: FetchedPage<T>) {
        info!(
            %resource,
            page,
            pages = fetched.pagination.pages,
            records = fetched.records.len(),
            skipped = fetched.rejected.len(),
            "Fetched page"
        );
        self.records.extend(fetched.records);
        for error in fetched.rejected {
            warn!(%resource, page, %error, "Skipping undecodable record");
            self.failures.push(PageFailure {
                resource,
                page,
                error,
            });
        }
    }

    fn drop_page(&mut self, resource: Resource, page: u32, error: ApiError) {
        warn!(%resource, page, %error, "Dropping page after failed request");
        self.failures.push(PageFailure {
            resource,
            page,
            error,
        });
    }
}

struct FetchedPage<T> {
    records: Vec<T>,
    pagination: Pagination,
    rejected: Vec<ApiError>,
}

/// Retrieve every record of `resource` matching `query`.
///
/// Failed pages never abort the walk: they are logged, recorded in
/// [`FetchOutcome::failures`] and the remaining known pages are still requested.
/// A record that does not decode is skipped and recorded the same way; the rest
/// of its page is kept.
pub async fn fetch_all<T: DeserializeOwned>(
    api: &dyn ContentApi,
    resource: Resource,
    query: &BrowseQuery,
    strategy: FetchStrategy,
) -> FetchOutcome<T> {
    match strategy {
        FetchStrategy::Sequential { delay } => fetch_sequential(api, resource, query, delay).await,
        FetchStrategy::Concurrent => fetch_concurrent(api, resource, query).await,
    }
}

async fn fetch_sequential<T: DeserializeOwned>(
    api: &dyn ContentApi,
    resource: Resource,
    query: &BrowseQuery,
    delay: Duration,
) -> FetchOutcome<T> {
    let mut outcome = FetchOutcome::empty();
    let mut last_page = 1u32;
    let mut current = Some(1u32);

    while let Some(page) = current.filter(|page| *page <= last_page) {
        match fetch_page::<T>(api, resource, query, page).await {
            Ok(fetched) => {
                last_page = fetched.pagination.pages;
                outcome.total_pages = last_page;
                current = fetched.pagination.next.filter(|next| *next > page);
                outcome.absorb(resource, page, fetched);
            }
            Err(error) => {
                outcome.drop_page(resource, page, error);
                current = Some(page + 1);
            }
        }

        let more = current.is_some_and(|next| next <= last_page);
        if more && !delay.is_zero() {
            sleep(delay).await;
        }
    }

    outcome
}

async fn fetch_concurrent<T: DeserializeOwned>(
    api: &dyn ContentApi,
    resource: Resource,
    query: &BrowseQuery,
) -> FetchOutcome<T> {
    let mut outcome = FetchOutcome::empty();

    let first = match fetch_page::<T>(api, resource, query, 1).await {
        Ok(first) => first,
        Err(error) => {
            outcome.drop_page(resource, 1, error);
            return outcome;
        }
    };

    let last_page = first.pagination.pages;
    outcome.total_pages = last_page;
    outcome.absorb(resource, 1, first);

    // join_all yields results in input order, which is page order.
    let rest = join_all((2..=last_page).map(|page| async move {
        (page, fetch_page::<T>(api, resource, query, page).await)
    }))
    .await;

    for (page, result) in rest {
        match result {
            Ok(fetched) => outcome.absorb(resource, page, fetched),
            Err(error) => outcome.drop_page(resource, page, error),
        }
    }

    outcome
}

async fn fetch_page<T: DeserializeOwned>(
    api: &dyn ContentApi,
    resource: Resource,
    query: &BrowseQuery,
    page: u32,
) -> Result<FetchedPage<T>, ApiError> {
    let browsed = api.browse(resource, query, page).await?;
    let mut fetched = FetchedPage {
        records: Vec::with_capacity(browsed.records.len()),
        pagination: browsed.pagination,
        rejected: Vec::new(),
    };

    for record in browsed.records {
        let id = record_label(&record);
        match serde_json::from_value::<T>(record) {
            Ok(decoded) => fetched.records.push(decoded),
            Err(source) => fetched.rejected.push(ApiError::Record {
                resource: resource.to_string(),
                id,
                source,
            }),
        }
    }

    Ok(fetched)
}

fn record_label(record: &Value) -> String {
    record
        .get("slug")
        .or_else(|| record.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string()
}
