//! Ghost Content API access.
//!
//! [`ContentApi`] is the seam the pipeline talks to; [`GhostClient`] is the
//! reqwest-backed implementation used by the binary, tests substitute in-memory
//! fakes.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ApiEndpoint;
use crate::error::ApiError;
use crate::model::{Post, SiteSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Posts,
    Pages,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Posts => "posts",
            Resource::Pages => "pages",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a browse request, minus the page number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseQuery {
    pub include: Vec<String>,
    pub filter: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u32>,
}

impl BrowseQuery {
    pub fn published(include: &[&str]) -> Self {
        Self {
            include: include.iter().map(|name| name.to_string()).collect(),
            filter: Some("status:published".to_string()),
            order: None,
            limit: None,
        }
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.include.is_empty() {
            params.push(("include", self.include.join(",")));
        }
        if let Some(filter) = &self.filter {
            params.push(("filter", filter.clone()));
        }
        if let Some(order) = &self.order {
            params.push(("order", order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

/// `meta.pagination` of a browse response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub next: Option<u32>,
    #[serde(default)]
    pub prev: Option<u32>,
}

/// One page of a browse response with its records still undecoded.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowsePage {
    pub records: Vec<Value>,
    pub pagination: Pagination,
}

#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetch one page of a resource listing. Pages are 1-based.
    async fn browse(
        &self,
        resource: Resource,
        query: &BrowseQuery,
        page: u32,
    ) -> Result<BrowsePage, ApiError>;

    /// Read a single post by slug, with its authors included.
    async fn read_post(&self, slug: &str) -> Result<Post, ApiError>;

    async fn settings(&self) -> Result<SiteSettings, ApiError>;
}

#[derive(Debug, Clone)]
pub struct GhostClient {
    client: Client,
    endpoint: ApiEndpoint,
}

impl GhostClient {
    pub fn new(client: Client, endpoint: ApiEndpoint) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    fn content_url(&self, path: &str) -> String {
        let version = self.endpoint.version.trim_matches('/');
        if version.is_empty() {
            format!("{}/ghost/api/content/{}/", self.endpoint.url, path)
        } else {
            format!("{}/ghost/api/{}/content/{}/", self.endpoint.url, version, path)
        }
    }

    async fn get_json(
        &self,
        label: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ApiError> {
        let url = self.content_url(path);
        debug!(%url, ?params, "Content API request");

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.endpoint.key.as_str())])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                resource: label.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl ContentApi for GhostClient {
    async fn browse(
        &self,
        resource: Resource,
        query: &BrowseQuery,
        page: u32,
    ) -> Result<BrowsePage, ApiError> {
        let mut params = query.params();
        params.push(("page", page.to_string()));

        let body = self
            .get_json(resource.as_str(), resource.as_str(), &params)
            .await?;
        parse_browse_body(resource, body)
    }

    async fn read_post(&self, slug: &str) -> Result<Post, ApiError> {
        let path = format!("posts/slug/{slug}");
        let params = [("include", "authors".to_string())];
        let mut body = self.get_json("posts", &path, &params).await?;

        let mut posts: Vec<Post> = decode_field("posts", &mut body, "posts")?;
        if posts.is_empty() {
            return Err(ApiError::NotFound {
                resource: "posts".to_string(),
                key: slug.to_string(),
            });
        }
        Ok(posts.swap_remove(0))
    }

    async fn settings(&self) -> Result<SiteSettings, ApiError> {
        let mut body = self.get_json("settings", "settings", &[]).await?;
        decode_field("settings", &mut body, "settings")
    }
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Pagination,
}

pub(crate) fn parse_browse_body(resource: Resource, mut body: Value) -> Result<BrowsePage, ApiError> {
    let records: Vec<Value> = decode_field(resource.as_str(), &mut body, resource.as_str())?;
    let meta: Meta = decode_field(resource.as_str(), &mut body, "meta")?;
    Ok(BrowsePage {
        records,
        pagination: meta.pagination,
    })
}

fn decode_field<T: DeserializeOwned>(
    label: &str,
    body: &mut Value,
    field: &str,
) -> Result<T, ApiError> {
    let value = body.get_mut(field).map(Value::take).unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|source| ApiError::Decode {
        resource: label.to_string(),
        source,
    })
}
