use crate::{MetadataDescriptor, QuerySurface, Result, Row};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One page of query results from the remote API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryPage {
    pub rows: Vec<Row>,
    /// Server-reported completion of the native continuation protocol.
    pub done: bool,
    /// Continuation locator to fetch the next page, when `done` is false.
    pub next_locator: Option<String>,
    /// Quota usage ratio reported alongside the response, when the
    /// surface exposes it.
    pub quota_used_ratio: Option<f64>,
}

impl QueryPage {
    pub fn complete(rows: Vec<Row>) -> Self {
        Self {
            rows,
            done: true,
            ..Default::default()
        }
    }
}

/// Raw query transport supplied by the hosting environment. Server-side
/// query rejections surface as `OrgScanError::Query` carrying the
/// server's error code; anything else is a transport-level failure.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Execute a query and return its first page.
    async fn query(&self, surface: QuerySurface, query: &str) -> Result<QueryPage>;

    /// Follow a continuation locator returned by an earlier page.
    async fn query_next(&self, surface: QuerySurface, locator: &str) -> Result<QueryPage>;

    /// Bulk-read metadata members (supports `"*"` wildcards).
    async fn read_metadata(&self, descriptors: &[MetadataDescriptor]) -> Result<Vec<Row>>;
}
