use async_trait::async_trait;
use orgscan_core::{
    MetadataDescriptor, OrgConfig, OrgScanError, QueryPage, QuerySurface, QueryTransport, Result,
    Row,
};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Response header carrying quota usage as `api-usage=<used>/<limit>`.
const LIMIT_INFO_HEADER: &str = "Sforce-Limit-Info";

/// Wire shape of a successful query response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponseBody {
    #[serde(default)]
    records: Vec<Row>,
    #[serde(default)]
    done: bool,
    next_records_url: Option<String>,
}

/// Wire shape of a server-reported query rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    error_code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct MetadataReadBody<'a> {
    descriptors: &'a [MetadataDescriptor],
}

/// HTTP implementation of [`QueryTransport`] against the org's REST
/// query endpoints.
pub struct HttpTransport {
    client: Client,
    config: OrgConfig,
}

impl HttpTransport {
    pub fn new(config: OrgConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| OrgScanError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn parse_quota(response: &Response) -> Option<f64> {
        let header = response.headers().get(LIMIT_INFO_HEADER)?.to_str().ok()?;
        // e.g. "api-usage=9134/15000"
        let usage = header.strip_prefix("api-usage=")?;
        let (used, limit) = usage.split_once('/')?;
        let used: f64 = used.trim().parse().ok()?;
        let limit: f64 = limit.trim().parse().ok()?;
        (limit > 0.0).then(|| used / limit)
    }

    async fn into_page(response: Response, query: &str) -> Result<QueryPage> {
        let quota_used_ratio = Self::parse_quota(&response);
        let status = response.status();
        if status.is_success() {
            let body: QueryResponseBody = response
                .json()
                .await
                .map_err(|e| OrgScanError::Transport(e.to_string()))?;
            debug!(rows = body.records.len(), done = body.done, "query page");
            return Ok(QueryPage {
                rows: body.records,
                done: body.done,
                next_locator: body.next_records_url,
                quota_used_ratio,
            });
        }

        // The server reports rejections as a JSON array of coded errors.
        let text = response
            .text()
            .await
            .map_err(|e| OrgScanError::Transport(e.to_string()))?;
        match serde_json::from_str::<Vec<ApiErrorBody>>(&text) {
            Ok(errors) if !errors.is_empty() => {
                let first = &errors[0];
                warn!(code = %first.error_code, status = %status, "query rejected");
                Err(OrgScanError::Query {
                    query: query.to_string(),
                    code: first.error_code.clone(),
                    cause: first.message.clone(),
                })
            }
            _ => Err(OrgScanError::Transport(format!(
                "unexpected status {status}: {text}"
            ))),
        }
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn query(&self, surface: QuerySurface, query: &str) -> Result<QueryPage> {
        let url = self.config.query_url(surface == QuerySurface::Tooling);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| OrgScanError::Transport(e.to_string()))?;
        Self::into_page(response, query).await
    }

    async fn query_next(&self, _surface: QuerySurface, locator: &str) -> Result<QueryPage> {
        // Locators are server-relative URLs.
        let url = format!("{}{}", self.config.instance_url, locator);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| OrgScanError::Transport(e.to_string()))?;
        Self::into_page(response, locator).await
    }

    async fn read_metadata(&self, descriptors: &[MetadataDescriptor]) -> Result<Vec<Row>> {
        let url = format!(
            "{}/services/data/{}/metadata/read",
            self.config.instance_url, self.config.api_version
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&MetadataReadBody { descriptors })
            .send()
            .await
            .map_err(|e| OrgScanError::Transport(e.to_string()))?;
        if response.status() == StatusCode::OK {
            response
                .json()
                .await
                .map_err(|e| OrgScanError::Transport(e.to_string()))
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(OrgScanError::Transport(format!(
                "metadata read failed with {status}: {text}"
            )))
        }
    }
}
