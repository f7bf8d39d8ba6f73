use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection and policy settings for one audited org.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgConfig {
    /// Base URL of the org instance, e.g. `https://example.my.platform.com`.
    pub instance_url: String,
    /// Remote API version segment, e.g. `v60.0`.
    pub api_version: String,
    /// Bearer token for the session.
    pub access_token: String,
    /// Production orgs always enforce quota refusals; sandboxes may
    /// downgrade them to warnings.
    pub is_production: bool,
    /// Cache key prefix, first segment of `<prefix>.<section>.<key>`.
    pub cache_prefix: String,
    pub request_timeout: Duration,
}

impl Default for OrgConfig {
    fn default() -> Self {
        Self {
            instance_url: std::env::var("ORGSCAN_INSTANCE_URL").unwrap_or_default(),
            api_version: std::env::var("ORGSCAN_API_VERSION")
                .unwrap_or_else(|_| "v60.0".to_string()),
            access_token: std::env::var("ORGSCAN_ACCESS_TOKEN").unwrap_or_default(),
            is_production: std::env::var("ORGSCAN_PRODUCTION")
                .map(|v| v == "true")
                .unwrap_or(true),
            cache_prefix: std::env::var("ORGSCAN_CACHE_PREFIX")
                .unwrap_or_else(|_| "orgscan".to_string()),
            request_timeout: Duration::from_secs(
                std::env::var("ORGSCAN_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

impl OrgConfig {
    pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into(),
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_production(mut self, is_production: bool) -> Self {
        self.is_production = is_production;
        self
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Query endpoint for the given surface.
    pub fn query_url(&self, tooling: bool) -> String {
        if tooling {
            format!(
                "{}/services/data/{}/tooling/query",
                self.instance_url, self.api_version
            )
        } else {
            format!(
                "{}/services/data/{}/query",
                self.instance_url, self.api_version
            )
        }
    }
}
