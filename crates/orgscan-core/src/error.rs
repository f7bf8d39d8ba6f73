use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrgScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Caller misuse: missing parameters, unknown aliases, violated
    /// dependency contracts. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Admission refused because remote quota usage is critically high.
    /// The caller may retry once quota recovers.
    #[error("Quota exceeded: remote API usage at {:.0}% of the limit", .used_ratio * 100.0)]
    QuotaExceeded { used_ratio: f64 },

    /// The remote API rejected a query with a code outside the bypass
    /// list. Aborts the whole batch the query belonged to.
    #[error("Query failed ({code}): {cause} [query: {query}]")]
    Query {
        query: String,
        code: String,
        cause: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl OrgScanError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        OrgScanError::Configuration(msg.into())
    }

    /// Stable machine-readable code matching the error taxonomy, for
    /// callers that report errors outside the process.
    pub fn code(&self) -> &'static str {
        match self {
            OrgScanError::Io(_) => "IO_ERROR",
            OrgScanError::Serialization(_) => "SERIALIZATION_ERROR",
            OrgScanError::Configuration(_) => "CONFIGURATION_ERROR",
            OrgScanError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            OrgScanError::Query { .. } => "QUERY_ERROR",
            OrgScanError::Transport(_) => "TRANSPORT_ERROR",
            OrgScanError::Compression(_) => "COMPRESSION_ERROR",
            OrgScanError::Cache(_) => "CACHE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrgScanError>;
