pub mod descriptor;
pub mod executor;
pub mod rate_guard;
pub mod transport;

pub use descriptor::QueryDescriptor;
pub use executor::{QueryExecutor, CUSTOM_PAGE_WINDOW};
pub use rate_guard::{
    GuardPolicy, QuotaState, QuotaZone, RateGuard, CRITICAL_THRESHOLD, FRESHNESS_WINDOW,
    WARNING_THRESHOLD,
};
pub use transport::HttpTransport;

// Re-export common types for convenience
pub use orgscan_core::{OrgScanError, QueryPage, QueryTransport, Result, Row};
