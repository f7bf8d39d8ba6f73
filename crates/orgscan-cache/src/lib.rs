pub mod store;
pub mod value;

pub use store::{CacheEntryInfo, CacheStore};
pub use value::{CacheShape, CacheValue};

// Re-export common types for convenience
pub use orgscan_core::{OrgScanError, Result};
