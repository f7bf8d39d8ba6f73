pub mod compression;
pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use compression::{Compressor, NoopCompressor, ZstdCompressor};
pub use config::OrgConfig;
pub use error::{OrgScanError, Result};
pub use logging::SectionLogger;
pub use traits::{QueryPage, QueryTransport};
pub use types::{MetadataDescriptor, Parameters, QuerySurface, RecordKind, Row};
