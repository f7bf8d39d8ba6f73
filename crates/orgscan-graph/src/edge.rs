use orgscan_core::{RecordKind, Row};
use serde::{Deserialize, Serialize};

/// One directed "uses" relationship between two metadata items, as
/// reported by the remote dependency API. Directionless at rest; the
/// builder interprets it from a given item's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source_id: String,
    pub source_type: RecordKind,
    pub target_id: String,
    pub target_type: RecordKind,
    pub target_name: String,
}

impl DependencyEdge {
    pub fn new(
        source_id: impl Into<String>,
        source_type: RecordKind,
        target_id: impl Into<String>,
        target_type: RecordKind,
        target_name: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_type,
            target_id: target_id.into(),
            target_type,
            target_name: target_name.into(),
        }
    }

    /// Builds an edge from a raw dependency row; `None` when mandatory
    /// fields are absent (the caller records a partial-data flag rather
    /// than failing).
    pub fn from_row(row: &Row) -> Option<Self> {
        let field = |name: &str| row.get(name)?.as_str().map(str::to_string);
        Some(Self {
            source_id: field("MetadataComponentId")?,
            source_type: field("MetadataComponentType")?.parse().ok()?,
            target_id: field("RefMetadataComponentId")?,
            target_type: field("RefMetadataComponentType")?.parse().ok()?,
            target_name: field("RefMetadataComponentName")?,
        })
    }
}
