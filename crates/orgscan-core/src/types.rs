use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A raw result row as returned by either query surface.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Caller-supplied parameters for a dataset or recipe run, keyed by
/// parameter name. Ordered so derived cache keys are deterministic.
pub type Parameters = BTreeMap<String, String>;

/// Which remote query surface a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QuerySurface {
    #[default]
    Data,
    Tooling,
}

impl fmt::Display for QuerySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuerySurface::Data => write!(f, "data"),
            QuerySurface::Tooling => write!(f, "tooling"),
        }
    }
}

/// The kinds of metadata records the pipeline understands. The full
/// record-shape catalog lives outside the core; these are the kinds the
/// built-in datasets and rules operate on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    CustomObject,
    CustomField,
    Profile,
    PermissionSet,
    User,
    PublicGroup,
    Flow,
    ApexClass,
    ApexTrigger,
    ValidationRule,
    Other(String),
}

impl RecordKind {
    /// Whether members of this kind carry an active/inactive flag that
    /// dependency views break out separately.
    pub fn has_active_flag(&self) -> bool {
        matches!(
            self,
            RecordKind::User
                | RecordKind::Flow
                | RecordKind::ApexTrigger
                | RecordKind::ValidationRule
        )
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::CustomObject => "CustomObject",
            RecordKind::CustomField => "CustomField",
            RecordKind::Profile => "Profile",
            RecordKind::PermissionSet => "PermissionSet",
            RecordKind::User => "User",
            RecordKind::PublicGroup => "PublicGroup",
            RecordKind::Flow => "Flow",
            RecordKind::ApexClass => "ApexClass",
            RecordKind::ApexTrigger => "ApexTrigger",
            RecordKind::ValidationRule => "ValidationRule",
            RecordKind::Other(s) => s.as_str(),
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RecordKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "CustomObject" => RecordKind::CustomObject,
            "CustomField" => RecordKind::CustomField,
            "Profile" => RecordKind::Profile,
            "PermissionSet" => RecordKind::PermissionSet,
            "User" => RecordKind::User,
            "PublicGroup" => RecordKind::PublicGroup,
            "Flow" => RecordKind::Flow,
            "ApexClass" => RecordKind::ApexClass,
            "ApexTrigger" => RecordKind::ApexTrigger,
            "ValidationRule" => RecordKind::ValidationRule,
            other => RecordKind::Other(other.to_string()),
        })
    }
}

/// Request shape for bulk metadata reads: a metadata type plus the member
/// names wanted, where `"*"` selects every member of the type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataDescriptor {
    #[serde(rename = "type")]
    pub metadata_type: String,
    pub members: Vec<String>,
}

impl MetadataDescriptor {
    pub fn new(metadata_type: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            metadata_type: metadata_type.into(),
            members,
        }
    }

    pub fn all(metadata_type: impl Into<String>) -> Self {
        Self::new(metadata_type, vec!["*".to_string()])
    }

    pub fn is_wildcard(&self) -> bool {
        self.members.iter().any(|m| m == "*")
    }
}
