use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shape tag recorded with every cache entry, reported by `describe()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheShape {
    Scalar,
    Sequence,
    Mapping,
}

/// A cacheable payload. `Null` and empty collections are legal values,
/// distinct from a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "data")]
pub enum CacheValue {
    Null,
    Scalar(String),
    Sequence(Vec<Value>),
    /// Key order is preserved (serde_json with preserve_order), so
    /// mappings round-trip deterministically.
    Mapping(serde_json::Map<String, Value>),
}

impl CacheValue {
    pub fn shape(&self) -> CacheShape {
        match self {
            CacheValue::Null | CacheValue::Scalar(_) => CacheShape::Scalar,
            CacheValue::Sequence(_) => CacheShape::Sequence,
            CacheValue::Mapping(_) => CacheShape::Mapping,
        }
    }

    pub fn element_count(&self) -> usize {
        match self {
            CacheValue::Null => 0,
            CacheValue::Scalar(_) => 1,
            CacheValue::Sequence(items) => items.len(),
            CacheValue::Mapping(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CacheValue::Null => true,
            CacheValue::Scalar(s) => s.is_empty(),
            CacheValue::Sequence(items) => items.is_empty(),
            CacheValue::Mapping(map) => map.is_empty(),
        }
    }
}

impl From<&str> for CacheValue {
    fn from(s: &str) -> Self {
        CacheValue::Scalar(s.to_string())
    }
}

impl From<Vec<Value>> for CacheValue {
    fn from(items: Vec<Value>) -> Self {
        CacheValue::Sequence(items)
    }
}

impl From<serde_json::Map<String, Value>> for CacheValue {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        CacheValue::Mapping(map)
    }
}
