use orgscan_core::{RecordKind, Row};
use orgscan_graph::DependencyView;
use serde::{Deserialize, Serialize};

/// Raw material for building one typed record: the row the query surface
/// returned plus, for kinds that require it, the item's dependency view.
#[derive(Debug, Clone, Default)]
pub struct RecordSetup {
    pub row: Row,
    pub dependencies: Option<DependencyView>,
}

impl RecordSetup {
    pub fn from_row(row: Row) -> Self {
        Self {
            row,
            dependencies: None,
        }
    }

    pub fn with_dependencies(mut self, view: DependencyView) -> Self {
        self.dependencies = Some(view);
        self
    }
}

fn scored_default() -> bool {
    // Records coming out of the cache were scored before being stored.
    true
}

/// A normalized metadata record with its badness score. The scoring
/// invariant holds at all times:
/// `bad_fields.len() == bad_reason_ids.len() == score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: String,
    pub name: String,
    pub kind: RecordKind,
    pub properties: Row,
    pub dependencies: Option<DependencyView>,
    pub score: u32,
    pub bad_fields: Vec<String>,
    pub bad_reason_ids: Vec<u32>,
    #[serde(skip_serializing, skip_deserializing, default = "scored_default")]
    pub(crate) scored: bool,
}

impl ScoredRecord {
    pub(crate) fn new(id: String, name: String, kind: RecordKind, setup: RecordSetup) -> Self {
        Self {
            id,
            name,
            kind,
            properties: setup.row,
            dependencies: setup.dependencies,
            score: 0,
            bad_fields: Vec::new(),
            bad_reason_ids: Vec::new(),
            scored: false,
        }
    }

    pub fn str_prop(&self, field: &str) -> Option<&str> {
        self.properties.get(field)?.as_str()
    }

    pub fn bool_prop(&self, field: &str) -> Option<bool> {
        self.properties.get(field)?.as_bool()
    }

    pub fn num_prop(&self, field: &str) -> Option<f64> {
        self.properties.get(field)?.as_f64()
    }

    /// True when the field is absent, null, or an empty/whitespace
    /// string. The most common rule predicate shape.
    pub fn prop_is_blank(&self, field: &str) -> bool {
        match self.properties.get(field) {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.bool_prop("IsActive").unwrap_or(true)
    }

    /// Whether the given rule flagged this record.
    pub fn violates(&self, rule_id: u32) -> bool {
        self.bad_reason_ids.contains(&rule_id)
    }

    pub(crate) fn mark_bad(&mut self, rule_id: u32, field: &str) {
        self.bad_reason_ids.push(rule_id);
        self.bad_fields.push(field.to_string());
        self.score += 1;
    }
}
