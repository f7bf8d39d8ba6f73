use orgscan_core::RecordKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One related item in a dependency view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyItem {
    pub id: String,
    pub name: String,
    pub kind: RecordKind,
}

/// Aggregate usage of one record type within a view's referenced-by
/// side. `inactive` is only meaningful for kinds carrying an active
/// flag and stays zero otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeUsageCount {
    pub total: usize,
    pub inactive: usize,
}

/// Per-item "uses / used-by" view, derived from the flat edge list and
/// never persisted. `had_error` marks best-effort enrichment that could
/// not fully resolve; it never fails the surrounding recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyView {
    pub had_error: bool,
    pub using: Vec<DependencyItem>,
    pub referenced_by: Vec<DependencyItem>,
    pub referenced_by_types: HashMap<String, TypeUsageCount>,
}

impl DependencyView {
    pub fn errored() -> Self {
        Self {
            had_error: true,
            ..Default::default()
        }
    }

    pub fn reference_count(&self) -> usize {
        self.referenced_by.len()
    }

    pub fn is_unused(&self) -> bool {
        !self.had_error && self.referenced_by.is_empty()
    }
}
