use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column header of a usage matrix, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixHeader {
    pub id: String,
    pub label: String,
}

/// One matrix row: a display label plus a sparse column-id → value map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub header: String,
    pub cells: BTreeMap<String, String>,
}

/// Permission-grid style result (e.g. object × profile): ordered column
/// headers, rows keyed by row id, sparsely populated cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMatrix {
    pub headers: Vec<MatrixHeader>,
    pub rows: BTreeMap<String, MatrixRow>,
}

impl UsageMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a column, keeping first-seen order; a repeated id is a
    /// no-op.
    pub fn add_header(&mut self, id: impl Into<String>, label: impl Into<String>) {
        let id = id.into();
        if self.headers.iter().all(|h| h.id != id) {
            self.headers.push(MatrixHeader {
                id,
                label: label.into(),
            });
        }
    }

    pub fn set_row_header(&mut self, row_id: impl Into<String>, label: impl Into<String>) {
        self.rows.entry(row_id.into()).or_default().header = label.into();
    }

    pub fn set_cell(
        &mut self,
        row_id: impl Into<String>,
        column_id: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.rows
            .entry(row_id.into())
            .or_default()
            .cells
            .insert(column_id.into(), value.into());
    }

    pub fn cell(&self, row_id: &str, column_id: &str) -> Option<&str> {
        self.rows
            .get(row_id)?
            .cells
            .get(column_id)
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
