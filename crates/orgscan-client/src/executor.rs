use crate::{QueryDescriptor, RateGuard};
use orgscan_core::{OrgScanError, QueryPage, QueryTransport, Result, Row};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Page size for the windowed custom pagination fallback; matches the
/// remote surface's per-query row ceiling.
pub const CUSTOM_PAGE_WINDOW: usize = 2000;

/// Issues batched queries against the remote surfaces, handling both
/// pagination protocols and bypassable server errors. Every network call
/// is wrapped by the shared [`RateGuard`].
pub struct QueryExecutor {
    transport: Arc<dyn QueryTransport>,
    guard: Arc<RateGuard>,
}

impl QueryExecutor {
    pub fn new(transport: Arc<dyn QueryTransport>, guard: Arc<RateGuard>) -> Self {
        Self { transport, guard }
    }

    pub fn guard(&self) -> &Arc<RateGuard> {
        &self.guard
    }

    /// Runs each descriptor in order and returns one row-list per
    /// request, 1:1 with the input. The first non-bypassed failure
    /// abandons the remaining requests; no partial batch is returned.
    pub async fn run_batch(&self, descriptors: &[QueryDescriptor]) -> Result<Vec<Vec<Row>>> {
        let mut results = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            results.push(self.run(descriptor).await?);
        }
        Ok(results)
    }

    pub async fn run(&self, descriptor: &QueryDescriptor) -> Result<Vec<Row>> {
        descriptor.validate()?;
        self.guard.before_request()?;

        let outcome = match &descriptor.ordering_field {
            Some(field) => self.run_windowed(descriptor, field).await,
            None => self.run_native(descriptor).await,
        };

        match outcome {
            Err(OrgScanError::Query { code, cause, .. }) if descriptor.bypasses(&code) => {
                warn!(code = %code, cause = %cause, query = %descriptor.query, "bypassed server error, treating as zero rows");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Record the quota usage a page reported. Propagates the guard's
    /// refusal when this very page pushed usage into the red zone, so
    /// the failure lands between calls rather than mid-flight.
    fn observe(&self, page: &QueryPage) -> Result<()> {
        match page.quota_used_ratio {
            Some(ratio) => self.guard.after_request(ratio),
            None => Ok(()),
        }
    }

    /// Native link-based continuation: follow the locator until the
    /// server reports completion.
    async fn run_native(&self, descriptor: &QueryDescriptor) -> Result<Vec<Row>> {
        let mut page = self
            .transport
            .query(descriptor.surface, &descriptor.query)
            .await?;
        self.observe(&page)?;
        let mut rows = std::mem::take(&mut page.rows);

        while !page.done {
            let locator = page.next_locator.take().ok_or_else(|| {
                OrgScanError::Transport("continuation reported but no locator supplied".to_string())
            })?;
            self.guard.before_request()?;
            page = self.transport.query_next(descriptor.surface, &locator).await?;
            self.observe(&page)?;
            rows.extend(std::mem::take(&mut page.rows));
        }

        debug!(rows = rows.len(), query = %descriptor.query, "native pagination complete");
        Ok(rows)
    }

    /// Windowed custom pagination for entities that reject the native
    /// protocol: bounded ordered queries filtered to `field > last_seen`
    /// until a page comes back short of the window.
    async fn run_windowed(&self, descriptor: &QueryDescriptor, field: &str) -> Result<Vec<Row>> {
        let mut rows: Vec<Row> = Vec::new();
        let mut last_seen: Option<String> = None;

        loop {
            if last_seen.is_some() {
                self.guard.before_request()?;
            }
            let window_query = build_window_query(&descriptor.query, field, last_seen.as_deref());
            let page = self.transport.query(descriptor.surface, &window_query).await?;
            self.observe(&page)?;

            let fetched = page.rows.len();
            if let Some(last_row) = page.rows.last() {
                last_seen = Some(ordering_literal(last_row, field, &descriptor.query)?);
            }
            rows.extend(page.rows);

            if fetched < CUSTOM_PAGE_WINDOW {
                break;
            }
        }

        debug!(rows = rows.len(), query = %descriptor.query, "windowed pagination complete");
        Ok(rows)
    }
}

fn build_window_query(base: &str, field: &str, last_seen: Option<&str>) -> String {
    let mut query = base.trim_end().to_string();
    if let Some(literal) = last_seen {
        let connective = if query.to_ascii_uppercase().contains(" WHERE ") {
            "AND"
        } else {
            "WHERE"
        };
        query.push_str(&format!(" {connective} {field} > {literal}"));
    }
    query.push_str(&format!(" ORDER BY {field} LIMIT {CUSTOM_PAGE_WINDOW}"));
    query
}

/// Renders the ordering field of a row as a query literal for the next
/// window's comparison filter.
fn ordering_literal(row: &Row, field: &str, query: &str) -> Result<String> {
    match row.get(field) {
        Some(Value::String(s)) => Ok(format!("'{}'", s.replace('\'', "\\'"))),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(OrgScanError::Query {
            query: query.to_string(),
            code: "UNORDERABLE_FIELD".to_string(),
            cause: format!("ordering field {field} has non-orderable value {other}"),
        }),
        None => Err(OrgScanError::Query {
            query: query.to_string(),
            code: "MISSING_ORDERING_FIELD".to_string(),
            cause: format!("ordering field {field} absent from result row"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn window_query_first_page_has_no_filter() {
        let q = build_window_query("SELECT Id FROM EntityDefinition", "DurableId", None);
        assert_eq!(
            q,
            "SELECT Id FROM EntityDefinition ORDER BY DurableId LIMIT 2000"
        );
    }

    #[test]
    fn window_query_appends_where_or_and() {
        let q = build_window_query("SELECT Id FROM EntityDefinition", "DurableId", Some("'Acc'"));
        assert!(q.contains("WHERE DurableId > 'Acc'"));

        let q = build_window_query(
            "SELECT Id FROM EntityDefinition WHERE IsCustom = true",
            "DurableId",
            Some("'Acc'"),
        );
        assert!(q.contains("AND DurableId > 'Acc'"));
        assert!(q.ends_with("ORDER BY DurableId LIMIT 2000"));
    }

    #[test]
    fn ordering_literal_quotes_strings_and_not_numbers() {
        let row: Row = json!({"Id": "001A", "Seq": 42})
            .as_object()
            .unwrap()
            .clone();
        assert_eq!(ordering_literal(&row, "Id", "q").unwrap(), "'001A'");
        assert_eq!(ordering_literal(&row, "Seq", "q").unwrap(), "42");
        assert!(ordering_literal(&row, "Missing", "q").is_err());
    }
}
