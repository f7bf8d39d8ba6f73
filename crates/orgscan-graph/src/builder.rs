use crate::{DependencyEdge, DependencyItem, DependencyView, TypeUsageCount};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Turns the org's flat dependency edge list into per-item
/// "uses / used-by" views.
///
/// Name resolution for the referencing side comes from the supplied
/// id→name table; an id that cannot be resolved marks the view with
/// `had_error` instead of failing, since dependency data is best-effort
/// enrichment.
pub struct DependencyGraphBuilder {
    edges: Vec<DependencyEdge>,
    names: HashMap<String, String>,
    inactive_ids: HashSet<String>,
}

impl DependencyGraphBuilder {
    pub fn new(edges: Vec<DependencyEdge>) -> Self {
        // Every edge knows its target's name; that seeds the resolver.
        let names = edges
            .iter()
            .map(|e| (e.target_id.clone(), e.target_name.clone()))
            .collect();
        Self {
            edges,
            names,
            inactive_ids: HashSet::new(),
        }
    }

    /// Registers additional id→name pairs, e.g. from already-fetched
    /// record datasets.
    pub fn with_names(mut self, names: impl IntoIterator<Item = (String, String)>) -> Self {
        self.names.extend(names);
        self
    }

    /// Marks the ids whose records are inactive, feeding the per-type
    /// inactive sub-counts.
    pub fn with_inactive(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.inactive_ids.extend(ids);
        self
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// View of the graph from one item's perspective: edges it is the
    /// source of become `using`, edges it is the target of become
    /// `referenced_by`.
    pub fn view_for(&self, item_id: &str) -> DependencyView {
        let mut view = DependencyView::default();

        for edge in &self.edges {
            if edge.source_id == item_id {
                view.using.push(DependencyItem {
                    id: edge.target_id.clone(),
                    name: edge.target_name.clone(),
                    kind: edge.target_type.clone(),
                });
            }
            if edge.target_id == item_id {
                let name = match self.names.get(&edge.source_id) {
                    Some(name) => name.clone(),
                    None => {
                        view.had_error = true;
                        edge.source_id.clone()
                    }
                };
                let entry = view
                    .referenced_by_types
                    .entry(edge.source_type.to_string())
                    .or_insert_with(TypeUsageCount::default);
                entry.total += 1;
                if edge.source_type.has_active_flag()
                    && self.inactive_ids.contains(&edge.source_id)
                {
                    entry.inactive += 1;
                }
                view.referenced_by.push(DependencyItem {
                    id: edge.source_id.clone(),
                    name,
                    kind: edge.source_type.clone(),
                });
            }
        }

        debug!(
            item_id,
            using = view.using.len(),
            referenced_by = view.referenced_by.len(),
            had_error = view.had_error,
            "dependency view built"
        );
        view
    }

    /// Bulk construction for a whole dataset's worth of items.
    pub fn views_for<'a>(
        &self,
        item_ids: impl IntoIterator<Item = &'a str>,
    ) -> HashMap<String, DependencyView> {
        item_ids
            .into_iter()
            .map(|id| (id.to_string(), self.view_for(id)))
            .collect()
    }
}
