use crate::{DatasetOutput, DatasetRunInfo, ScoredRecord};
use orgscan_core::{OrgScanError, Parameters, Result};
use orgscan_graph::UsageMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final reportable shape of a recipe run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecipeResult {
    Records(Vec<ScoredRecord>),
    Matrix(UsageMatrix),
    /// One entry per member recipe of a collection.
    Composite(BTreeMap<String, RecipeResult>),
}

impl RecipeResult {
    pub fn len(&self) -> usize {
        match self {
            RecipeResult::Records(r) => r.len(),
            RecipeResult::Matrix(m) => m.rows.len(),
            RecipeResult::Composite(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dataset outputs handed to a transform, keyed by the cache key the
/// recipe asked for. Accessors fail with a descriptive configuration
/// error instead of letting a transform proceed on missing data.
#[derive(Default)]
pub struct ResolvedDatasets {
    outputs: BTreeMap<String, DatasetOutput>,
}

impl ResolvedDatasets {
    pub fn insert(&mut self, cache_key: String, output: DatasetOutput) {
        self.outputs.insert(cache_key, output);
    }

    fn required(&self, cache_key: &str) -> Result<&DatasetOutput> {
        self.outputs.get(cache_key).ok_or_else(|| {
            OrgScanError::configuration(format!(
                "transform requires dataset '{cache_key}' which was not resolved"
            ))
        })
    }

    pub fn records(&self, cache_key: &str) -> Result<&BTreeMap<String, ScoredRecord>> {
        match self.required(cache_key)? {
            DatasetOutput::Records(map) => Ok(map),
            other => Err(OrgScanError::configuration(format!(
                "dataset '{cache_key}' resolved to {:?}, expected records",
                other.form()
            ))),
        }
    }

    pub fn matrix(&self, cache_key: &str) -> Result<&UsageMatrix> {
        match self.required(cache_key)? {
            DatasetOutput::Matrix(matrix) => Ok(matrix),
            other => Err(OrgScanError::configuration(format!(
                "dataset '{cache_key}' resolved to {:?}, expected a matrix",
                other.form()
            ))),
        }
    }
}

/// A pure combination step over already-resolved datasets. Recipes never
/// talk to the network; the engine resolves what `extract` declares,
/// waits for all of it, then calls `transform`.
pub trait Recipe: Send + Sync {
    fn alias(&self) -> &str;

    fn extract(&self, params: &Parameters) -> Result<Vec<DatasetRunInfo>>;

    fn transform(&self, resolved: &ResolvedDatasets, params: &Parameters) -> Result<RecipeResult>;
}

/// A recipe defined purely as a batch of other recipes plus a rule-id
/// filter, used for composite health views. Members must be plain
/// recipes, not other collections.
#[derive(Debug, Clone)]
pub struct RecipeCollection {
    pub alias: String,
    pub recipes: Vec<String>,
    /// When set, record results are filtered to records violating at
    /// least one of these rules.
    pub rule_ids: Option<Vec<u32>>,
}

impl RecipeCollection {
    pub fn new(alias: impl Into<String>, recipes: Vec<&str>) -> Self {
        Self {
            alias: alias.into(),
            recipes: recipes.into_iter().map(str::to_string).collect(),
            rule_ids: None,
        }
    }

    pub fn with_rule_filter(mut self, rule_ids: Vec<u32>) -> Self {
        self.rule_ids = Some(rule_ids);
        self
    }

    pub(crate) fn apply_filter(&self, result: RecipeResult) -> RecipeResult {
        let Some(rule_ids) = &self.rule_ids else {
            return result;
        };
        match result {
            RecipeResult::Records(records) => RecipeResult::Records(
                records
                    .into_iter()
                    .filter(|r| rule_ids.iter().any(|id| r.violates(*id)))
                    .collect(),
            ),
            other => other,
        }
    }
}
