use crate::{ScoreEngine, ScoredRecord};
use async_trait::async_trait;
use orgscan_cache::CacheValue;
use orgscan_client::QueryExecutor;
use orgscan_core::{OrgScanError, Parameters, Result};
use orgscan_graph::UsageMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One dataset request from a recipe: which dataset, under which cache
/// key, with which parameters. Identity (dedup and caching) is by
/// `cache_key`, not alias, so parameterized runs cache independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRunInfo {
    pub alias: String,
    pub cache_key: String,
    pub parameters: Parameters,
}

impl DatasetRunInfo {
    pub fn new(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self {
            cache_key: alias.clone(),
            alias,
            parameters: Parameters::new(),
        }
    }

    /// A per-entity parameterized request, cached under
    /// `<alias>_<value>`.
    pub fn parameterized(
        alias: impl Into<String>,
        param: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let alias = alias.into();
        let value = value.into();
        let mut parameters = Parameters::new();
        parameters.insert(param.into(), value.clone());
        Self {
            cache_key: format!("{alias}_{value}"),
            alias,
            parameters,
        }
    }
}

/// The shape a dataset produces, declared up front so cached payloads
/// can be rebuilt without running the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputForm {
    Records,
    Matrix,
    Scalar,
}

/// Keyed result of one dataset run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatasetOutput {
    /// Keyed collection of scored records, ordered by key.
    Records(BTreeMap<String, ScoredRecord>),
    Matrix(UsageMatrix),
    Scalar(String),
}

impl DatasetOutput {
    pub fn form(&self) -> OutputForm {
        match self {
            DatasetOutput::Records(_) => OutputForm::Records,
            DatasetOutput::Matrix(_) => OutputForm::Matrix,
            DatasetOutput::Scalar(_) => OutputForm::Scalar,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DatasetOutput::Records(map) => map.len(),
            DatasetOutput::Matrix(m) => m.rows.len(),
            DatasetOutput::Scalar(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_cache_value(&self) -> Result<CacheValue> {
        Ok(match self {
            DatasetOutput::Scalar(s) => CacheValue::Scalar(s.clone()),
            DatasetOutput::Records(map) => {
                let mut out = serde_json::Map::new();
                for (key, record) in map {
                    out.insert(key.clone(), serde_json::to_value(record)?);
                }
                CacheValue::Mapping(out)
            }
            DatasetOutput::Matrix(matrix) => match serde_json::to_value(matrix)? {
                serde_json::Value::Object(map) => CacheValue::Mapping(map),
                other => {
                    return Err(OrgScanError::Cache(format!(
                        "matrix serialized to unexpected shape {other}"
                    )))
                }
            },
        })
    }

    pub fn from_cache_value(form: OutputForm, value: CacheValue) -> Result<Self> {
        match (form, value) {
            (OutputForm::Scalar, CacheValue::Scalar(s)) => Ok(DatasetOutput::Scalar(s)),
            (OutputForm::Records, CacheValue::Mapping(map)) => {
                let mut out = BTreeMap::new();
                for (key, value) in map {
                    out.insert(key, serde_json::from_value(value)?);
                }
                Ok(DatasetOutput::Records(out))
            }
            (OutputForm::Matrix, CacheValue::Mapping(map)) => Ok(DatasetOutput::Matrix(
                serde_json::from_value(serde_json::Value::Object(map))?,
            )),
            (_, value) => Err(OrgScanError::Cache(format!(
                "cached value shape {:?} does not match the dataset's output form",
                value.shape()
            ))),
        }
    }

    pub fn records(&self) -> Option<&BTreeMap<String, ScoredRecord>> {
        match self {
            DatasetOutput::Records(map) => Some(map),
            _ => None,
        }
    }
}

/// Everything a dataset needs to do its work. Recipes never see this;
/// they only consume resolved outputs.
#[derive(Clone)]
pub struct DatasetContext {
    pub executor: Arc<QueryExecutor>,
    pub scorer: Arc<ScoreEngine>,
}

/// One named unit of remote-data acquisition.
#[async_trait]
pub trait Dataset: Send + Sync {
    fn alias(&self) -> &str;

    fn output_form(&self) -> OutputForm {
        OutputForm::Records
    }

    async fn run(&self, ctx: &DatasetContext, params: &Parameters) -> Result<DatasetOutput>;
}

impl std::fmt::Debug for dyn Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset").field("alias", &self.alias()).finish()
    }
}

/// Alias → implementation lookup for datasets.
#[derive(Default)]
pub struct DatasetRegistry {
    datasets: HashMap<String, Arc<dyn Dataset>>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in datasets.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::datasets::ObjectsDataset));
        registry.register(Arc::new(crate::datasets::FieldsDataset));
        registry.register(Arc::new(crate::datasets::ProfilesDataset));
        registry.register(Arc::new(crate::datasets::UsersDataset));
        registry.register(Arc::new(crate::datasets::ObjectPermissionsDataset));
        registry
    }

    pub fn register(&mut self, dataset: Arc<dyn Dataset>) {
        self.datasets.insert(dataset.alias().to_string(), dataset);
    }

    pub fn get(&self, alias: &str) -> Result<Arc<dyn Dataset>> {
        self.datasets
            .get(alias)
            .cloned()
            .ok_or_else(|| OrgScanError::configuration(format!("unknown dataset alias {alias}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_defaults_to_alias() {
        let info = DatasetRunInfo::new("objects");
        assert_eq!(info.cache_key, "objects");
        assert!(info.parameters.is_empty());
    }

    #[test]
    fn parameterized_keys_cache_independently() {
        let a = DatasetRunInfo::parameterized("fields", "object", "Account");
        let b = DatasetRunInfo::parameterized("fields", "object", "Invoice__c");
        assert_eq!(a.cache_key, "fields_Account");
        assert_eq!(b.cache_key, "fields_Invoice__c");
        assert_ne!(a, b);
        assert_eq!(a.parameters["object"], "Account");
    }

    #[test]
    fn unknown_dataset_alias_errors() {
        let registry = DatasetRegistry::new();
        assert_eq!(
            registry.get("nope").unwrap_err().code(),
            "CONFIGURATION_ERROR"
        );
    }
}
