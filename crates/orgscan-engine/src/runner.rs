use crate::{
    Dataset, DatasetContext, DatasetOutput, DatasetRegistry, DatasetRunInfo, Recipe,
    RecipeCollection, RecipeResult, ResolvedDatasets,
};
use futures::future::try_join_all;
use orgscan_cache::CacheStore;
use orgscan_core::{OrgScanError, Parameters, Result, SectionLogger};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

enum RecipeEntry {
    Single(Arc<dyn Recipe>),
    Collection(RecipeCollection),
}

/// Top-level orchestrator: owns the dataset and recipe registries, the
/// shared dataset context and the optional result cache, and runs one
/// recipe end to end.
pub struct RecipeEngine {
    ctx: DatasetContext,
    datasets: DatasetRegistry,
    recipes: HashMap<String, RecipeEntry>,
    cache: Option<Arc<CacheStore>>,
}

impl RecipeEngine {
    pub fn new(ctx: DatasetContext, datasets: DatasetRegistry) -> Self {
        Self {
            ctx,
            datasets,
            recipes: HashMap::new(),
            cache: None,
        }
    }

    /// Engine pre-loaded with the built-in datasets, recipes and the
    /// org-health collection.
    pub fn with_builtin(ctx: DatasetContext) -> Self {
        let mut engine = Self::new(ctx, DatasetRegistry::builtin());
        engine.register_recipe(Arc::new(crate::recipes::ObjectInventoryRecipe));
        engine.register_recipe(Arc::new(crate::recipes::FieldAuditRecipe));
        engine.register_recipe(Arc::new(crate::recipes::ProfilePermissionsRecipe));
        engine.register_recipe(Arc::new(crate::recipes::UserAuditRecipe));
        engine.register_collection(RecipeCollection::new(
            "org-health",
            vec!["object-inventory", "user-audit"],
        ));
        engine
    }

    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<CacheStore>> {
        self.cache.as_ref()
    }

    pub fn register_recipe(&mut self, recipe: Arc<dyn Recipe>) {
        self.recipes
            .insert(recipe.alias().to_string(), RecipeEntry::Single(recipe));
    }

    pub fn register_collection(&mut self, collection: RecipeCollection) {
        self.recipes.insert(
            collection.alias.clone(),
            RecipeEntry::Collection(collection),
        );
    }

    pub fn recipe_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.recipes.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    /// Runs one recipe (or collection) to completion. Any dataset
    /// failure fails the whole run before the transform step.
    pub async fn run(&self, alias: &str, params: &Parameters) -> Result<RecipeResult> {
        let logger = SectionLogger::new(format!("recipe.{alias}"));
        let entry = self.recipes.get(alias).ok_or_else(|| {
            OrgScanError::configuration(format!("unknown recipe alias {alias}"))
        })?;

        let result = match entry {
            RecipeEntry::Single(recipe) => self.run_single(recipe, params).await,
            RecipeEntry::Collection(collection) => self.run_collection(collection, params).await,
        };

        match &result {
            Ok(result) => logger.ended(&format!("produced {} result entries", result.len())),
            Err(e) => logger.failed(e),
        }
        result
    }

    async fn run_single(
        &self,
        recipe: &Arc<dyn Recipe>,
        params: &Parameters,
    ) -> Result<RecipeResult> {
        let infos = recipe.extract(params)?;
        debug!(recipe = recipe.alias(), requested = infos.len(), "resolving datasets");
        let outputs = self.resolve_distinct(&infos).await?;

        let mut resolved = ResolvedDatasets::default();
        for (cache_key, output) in outputs {
            resolved.insert(cache_key, output);
        }
        recipe.transform(&resolved, params)
    }

    /// Collections resolve the union of their members' dataset requests
    /// up front, so a dataset shared between members still runs at most
    /// once per top-level run. Transforms are pure and run afterwards,
    /// each over its own slice of the resolved outputs.
    async fn run_collection(
        &self,
        collection: &RecipeCollection,
        params: &Parameters,
    ) -> Result<RecipeResult> {
        let mut members = Vec::with_capacity(collection.recipes.len());
        let mut requested: Vec<DatasetRunInfo> = Vec::new();
        for alias in &collection.recipes {
            let entry = self.recipes.get(alias).ok_or_else(|| {
                OrgScanError::configuration(format!(
                    "collection {} references unknown recipe {alias}",
                    collection.alias
                ))
            })?;
            let RecipeEntry::Single(recipe) = entry else {
                return Err(OrgScanError::configuration(format!(
                    "collection {} may not nest collection {alias}",
                    collection.alias
                )));
            };
            let infos = recipe.extract(params)?;
            requested.extend(infos.iter().cloned());
            members.push((alias, recipe, infos));
        }

        debug!(
            collection = %collection.alias,
            members = members.len(),
            requested = requested.len(),
            "resolving collection datasets"
        );
        let by_key: HashMap<String, DatasetOutput> =
            self.resolve_distinct(&requested).await?.into_iter().collect();

        let mut results = BTreeMap::new();
        for (alias, recipe, infos) in members {
            let mut resolved = ResolvedDatasets::default();
            for info in &infos {
                let output = by_key.get(&info.cache_key).cloned().ok_or_else(|| {
                    OrgScanError::configuration(format!(
                        "dataset {} was requested but never resolved",
                        info.cache_key
                    ))
                })?;
                resolved.insert(info.cache_key.clone(), output);
            }
            let result = recipe.transform(&resolved, params)?;
            results.insert(alias.clone(), collection.apply_filter(result));
        }
        Ok(RecipeResult::Composite(results))
    }

    /// Fan out over the distinct cache keys of a request list, resolving
    /// each exactly once.
    async fn resolve_distinct(
        &self,
        infos: &[DatasetRunInfo],
    ) -> Result<Vec<(String, DatasetOutput)>> {
        let mut seen = HashSet::new();
        let unique: Vec<&DatasetRunInfo> = infos
            .iter()
            .filter(|info| seen.insert(info.cache_key.clone()))
            .collect();
        try_join_all(unique.iter().map(|info| self.resolve(info))).await
    }

    /// Resolves one dataset request, consulting the cache first and
    /// populating it after a successful run.
    async fn resolve(&self, info: &DatasetRunInfo) -> Result<(String, DatasetOutput)> {
        let dataset: Arc<dyn Dataset> = self.datasets.get(&info.alias)?;

        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(&info.cache_key)? {
                debug!(cache_key = %info.cache_key, "dataset served from cache");
                let output = DatasetOutput::from_cache_value(dataset.output_form(), value)?;
                return Ok((info.cache_key.clone(), output));
            }
        }

        let output = dataset.run(&self.ctx, &info.parameters).await?;
        if let Some(cache) = &self.cache {
            cache.set(&info.cache_key, &output.to_cache_value()?)?;
        }
        Ok((info.cache_key.clone(), output))
    }
}
