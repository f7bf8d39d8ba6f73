use async_trait::async_trait;
use orgscan_client::{GuardPolicy, QueryExecutor, RateGuard};
use orgscan_core::{
    MetadataDescriptor, OrgScanError, Parameters, QueryPage, QuerySurface, QueryTransport, Result,
    Row,
};
use orgscan_engine::{
    Dataset, DatasetContext, DatasetOutput, DatasetRegistry, DatasetRunInfo, OutputForm, Recipe,
    RecipeCollection, RecipeEngine, RecipeResult, ResolvedDatasets, RuleRegistry, ScoreEngine,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Serves canned rows per FROM clause; every query completes in one
/// page.
struct ScriptedTransport {
    routes: Vec<(&'static str, Vec<Row>)>,
}

impl ScriptedTransport {
    fn org_fixture() -> Self {
        let rows = |values: Vec<serde_json::Value>| -> Vec<Row> {
            values
                .into_iter()
                .map(|v| v.as_object().unwrap().clone())
                .collect()
        };
        Self {
            routes: vec![
                (
                    "FROM EntityDefinition",
                    rows(vec![
                        json!({"DurableId": "Account", "QualifiedApiName": "Account",
                               "Description": "Customer accounts"}),
                        json!({"DurableId": "Invoice__c", "QualifiedApiName": "Invoice__c"}),
                    ]),
                ),
                (
                    "FROM MetadataComponentDependency",
                    rows(vec![json!({
                        "MetadataComponentId": "01p1", "MetadataComponentType": "ApexClass",
                        "MetadataComponentName": "InvoiceService",
                        "RefMetadataComponentId": "00N1", "RefMetadataComponentType": "CustomField",
                        "RefMetadataComponentName": "Amount__c"
                    })]),
                ),
                (
                    "FROM CustomField",
                    rows(vec![
                        json!({"Id": "00N1", "DeveloperName": "Amount__c",
                               "Description": "Total amount", "EntityDefinitionId": "Invoice__c"}),
                        json!({"Id": "00N2", "DeveloperName": "Legacy__c",
                               "EntityDefinitionId": "Invoice__c"}),
                    ]),
                ),
                (
                    "FROM PermissionSetAssignment",
                    rows(vec![
                        json!({"AssigneeId": "005A", "PermissionSet": {"ProfileId": "00e1"}}),
                        json!({"AssigneeId": "005B", "PermissionSet": {"ProfileId": "00e1"}}),
                    ]),
                ),
                (
                    "FROM Profile",
                    rows(vec![
                        json!({"Id": "00e1", "Name": "Standard User", "Description": "default"}),
                        json!({"Id": "00e2", "Name": "Old Profile"}),
                    ]),
                ),
                (
                    "FROM ObjectPermissions",
                    rows(vec![json!({
                        "Parent": {"ProfileId": "00e1"}, "SobjectType": "Invoice__c",
                        "PermissionsRead": true, "PermissionsEdit": true,
                        "PermissionsCreate": false, "PermissionsDelete": false
                    })]),
                ),
                (
                    "FROM User",
                    rows(vec![
                        json!({"Id": "005A", "Username": "admin@example.com",
                               "Profile": {"Name": "System Administrator"}}),
                        json!({"Id": "005B", "Username": "jo@example.com",
                               "LastLoginDate": "2024-03-01T08:00:00Z",
                               "Profile": {"Name": "Standard User"}}),
                    ]),
                ),
            ],
        }
    }

    fn empty() -> Self {
        Self { routes: Vec::new() }
    }
}

#[async_trait]
impl QueryTransport for ScriptedTransport {
    async fn query(&self, _surface: QuerySurface, query: &str) -> Result<QueryPage> {
        for (clause, rows) in &self.routes {
            if query.contains(clause) {
                return Ok(QueryPage::complete(rows.clone()));
            }
        }
        Ok(QueryPage::complete(Vec::new()))
    }

    async fn query_next(&self, _surface: QuerySurface, _locator: &str) -> Result<QueryPage> {
        Ok(QueryPage::complete(Vec::new()))
    }

    async fn read_metadata(&self, _descriptors: &[MetadataDescriptor]) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }
}

fn context(transport: ScriptedTransport) -> DatasetContext {
    DatasetContext {
        executor: Arc::new(QueryExecutor::new(
            Arc::new(transport),
            Arc::new(RateGuard::new(GuardPolicy::Enforce)),
        )),
        scorer: Arc::new(ScoreEngine::new(Arc::new(RuleRegistry::builtin()))),
    }
}

fn no_params() -> Parameters {
    Parameters::new()
}

// ---------------------------------------------------------------------
// End-to-end over the built-in datasets and recipes

#[tokio::test]
async fn object_inventory_joins_scores_and_sorts() {
    let engine = RecipeEngine::with_builtin(context(ScriptedTransport::org_fixture()));
    let result = engine.run("object-inventory", &no_params()).await.unwrap();

    let RecipeResult::Records(records) = result else {
        panic!("expected records");
    };
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Account", "Invoice__c"]);

    // Field counts were joined from the sibling query.
    let invoice = &records[1];
    assert_eq!(invoice.num_prop("FieldCount"), Some(2.0));
    // Invoice__c has no description: rule 1 fires.
    assert!(invoice.violates(1));
    assert!(!records[0].violates(1));
}

#[tokio::test]
async fn field_audit_attaches_dependencies() {
    let engine = RecipeEngine::with_builtin(context(ScriptedTransport::org_fixture()));
    let mut params = Parameters::new();
    params.insert("object".to_string(), "Invoice__c".to_string());
    let result = engine.run("field-audit", &params).await.unwrap();

    let RecipeResult::Records(records) = result else {
        panic!("expected records");
    };
    assert_eq!(records.len(), 2);

    let amount = records.iter().find(|r| r.name == "Amount__c").unwrap();
    let deps = amount.dependencies.as_ref().unwrap();
    assert_eq!(deps.referenced_by.len(), 1);
    assert!(!amount.violates(2));

    // Legacy__c is referenced nowhere and has no description.
    let legacy = records.iter().find(|r| r.name == "Legacy__c").unwrap();
    assert!(legacy.violates(1));
    assert!(legacy.violates(2));
    assert_eq!(legacy.score, 2);
}

#[tokio::test]
async fn profile_matrix_swaps_in_display_labels() {
    let engine = RecipeEngine::with_builtin(context(ScriptedTransport::org_fixture()));
    let result = engine.run("profile-permissions", &no_params()).await.unwrap();

    let RecipeResult::Matrix(matrix) = result else {
        panic!("expected a matrix");
    };
    assert_eq!(matrix.headers[0].id, "00e1");
    assert_eq!(matrix.headers[0].label, "Standard User");
    assert_eq!(matrix.cell("Invoice__c", "00e1"), Some("RU"));
}

#[tokio::test]
async fn pipeline_is_deterministic() {
    let run = || async {
        let engine = RecipeEngine::with_builtin(context(ScriptedTransport::org_fixture()));
        let result = engine.run("org-health", &no_params()).await.unwrap();
        serde_json::to_string(&result).unwrap()
    };
    assert_eq!(run().await, run().await);
}

// ---------------------------------------------------------------------
// Orchestration behavior over purpose-built datasets and recipes

struct CountingDataset {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl Dataset for CountingDataset {
    fn alias(&self) -> &str {
        "counting"
    }

    async fn run(&self, _ctx: &DatasetContext, _params: &Parameters) -> Result<DatasetOutput> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(DatasetOutput::Scalar("ran".to_string()))
    }

    fn output_form(&self) -> OutputForm {
        OutputForm::Scalar
    }
}

struct FailingDataset;

#[async_trait]
impl Dataset for FailingDataset {
    fn alias(&self) -> &str {
        "failing"
    }

    async fn run(&self, _ctx: &DatasetContext, _params: &Parameters) -> Result<DatasetOutput> {
        Err(OrgScanError::Query {
            query: "SELECT Id FROM Broken".to_string(),
            code: "MALFORMED_QUERY".to_string(),
            cause: "simulated".to_string(),
        })
    }
}

/// Requests the counting dataset twice under one cache key, plus
/// optionally the failing one, and counts transform invocations.
struct SpyRecipe {
    alias: &'static str,
    include_failing: bool,
    transforms: Arc<AtomicUsize>,
}

impl Recipe for SpyRecipe {
    fn alias(&self) -> &str {
        self.alias
    }

    fn extract(&self, _params: &Parameters) -> Result<Vec<DatasetRunInfo>> {
        let mut infos = vec![
            DatasetRunInfo::new("counting"),
            DatasetRunInfo::new("counting"),
        ];
        if self.include_failing {
            infos.push(DatasetRunInfo::new("failing"));
        }
        Ok(infos)
    }

    fn transform(&self, resolved: &ResolvedDatasets, _params: &Parameters) -> Result<RecipeResult> {
        self.transforms.fetch_add(1, Ordering::SeqCst);
        // Required-key check happens even for the spy.
        let _ = resolved;
        Ok(RecipeResult::Records(Vec::new()))
    }
}

fn spy_engine(include_failing: bool) -> (RecipeEngine, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let transforms = Arc::new(AtomicUsize::new(0));
    let mut registry = DatasetRegistry::new();
    registry.register(Arc::new(CountingDataset { runs: runs.clone() }));
    registry.register(Arc::new(FailingDataset));
    let mut engine = RecipeEngine::new(context(ScriptedTransport::empty()), registry);
    engine.register_recipe(Arc::new(SpyRecipe {
        alias: "spy",
        include_failing,
        transforms: transforms.clone(),
    }));
    (engine, runs, transforms)
}

#[tokio::test]
async fn failing_dataset_fails_the_recipe_without_transform() {
    let (engine, _runs, transforms) = spy_engine(true);
    let err = engine.run("spy", &no_params()).await.unwrap_err();
    assert!(matches!(err, OrgScanError::Query { .. }));
    assert_eq!(transforms.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn datasets_resolve_once_per_cache_key() {
    let (engine, runs, transforms) = spy_engine(false);
    engine.run("spy", &no_params()).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(transforms.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cache_backed_runs_skip_the_dataset() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut registry = DatasetRegistry::new();
    registry.register(Arc::new(CountingDataset { runs: runs.clone() }));
    let mut engine = RecipeEngine::new(context(ScriptedTransport::empty()), registry)
        .with_cache(Arc::new(orgscan_cache::CacheStore::new("orgscan", "test")));
    engine.register_recipe(Arc::new(SpyRecipe {
        alias: "spy",
        include_failing: false,
        transforms: Arc::new(AtomicUsize::new(0)),
    }));

    engine.run("spy", &no_params()).await.unwrap();
    engine.run("spy", &no_params()).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(engine.cache().unwrap().contains("counting"));
}

#[tokio::test]
async fn collection_members_share_dataset_resolution() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut registry = DatasetRegistry::new();
    registry.register(Arc::new(CountingDataset { runs: runs.clone() }));
    let mut engine = RecipeEngine::new(context(ScriptedTransport::empty()), registry);
    for alias in ["left", "right"] {
        engine.register_recipe(Arc::new(SpyRecipe {
            alias,
            include_failing: false,
            transforms: Arc::new(AtomicUsize::new(0)),
        }));
    }
    engine.register_collection(RecipeCollection::new("both", vec!["left", "right"]));

    // Both members request the same cache key; one top-level run
    // resolves it once, with or without a cache attached.
    engine.run("both", &no_params()).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_recipe_alias_is_a_configuration_error() {
    let engine = RecipeEngine::with_builtin(context(ScriptedTransport::empty()));
    let err = engine.run("nonsense", &no_params()).await.unwrap_err();
    assert_eq!(err.code(), "CONFIGURATION_ERROR");
}

#[tokio::test]
async fn collection_composes_and_filters_members() {
    let ctx = context(ScriptedTransport::org_fixture());
    let mut engine = RecipeEngine::with_builtin(ctx);
    engine.register_collection(
        RecipeCollection::new("admin-report", vec!["user-audit"]).with_rule_filter(vec![8]),
    );

    let result = engine.run("admin-report", &no_params()).await.unwrap();
    let RecipeResult::Composite(members) = result else {
        panic!("expected a composite result");
    };
    let RecipeResult::Records(users) = &members["user-audit"] else {
        panic!("expected records");
    };
    // Only the admin-profile user survives the rule filter.
    let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["admin@example.com"]);
}
