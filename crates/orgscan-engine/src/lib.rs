pub mod dataset;
pub mod datasets;
pub mod record;
pub mod recipe;
pub mod recipes;
pub mod rules;
pub mod runner;
pub mod score;

pub use dataset::{
    Dataset, DatasetContext, DatasetOutput, DatasetRegistry, DatasetRunInfo, OutputForm,
};
pub use record::{RecordSetup, ScoredRecord};
pub use recipe::{Recipe, RecipeCollection, RecipeResult, ResolvedDatasets};
pub use rules::{RuleCategory, RuleFormula, RuleRegistry, ScoreRule};
pub use runner::RecipeEngine;
pub use score::{RecordFactory, RecordSpec, ScoreEngine};

// Re-export common types for convenience
pub use orgscan_core::{OrgScanError, Parameters, RecordKind, Result, Row};
