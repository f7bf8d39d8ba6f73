use crate::ScoredRecord;
use orgscan_core::{OrgScanError, RecordKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Reporting category a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    Documentation,
    Security,
    UserAdoption,
    Usefulness,
    CodeQuality,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleCategory::Documentation => "documentation",
            RuleCategory::Security => "security",
            RuleCategory::UserAdoption => "user-adoption",
            RuleCategory::Usefulness => "usefulness",
            RuleCategory::CodeQuality => "code-quality",
        };
        write!(f, "{}", s)
    }
}

/// Pure predicate over a record; `Ok(true)` means the record violates
/// the rule. An `Err` is logged by the engine and counted as
/// non-firing.
pub type RuleFormula = Box<dyn Fn(&ScoredRecord) -> anyhow::Result<bool> + Send + Sync>;

/// One best-practice check. Ids are stable external identifiers (org
/// reports aggregate by them), so a registry rejects duplicates.
pub struct ScoreRule {
    pub id: u32,
    pub description: String,
    pub bad_field: String,
    pub applies_to: Vec<RecordKind>,
    pub category: RuleCategory,
    formula: RuleFormula,
}

impl ScoreRule {
    pub fn new(
        id: u32,
        description: impl Into<String>,
        bad_field: impl Into<String>,
        applies_to: Vec<RecordKind>,
        category: RuleCategory,
        formula: RuleFormula,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            bad_field: bad_field.into(),
            applies_to,
            category,
            formula,
        }
    }

    pub fn applies_to_kind(&self, kind: &RecordKind) -> bool {
        self.applies_to.contains(kind)
    }

    pub fn evaluate(&self, record: &ScoredRecord) -> anyhow::Result<bool> {
        (self.formula)(record)
    }
}

impl fmt::Debug for ScoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoreRule")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("category", &self.category)
            .finish()
    }
}

/// The full rule set, indexed by record kind and by id.
#[derive(Debug)]
pub struct RuleRegistry {
    rules: Vec<Arc<ScoreRule>>,
    by_id: HashMap<u32, Arc<ScoreRule>>,
}

impl RuleRegistry {
    pub fn new(rules: Vec<ScoreRule>) -> Result<Self> {
        let mut seen = HashSet::new();
        let rules: Vec<Arc<ScoreRule>> = rules.into_iter().map(Arc::new).collect();
        let mut by_id = HashMap::with_capacity(rules.len());
        for rule in &rules {
            if !seen.insert(rule.id) {
                return Err(OrgScanError::configuration(format!(
                    "duplicate score rule id {}",
                    rule.id
                )));
            }
            by_id.insert(rule.id, Arc::clone(rule));
        }
        Ok(Self { rules, by_id })
    }

    pub fn rule(&self, id: u32) -> Option<&Arc<ScoreRule>> {
        self.by_id.get(&id)
    }

    pub fn rules_for(&self, kind: &RecordKind) -> Vec<Arc<ScoreRule>> {
        self.rules
            .iter()
            .filter(|r| r.applies_to_kind(kind))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The built-in catalog backing the demo datasets. The full ~150
    /// rule business catalog lives outside this crate and is loaded the
    /// same way.
    pub fn builtin() -> Self {
        let documented_kinds = vec![
            RecordKind::CustomObject,
            RecordKind::CustomField,
            RecordKind::Flow,
            RecordKind::ValidationRule,
        ];
        let rules = vec![
            ScoreRule::new(
                1,
                "Missing description",
                "Description",
                documented_kinds,
                RuleCategory::Documentation,
                Box::new(|r| Ok(r.prop_is_blank("Description"))),
            ),
            ScoreRule::new(
                2,
                "Custom field is referenced nowhere",
                "dependencies",
                vec![RecordKind::CustomField],
                RuleCategory::Usefulness,
                Box::new(|r| {
                    let deps = r.dependencies.as_ref().ok_or_else(|| {
                        anyhow::anyhow!("dependency view missing for {}", r.id)
                    })?;
                    Ok(deps.is_unused())
                }),
            ),
            ScoreRule::new(
                3,
                "User never logged in",
                "LastLoginDate",
                vec![RecordKind::User],
                RuleCategory::UserAdoption,
                Box::new(|r| Ok(r.prop_is_blank("LastLoginDate"))),
            ),
            ScoreRule::new(
                4,
                "Profile is assigned to no user",
                "MemberCount",
                vec![RecordKind::Profile],
                RuleCategory::Usefulness,
                Box::new(|r| Ok(r.num_prop("MemberCount").unwrap_or(0.0) == 0.0)),
            ),
            ScoreRule::new(
                5,
                "Flow is inactive",
                "IsActive",
                vec![RecordKind::Flow],
                RuleCategory::Usefulness,
                Box::new(|r| Ok(!r.is_active())),
            ),
            ScoreRule::new(
                6,
                "Apex class below coverage threshold",
                "CoveragePct",
                vec![RecordKind::ApexClass],
                RuleCategory::CodeQuality,
                Box::new(|r| Ok(r.num_prop("CoveragePct").unwrap_or(0.0) < 75.0)),
            ),
            ScoreRule::new(
                7,
                "Permission set is assigned to no user",
                "MemberCount",
                vec![RecordKind::PermissionSet],
                RuleCategory::Usefulness,
                Box::new(|r| Ok(r.num_prop("MemberCount").unwrap_or(0.0) == 0.0)),
            ),
            ScoreRule::new(
                8,
                "User has the admin profile",
                "ProfileName",
                vec![RecordKind::User],
                RuleCategory::Security,
                Box::new(|r| Ok(r.str_prop("ProfileName") == Some("System Administrator"))),
            ),
        ];
        // Safe: ids above are distinct by construction.
        Self::new(rules).expect("builtin rule ids are unique")
    }
}
