use crate::{RecordSetup, RuleRegistry, ScoreRule, ScoredRecord};
use once_cell::sync::Lazy;
use orgscan_core::{OrgScanError, RecordKind, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-kind entry of the static record registry: whether records of the
/// kind get scored, whether they require dependency enrichment, and how
/// a raw row is cast into the typed record.
#[derive(Debug)]
pub struct RecordSpec {
    pub kind: RecordKind,
    pub needs_score: bool,
    pub needs_dependencies: bool,
    build: fn(RecordSetup) -> Result<ScoredRecord>,
}

fn required_str(setup: &RecordSetup, field: &'static str, kind: &RecordKind) -> Result<String> {
    setup
        .row
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            OrgScanError::configuration(format!("{kind} row is missing required field {field}"))
        })
}

macro_rules! builder {
    ($kind:expr, $id_field:literal, $name_field:literal) => {{
        fn build(setup: RecordSetup) -> Result<ScoredRecord> {
            let id = required_str(&setup, $id_field, &$kind)?;
            let name = required_str(&setup, $name_field, &$kind)?;
            Ok(ScoredRecord::new(id, name, $kind, setup))
        }
        build
    }};
}

static REGISTRY: Lazy<HashMap<RecordKind, RecordSpec>> = Lazy::new(|| {
    let specs = [
        RecordSpec {
            kind: RecordKind::CustomObject,
            needs_score: true,
            needs_dependencies: false,
            build: builder!(RecordKind::CustomObject, "DurableId", "QualifiedApiName"),
        },
        RecordSpec {
            kind: RecordKind::CustomField,
            needs_score: true,
            needs_dependencies: true,
            build: builder!(RecordKind::CustomField, "Id", "DeveloperName"),
        },
        RecordSpec {
            kind: RecordKind::Profile,
            needs_score: true,
            needs_dependencies: false,
            build: builder!(RecordKind::Profile, "Id", "Name"),
        },
        RecordSpec {
            kind: RecordKind::PermissionSet,
            needs_score: true,
            needs_dependencies: false,
            build: builder!(RecordKind::PermissionSet, "Id", "Name"),
        },
        RecordSpec {
            kind: RecordKind::User,
            needs_score: true,
            needs_dependencies: false,
            build: builder!(RecordKind::User, "Id", "Username"),
        },
        RecordSpec {
            kind: RecordKind::PublicGroup,
            needs_score: false,
            needs_dependencies: false,
            build: builder!(RecordKind::PublicGroup, "Id", "Name"),
        },
        RecordSpec {
            kind: RecordKind::Flow,
            needs_score: true,
            needs_dependencies: true,
            build: builder!(RecordKind::Flow, "Id", "ApiName"),
        },
        RecordSpec {
            kind: RecordKind::ApexClass,
            needs_score: true,
            needs_dependencies: true,
            build: builder!(RecordKind::ApexClass, "Id", "Name"),
        },
    ];
    specs.into_iter().map(|s| (s.kind.clone(), s)).collect()
});

/// Entry point for record creation and scoring, one factory per kind.
pub struct ScoreEngine {
    rules: Arc<RuleRegistry>,
}

impl ScoreEngine {
    pub fn new(rules: Arc<RuleRegistry>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &Arc<RuleRegistry> {
        &self.rules
    }

    pub fn instance(&self, kind: &RecordKind) -> Result<RecordFactory> {
        let spec = REGISTRY.get(kind).ok_or_else(|| {
            OrgScanError::configuration(format!("no record spec registered for kind {kind}"))
        })?;
        Ok(RecordFactory {
            spec,
            rules: self.rules.rules_for(kind),
        })
    }
}

/// Creates and scores records of one kind.
#[derive(Debug)]
pub struct RecordFactory {
    spec: &'static RecordSpec,
    rules: Vec<Arc<ScoreRule>>,
}

impl RecordFactory {
    /// Casts a raw row into the typed record, enforcing the two-way
    /// dependency contract: kinds that need a dependency view must get
    /// one, kinds that do not must not.
    pub fn create(&self, setup: RecordSetup) -> Result<ScoredRecord> {
        if self.spec.needs_dependencies && setup.dependencies.is_none() {
            return Err(OrgScanError::configuration(format!(
                "kind {} requires a dependency view but none was supplied",
                self.spec.kind
            )));
        }
        if !self.spec.needs_dependencies && setup.dependencies.is_some() {
            return Err(OrgScanError::configuration(format!(
                "kind {} takes no dependency view but one was supplied",
                self.spec.kind
            )));
        }
        (self.spec.build)(setup)
    }

    /// Evaluates every applicable rule exactly once. A rule whose
    /// formula fails is logged and counted as non-firing; it never
    /// aborts scoring of the record or of other rules.
    pub fn compute_score(&self, record: &mut ScoredRecord) -> Result<()> {
        if !self.spec.needs_score {
            return Err(OrgScanError::configuration(format!(
                "kind {} is not scored",
                self.spec.kind
            )));
        }
        if record.scored {
            return Err(OrgScanError::configuration(format!(
                "record {} was already scored; scoring is applied exactly once",
                record.id
            )));
        }
        record.scored = true;

        for rule in &self.rules {
            match rule.evaluate(record) {
                Ok(true) => record.mark_bad(rule.id, &rule.bad_field),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        rule_id = rule.id,
                        record_id = %record.id,
                        error = %e,
                        "rule formula failed, counting as non-firing"
                    );
                }
            }
        }

        debug!(record_id = %record.id, score = record.score, "record scored");
        Ok(())
    }

    pub fn create_with_score(&self, setup: RecordSetup) -> Result<ScoredRecord> {
        let mut record = self.create(setup)?;
        if self.spec.needs_score {
            self.compute_score(&mut record)?;
        }
        Ok(record)
    }
}
