use crate::{DatasetRunInfo, Recipe, RecipeResult, ResolvedDatasets};
use orgscan_core::{OrgScanError, Parameters, Result};

/// Every customizable object with its field count and score.
pub struct ObjectInventoryRecipe;

impl Recipe for ObjectInventoryRecipe {
    fn alias(&self) -> &str {
        "object-inventory"
    }

    fn extract(&self, _params: &Parameters) -> Result<Vec<DatasetRunInfo>> {
        Ok(vec![DatasetRunInfo::new("objects")])
    }

    fn transform(&self, resolved: &ResolvedDatasets, _params: &Parameters) -> Result<RecipeResult> {
        let objects = resolved.records("objects")?;
        let mut records: Vec<_> = objects.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(RecipeResult::Records(records))
    }
}

/// The fields of one object (parameter `object`), cross-linked with the
/// object inventory. `only_bad=true` keeps only records with a non-zero
/// score.
pub struct FieldAuditRecipe;

impl Recipe for FieldAuditRecipe {
    fn alias(&self) -> &str {
        "field-audit"
    }

    fn extract(&self, params: &Parameters) -> Result<Vec<DatasetRunInfo>> {
        let object = params.get("object").ok_or_else(|| {
            OrgScanError::configuration("field-audit recipe requires an 'object' parameter")
        })?;
        Ok(vec![
            DatasetRunInfo::parameterized("fields", "object", object.as_str()),
            DatasetRunInfo::new("objects"),
        ])
    }

    fn transform(&self, resolved: &ResolvedDatasets, params: &Parameters) -> Result<RecipeResult> {
        let object = params
            .get("object")
            .ok_or_else(|| OrgScanError::configuration("missing 'object' parameter"))?;
        let fields = resolved.records(&format!("fields_{object}"))?;
        let objects = resolved.records("objects")?;

        let object_label = objects
            .values()
            .find(|o| o.name == *object)
            .map(|o| o.name.clone())
            .unwrap_or_else(|| object.clone());
        let only_bad = params.get("only_bad").map(String::as_str) == Some("true");

        let mut records = Vec::new();
        for record in fields.values() {
            if only_bad && record.score == 0 {
                continue;
            }
            let mut record = record.clone();
            record
                .properties
                .insert("ObjectLabel".to_string(), object_label.clone().into());
            records.push(record);
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(RecipeResult::Records(records))
    }
}

/// Object × profile permission grid with human-readable profile labels.
pub struct ProfilePermissionsRecipe;

impl Recipe for ProfilePermissionsRecipe {
    fn alias(&self) -> &str {
        "profile-permissions"
    }

    fn extract(&self, _params: &Parameters) -> Result<Vec<DatasetRunInfo>> {
        Ok(vec![
            DatasetRunInfo::new("object-permissions"),
            DatasetRunInfo::new("profiles"),
        ])
    }

    fn transform(&self, resolved: &ResolvedDatasets, _params: &Parameters) -> Result<RecipeResult> {
        let grid = resolved.matrix("object-permissions")?;
        let profiles = resolved.records("profiles")?;

        // Swap profile ids for display names where the profile dataset
        // knows them; unknown columns keep the raw id.
        let mut matrix = grid.clone();
        for header in &mut matrix.headers {
            if let Some(profile) = profiles.get(&header.id) {
                header.label = profile.name.clone();
            }
        }
        Ok(RecipeResult::Matrix(matrix))
    }
}

/// All standard users with their adoption and security findings.
pub struct UserAuditRecipe;

impl Recipe for UserAuditRecipe {
    fn alias(&self) -> &str {
        "user-audit"
    }

    fn extract(&self, _params: &Parameters) -> Result<Vec<DatasetRunInfo>> {
        Ok(vec![DatasetRunInfo::new("users")])
    }

    fn transform(&self, resolved: &ResolvedDatasets, _params: &Parameters) -> Result<RecipeResult> {
        let users = resolved.records("users")?;
        let mut records: Vec<_> = users.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(RecipeResult::Records(records))
    }
}
