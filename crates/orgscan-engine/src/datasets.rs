use crate::{Dataset, DatasetContext, DatasetOutput, OutputForm, RecordSetup};
use async_trait::async_trait;
use dashmap::DashMap;
use orgscan_client::QueryDescriptor;
use orgscan_core::{OrgScanError, Parameters, RecordKind, Result, Row, SectionLogger};
use orgscan_graph::{DependencyEdge, DependencyGraphBuilder, DependencyView};
use serde_json::Value;
use std::collections::BTreeMap;

/// Error codes the dependency surface throws for entity types it does
/// not track; tolerated as "no dependency data".
const DEPENDENCY_BYPASSES: &[&str] = &["INVALID_TYPE", "EXTERNAL_OBJECT_UNSUPPORTED_EXCEPTION"];

fn row_str(row: &Row, field: &str) -> Option<String> {
    row.get(field)?.as_str().map(str::to_string)
}

/// All customizable objects of the org, with a per-object custom field
/// count joined in.
pub struct ObjectsDataset;

#[async_trait]
impl Dataset for ObjectsDataset {
    fn alias(&self) -> &str {
        "objects"
    }

    async fn run(&self, ctx: &DatasetContext, _params: &Parameters) -> Result<DatasetOutput> {
        let logger = SectionLogger::new("dataset.objects");
        let batch = [
            // EntityDefinition rejects the native continuation protocol.
            QueryDescriptor::tooling(
                "SELECT DurableId, QualifiedApiName, Description FROM EntityDefinition \
                 WHERE IsCustomizable = true",
            )
            .with_custom_paging("DurableId"),
            QueryDescriptor::tooling(
                "SELECT Id, EntityDefinitionId FROM CustomField",
            )
            .with_custom_paging("Id"),
        ];
        let mut results = ctx.executor.run_batch(&batch).await?;
        let field_rows = results.pop().unwrap_or_default();
        let object_rows = results.pop().unwrap_or_default();

        // Child counts accumulate associatively; completion order of the
        // contributing rows cannot change the totals.
        let field_counts: DashMap<String, u64> = DashMap::new();
        for row in &field_rows {
            if let Some(parent) = row_str(row, "EntityDefinitionId") {
                *field_counts.entry(parent).or_insert(0) += 1;
            }
        }

        let factory = ctx.scorer.instance(&RecordKind::CustomObject)?;
        let mut records = BTreeMap::new();
        for mut row in object_rows {
            let count = row_str(&row, "DurableId")
                .and_then(|id| field_counts.get(&id).map(|c| *c))
                .unwrap_or(0);
            row.insert("FieldCount".to_string(), Value::from(count));
            let record = factory.create_with_score(RecordSetup::from_row(row))?;
            records.insert(record.id.clone(), record);
        }

        logger.ended(&format!("collected {} objects", records.len()));
        Ok(DatasetOutput::Records(records))
    }
}

/// Custom fields of one object (parameter `object`), enriched with
/// dependency views built from the org's dependency edge list.
pub struct FieldsDataset;

#[async_trait]
impl Dataset for FieldsDataset {
    fn alias(&self) -> &str {
        "fields"
    }

    async fn run(&self, ctx: &DatasetContext, params: &Parameters) -> Result<DatasetOutput> {
        let object = params.get("object").ok_or_else(|| {
            OrgScanError::configuration("fields dataset requires an 'object' parameter")
        })?;
        let logger = SectionLogger::new("dataset.fields");

        let batch = [
            QueryDescriptor::tooling(format!(
                "SELECT Id, DeveloperName, Description FROM CustomField \
                 WHERE EntityDefinition.QualifiedApiName = '{object}'"
            ))
            .with_custom_paging("Id"),
            QueryDescriptor::tooling(
                "SELECT MetadataComponentId, MetadataComponentType, MetadataComponentName, \
                 RefMetadataComponentId, RefMetadataComponentType, RefMetadataComponentName \
                 FROM MetadataComponentDependency",
            )
            .with_bypass(DEPENDENCY_BYPASSES),
        ];
        let mut results = ctx.executor.run_batch(&batch).await?;
        let dependency_rows = results.pop().unwrap_or_default();
        let field_rows = results.pop().unwrap_or_default();

        // Unparseable dependency rows degrade to a flagged view rather
        // than failing the dataset.
        let mut edges = Vec::new();
        let mut partial = false;
        for row in &dependency_rows {
            match DependencyEdge::from_row(row) {
                Some(edge) => edges.push(edge),
                None => partial = true,
            }
        }
        let names = field_rows
            .iter()
            .filter_map(|row| Some((row_str(row, "Id")?, row_str(row, "DeveloperName")?)))
            .chain(dependency_rows.iter().filter_map(|row| {
                Some((
                    row_str(row, "MetadataComponentId")?,
                    row_str(row, "MetadataComponentName")?,
                ))
            }));
        let builder = DependencyGraphBuilder::new(edges).with_names(names);

        let factory = ctx.scorer.instance(&RecordKind::CustomField)?;
        let mut records = BTreeMap::new();
        for row in field_rows {
            let id = row_str(&row, "Id").unwrap_or_default();
            let mut view: DependencyView = builder.view_for(&id);
            view.had_error |= partial;
            let record =
                factory.create_with_score(RecordSetup::from_row(row).with_dependencies(view))?;
            records.insert(record.id.clone(), record);
        }

        logger.ended(&format!("collected {} fields of {object}", records.len()));
        Ok(DatasetOutput::Records(records))
    }
}

/// All profiles, with assignment counts joined from the permission set
/// assignment table (every profile owns a synthetic permission set).
pub struct ProfilesDataset;

#[async_trait]
impl Dataset for ProfilesDataset {
    fn alias(&self) -> &str {
        "profiles"
    }

    async fn run(&self, ctx: &DatasetContext, _params: &Parameters) -> Result<DatasetOutput> {
        let logger = SectionLogger::new("dataset.profiles");
        let batch = [
            QueryDescriptor::new("SELECT Id, Name, Description FROM Profile"),
            QueryDescriptor::new(
                "SELECT AssigneeId, PermissionSet.ProfileId FROM PermissionSetAssignment \
                 WHERE PermissionSet.IsOwnedByProfile = true",
            ),
        ];
        let mut results = ctx.executor.run_batch(&batch).await?;
        let assignment_rows = results.pop().unwrap_or_default();
        let profile_rows = results.pop().unwrap_or_default();

        let member_counts: DashMap<String, u64> = DashMap::new();
        for row in &assignment_rows {
            let profile_id = row
                .get("PermissionSet")
                .and_then(|ps| ps.get("ProfileId"))
                .and_then(Value::as_str);
            if let Some(id) = profile_id {
                *member_counts.entry(id.to_string()).or_insert(0) += 1;
            }
        }

        let factory = ctx.scorer.instance(&RecordKind::Profile)?;
        let mut records = BTreeMap::new();
        for mut row in profile_rows {
            let count = row_str(&row, "Id")
                .and_then(|id| member_counts.get(&id).map(|c| *c))
                .unwrap_or(0);
            row.insert("MemberCount".to_string(), Value::from(count));
            let record = factory.create_with_score(RecordSetup::from_row(row))?;
            records.insert(record.id.clone(), record);
        }

        logger.ended(&format!("collected {} profiles", records.len()));
        Ok(DatasetOutput::Records(records))
    }
}

/// All active-org users, with the nested profile name flattened onto the
/// record.
pub struct UsersDataset;

#[async_trait]
impl Dataset for UsersDataset {
    fn alias(&self) -> &str {
        "users"
    }

    async fn run(&self, ctx: &DatasetContext, _params: &Parameters) -> Result<DatasetOutput> {
        let logger = SectionLogger::new("dataset.users");
        let rows = ctx
            .executor
            .run(&QueryDescriptor::new(
                "SELECT Id, Username, LastLoginDate, Profile.Name FROM User \
                 WHERE UserType = 'Standard'",
            ))
            .await?;

        let factory = ctx.scorer.instance(&RecordKind::User)?;
        let mut records = BTreeMap::new();
        for mut row in rows {
            // Normalize the nested relationship field.
            if let Some(name) = row
                .get("Profile")
                .and_then(|p| p.get("Name"))
                .and_then(Value::as_str)
                .map(str::to_string)
            {
                row.insert("ProfileName".to_string(), Value::from(name));
            }
            let record = factory.create_with_score(RecordSetup::from_row(row))?;
            records.insert(record.id.clone(), record);
        }

        logger.ended(&format!("collected {} users", records.len()));
        Ok(DatasetOutput::Records(records))
    }
}

/// Object × profile permission grid. Columns are profile ids; the
/// permission-matrix recipe swaps in display labels.
pub struct ObjectPermissionsDataset;

fn permission_code(row: &Row) -> String {
    let mut code = String::new();
    for (field, letter) in [
        ("PermissionsCreate", 'C'),
        ("PermissionsRead", 'R'),
        ("PermissionsEdit", 'U'),
        ("PermissionsDelete", 'D'),
    ] {
        if row.get(field).and_then(Value::as_bool).unwrap_or(false) {
            code.push(letter);
        }
    }
    code
}

#[async_trait]
impl Dataset for ObjectPermissionsDataset {
    fn alias(&self) -> &str {
        "object-permissions"
    }

    fn output_form(&self) -> OutputForm {
        OutputForm::Matrix
    }

    async fn run(&self, ctx: &DatasetContext, _params: &Parameters) -> Result<DatasetOutput> {
        let logger = SectionLogger::new("dataset.object-permissions");
        let rows = ctx
            .executor
            .run(&QueryDescriptor::new(
                "SELECT Parent.ProfileId, SobjectType, PermissionsCreate, PermissionsRead, \
                 PermissionsEdit, PermissionsDelete FROM ObjectPermissions \
                 WHERE Parent.IsOwnedByProfile = true",
            ))
            .await?;

        let mut matrix = orgscan_graph::UsageMatrix::new();
        for row in &rows {
            let profile_id = row
                .get("Parent")
                .and_then(|p| p.get("ProfileId"))
                .and_then(Value::as_str);
            let sobject = row_str(row, "SobjectType");
            let (Some(profile_id), Some(sobject)) = (profile_id, sobject) else {
                continue;
            };
            matrix.add_header(profile_id, profile_id);
            matrix.set_row_header(sobject.as_str(), sobject.as_str());
            matrix.set_cell(sobject.as_str(), profile_id, permission_code(row));
        }

        logger.ended(&format!(
            "built a {}x{} permission grid",
            matrix.rows.len(),
            matrix.headers.len()
        ));
        Ok(DatasetOutput::Matrix(matrix))
    }
}
