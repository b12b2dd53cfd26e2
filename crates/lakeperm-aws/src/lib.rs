//! # AWS Lake Formation Backend
//!
//! Real AWS Lake Formation implementation for production usage.

use anyhow::Result;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_lakeformation::config::Builder as ConfigBuilder;
use aws_sdk_lakeformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_lakeformation::types::{
    self as lf, DataLakePrincipal, Permission as LfPermission, PrincipalResourcePermissions,
    Resource as LfResource,
};
use aws_sdk_lakeformation::Client;
use lakeperm_core::*;
use tracing::{debug, warn};

/// AWS Lake Formation backend implementation
pub struct AwsBackend {
    client: Client,
    region: String,
}

impl AwsBackend {
    /// Create new AWS backend with default config
    pub async fn new() -> Result<Self> {
        Self::with_config(None, None, None).await
    }

    /// Create AWS backend with custom configuration
    pub async fn with_config(
        region: Option<String>,
        profile: Option<String>,
        endpoint: Option<String>,
    ) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &region {
            loader = loader.region(Region::new(region.clone()));
        }

        if let Some(profile) = &profile {
            loader = loader.profile_name(profile);
        }

        let aws_config = loader.load().await;

        let mut lf_config = ConfigBuilder::from(&aws_config);

        // Custom endpoint (LocalStack and the like)
        if let Some(endpoint) = endpoint {
            lf_config = lf_config.endpoint_url(endpoint);
        }

        let client = Client::from_conf(lf_config.build());

        let region_name = aws_config
            .region()
            .map(|r| r.as_ref().to_string())
            .unwrap_or_else(|| "us-east-1".to_string());

        debug!(region = %region_name, "created Lake Formation client");

        Ok(Self {
            client,
            region: region_name,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl LakeFormationBackend for AwsBackend {
    async fn grant_permissions(&self, input: &PermissionsInput) -> Result<(), BackendError> {
        self.client
            .grant_permissions()
            .set_catalog_id(input.catalog_id.clone())
            .principal(convert_principal(&input.principal))
            .resource(convert_resource(&input.resource)?)
            .set_permissions(Some(convert_actions(&input.permissions)))
            .set_permissions_with_grant_option(non_empty(convert_actions(
                &input.permissions_with_grant_option,
            )))
            .send()
            .await
            .map_err(convert_sdk_error)?;

        Ok(())
    }

    async fn revoke_permissions(&self, input: &PermissionsInput) -> Result<(), BackendError> {
        self.client
            .revoke_permissions()
            .set_catalog_id(input.catalog_id.clone())
            .principal(convert_principal(&input.principal))
            .resource(convert_resource(&input.resource)?)
            .set_permissions(Some(convert_actions(&input.permissions)))
            .set_permissions_with_grant_option(non_empty(convert_actions(
                &input.permissions_with_grant_option,
            )))
            .send()
            .await
            .map_err(convert_sdk_error)?;

        Ok(())
    }

    async fn list_permissions(
        &self,
        input: &ListPermissionsInput,
    ) -> Result<Vec<PermissionRecord>, BackendError> {
        let principal = input.principal.as_ref().map(convert_principal);
        let resource = input.resource.as_ref().map(convert_resource).transpose()?;

        let mut records = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_permissions()
                .set_catalog_id(input.catalog_id.clone())
                .set_principal(principal.clone())
                .set_resource(resource.clone())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(convert_sdk_error)?;

            records.extend(
                response
                    .principal_resource_permissions()
                    .iter()
                    .filter_map(convert_aws_record),
            );

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(count = records.len(), "listed Lake Formation permissions");
        Ok(records)
    }
}

// Helper functions for converting between our types and AWS SDK types

fn convert_sdk_error<E, R>(err: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some(code) => BackendError::from_code(code, err.message().unwrap_or_default()),
        None => BackendError::Transport(DisplayErrorContext(&err).to_string()),
    }
}

fn build_error(what: &str, err: impl std::fmt::Display) -> BackendError {
    BackendError::Service {
        code: "BuildError".to_string(),
        message: format!("building {}: {}", what, err),
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn convert_principal(principal: &Principal) -> DataLakePrincipal {
    DataLakePrincipal::builder()
        .data_lake_principal_identifier(principal.identifier())
        .build()
}

fn convert_actions(actions: &[Action]) -> Vec<LfPermission> {
    actions
        .iter()
        .map(|action| LfPermission::from(action.as_str()))
        .collect()
}

fn convert_lf_tags(tags: &[LfTag]) -> Result<Vec<lf::LfTag>, BackendError> {
    tags.iter()
        .map(|tag| {
            lf::LfTag::builder()
                .tag_key(&tag.key)
                .set_tag_values(Some(tag.values.clone()))
                .build()
                .map_err(|e| build_error("LF-Tag", e))
        })
        .collect()
}

fn convert_resource(resource: &Resource) -> Result<LfResource, BackendError> {
    let builder = LfResource::builder();

    let builder = match resource {
        Resource::Catalog => builder.catalog(lf::CatalogResource::builder().build()),
        Resource::DataLocation(location) => builder.data_location(
            lf::DataLocationResource::builder()
                .set_catalog_id(location.catalog_id.clone())
                .resource_arn(&location.arn)
                .build()
                .map_err(|e| build_error("data location resource", e))?,
        ),
        Resource::Database(database) => builder.database(
            lf::DatabaseResource::builder()
                .set_catalog_id(database.catalog_id.clone())
                .name(&database.name)
                .build()
                .map_err(|e| build_error("database resource", e))?,
        ),
        Resource::Table(table) => {
            let table_builder = lf::TableResource::builder()
                .set_catalog_id(table.catalog_id.clone())
                .database_name(&table.database_name);

            let table_builder = if table.wildcard {
                table_builder.table_wildcard(lf::TableWildcard::builder().build())
            } else {
                table_builder.set_name(table.name.clone())
            };

            builder.table(
                table_builder
                    .build()
                    .map_err(|e| build_error("table resource", e))?,
            )
        }
        Resource::TableWithColumns(twc) => {
            let column_wildcard = twc.column_wildcard.as_ref().map(|wildcard| {
                lf::ColumnWildcard::builder()
                    .set_excluded_column_names(wildcard.excluded_column_names.clone())
                    .build()
            });

            builder.table_with_columns(
                lf::TableWithColumnsResource::builder()
                    .set_catalog_id(twc.catalog_id.clone())
                    .database_name(&twc.database_name)
                    .name(&twc.name)
                    .set_column_names(twc.column_names.clone())
                    .set_column_wildcard(column_wildcard)
                    .build()
                    .map_err(|e| build_error("table with columns resource", e))?,
            )
        }
        Resource::LfTag(tag) => builder.lf_tag(
            lf::LfTagKeyResource::builder()
                .set_catalog_id(tag.catalog_id.clone())
                .tag_key(&tag.key)
                .set_tag_values(Some(tag.values.clone()))
                .build()
                .map_err(|e| build_error("LF-Tag resource", e))?,
        ),
        Resource::LfTagPolicy(policy) => builder.lf_tag_policy(
            lf::LfTagPolicyResource::builder()
                .set_catalog_id(policy.catalog_id.clone())
                .resource_type(lf::ResourceType::from(policy.resource_type.as_str()))
                .set_expression(Some(convert_lf_tags(&policy.expression)?))
                .build()
                .map_err(|e| build_error("LF-Tag policy resource", e))?,
        ),
        Resource::DataCellsFilter(filter) => builder.data_cells_filter(
            lf::DataCellsFilterResource::builder()
                .table_catalog_id(&filter.table_catalog_id)
                .database_name(&filter.database_name)
                .table_name(&filter.table_name)
                .name(&filter.name)
                .build(),
        ),
    };

    Ok(builder.build())
}

// Helper functions for reverse conversion (AWS -> our types)

fn convert_aws_record(entry: &PrincipalResourcePermissions) -> Option<PermissionRecord> {
    let identifier = entry.principal()?.data_lake_principal_identifier()?;
    let Some(resource) = entry.resource().and_then(convert_aws_resource) else {
        warn!(principal = identifier, "skipping permissions on an unsupported resource type");
        return None;
    };

    Some(PermissionRecord {
        principal: Principal::from_identifier(identifier),
        resource,
        permissions: convert_aws_permissions(entry.permissions()),
        permissions_with_grant_option: convert_aws_permissions(
            entry.permissions_with_grant_option(),
        ),
    })
}

fn convert_aws_permissions(permissions: &[LfPermission]) -> Vec<Action> {
    permissions
        .iter()
        .filter_map(|permission| match permission.as_str().parse::<Action>() {
            Ok(action) => Some(action),
            Err(err) => {
                warn!(error = %err, "skipping unsupported permission");
                None
            }
        })
        .collect()
}

fn owned_list(items: &[String]) -> Option<Vec<String>> {
    non_empty(items.to_vec())
}

fn convert_aws_resource(resource: &LfResource) -> Option<Resource> {
    if resource.catalog().is_some() {
        return Some(Resource::Catalog);
    }

    if let Some(location) = resource.data_location() {
        return Some(Resource::DataLocation(DataLocationResource {
            arn: location.resource_arn().to_string(),
            catalog_id: location.catalog_id().map(String::from),
        }));
    }

    if let Some(database) = resource.database() {
        return Some(Resource::Database(DatabaseResource {
            name: database.name().to_string(),
            catalog_id: database.catalog_id().map(String::from),
        }));
    }

    if let Some(table) = resource.table() {
        return Some(Resource::Table(TableResource {
            database_name: table.database_name().to_string(),
            name: table.name().map(String::from),
            wildcard: table.table_wildcard().is_some(),
            catalog_id: table.catalog_id().map(String::from),
        }));
    }

    if let Some(twc) = resource.table_with_columns() {
        return Some(Resource::TableWithColumns(TableWithColumnsResource {
            database_name: twc.database_name().to_string(),
            name: twc.name().to_string(),
            column_names: owned_list(twc.column_names()),
            column_wildcard: twc.column_wildcard().map(|wildcard| ColumnWildcard {
                excluded_column_names: owned_list(wildcard.excluded_column_names()),
            }),
            catalog_id: twc.catalog_id().map(String::from),
        }));
    }

    if let Some(tag) = resource.lf_tag() {
        return Some(Resource::LfTag(LfTagKeyResource {
            key: tag.tag_key().to_string(),
            values: tag.tag_values().to_vec(),
            catalog_id: tag.catalog_id().map(String::from),
        }));
    }

    if let Some(policy) = resource.lf_tag_policy() {
        let resource_type = match policy.resource_type() {
            lf::ResourceType::Table => LfTagPolicyResourceType::Table,
            _ => LfTagPolicyResourceType::Database,
        };
        return Some(Resource::LfTagPolicy(LfTagPolicyResource {
            resource_type,
            expression: policy
                .expression()
                .iter()
                .map(|tag| LfTag {
                    key: tag.tag_key().to_string(),
                    values: tag.tag_values().to_vec(),
                })
                .collect(),
            catalog_id: policy.catalog_id().map(String::from),
        }));
    }

    if let Some(filter) = resource.data_cells_filter() {
        return Some(Resource::DataCellsFilter(DataCellsFilterResource {
            database_name: filter.database_name().unwrap_or_default().to_string(),
            table_name: filter.table_name().unwrap_or_default().to_string(),
            name: filter.name().unwrap_or_default().to_string(),
            table_catalog_id: filter.table_catalog_id().unwrap_or_default().to_string(),
        }));
    }

    None
}

// Export the main constructor
pub async fn create_aws_backend(
    region: Option<String>,
    profile: Option<String>,
    endpoint: Option<String>,
) -> Result<AwsBackend> {
    AwsBackend::with_config(region, profile, endpoint).await
}
