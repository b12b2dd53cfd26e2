//! Permissions resource: grant, read back and revoke one set of Lake Formation permissions
//!
//! Reading is where the work is. ListPermissions cannot be asked about a
//! TableWithColumns, answers with records that only partly belong to the
//! configured resource, and keeps answering for a while after a revoke. Some
//! peeking at the configuration is needed to pick the right records.

use crate::backend::*;
use crate::config::RetryConfig;
use crate::error::{BackendError, ErrorKind, ResourceError};
use crate::filter::{filter_permissions, FilterCriteria, TableType};
use crate::retry::{poll, retry_transient, GRANT_RETRY_RULES, LIST_RETRY_RULES, REVOKE_RETRY_RULES};
use crate::types::*;
use hex::ToHex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

const NO_PERMISSIONS_REVOKED: &str = "No permissions revoked. Grantee";
const NOTHING_LEFT_TO_REVOKE: &str = "No permissions revoked. Grantee has no";
const NON_EXISTENT_COLUMN: &str = "cannot grant/revoke permission on non-existent column";
const RESOURCE_DOES_NOT_EXIST: &str = "Resource does not exist";

/// `table_with_columns` block as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableWithColumnsConfig {
    pub database_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_column_names: Vec<String>,
    #[serde(default)]
    pub wildcard: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
}

/// The one resource block of a permissions configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceConfig {
    CatalogResource,
    DataLocation(DataLocationResource),
    Database(DatabaseResource),
    LfTag(LfTagKeyResource),
    LfTagPolicy(LfTagPolicyResource),
    Table(TableResource),
    TableWithColumns(TableWithColumnsConfig),
    DataCellsFilter(DataCellsFilterResource),
}

impl ResourceConfig {
    /// Resource descriptor for GrantPermissions / RevokePermissions
    pub fn expand(&self) -> Resource {
        match self {
            ResourceConfig::CatalogResource => Resource::Catalog,
            ResourceConfig::DataLocation(r) => Resource::DataLocation(r.clone()),
            ResourceConfig::Database(r) => Resource::Database(r.clone()),
            ResourceConfig::LfTag(r) => Resource::LfTag(r.clone()),
            ResourceConfig::LfTagPolicy(r) => Resource::LfTagPolicy(r.clone()),
            ResourceConfig::Table(r) => Resource::Table(r.clone()),
            ResourceConfig::TableWithColumns(r) => {
                let column_wildcard = if !r.excluded_column_names.is_empty() {
                    Some(ColumnWildcard {
                        excluded_column_names: Some(r.excluded_column_names.clone()),
                    })
                } else if r.wildcard {
                    Some(ColumnWildcard::default())
                } else {
                    None
                };

                Resource::TableWithColumns(TableWithColumnsResource {
                    database_name: r.database_name.clone(),
                    name: r.name.clone(),
                    column_names: if r.column_names.is_empty() {
                        None
                    } else {
                        Some(r.column_names.clone())
                    },
                    column_wildcard,
                    catalog_id: r.catalog_id.clone(),
                })
            }
            ResourceConfig::DataCellsFilter(r) => Resource::DataCellsFilter(r.clone()),
        }
    }

    /// Resource descriptor for ListPermissions and the table block it stands for.
    ///
    /// ListPermissions does not take a TableWithColumns, so that block is listed
    /// as its plain table.
    pub fn expand_for_listing(&self) -> (Resource, TableType) {
        match self {
            ResourceConfig::Table(r) => (Resource::Table(r.clone()), TableType::Table),
            ResourceConfig::TableWithColumns(r) => (
                Resource::Table(TableResource {
                    database_name: r.database_name.clone(),
                    name: Some(r.name.clone()),
                    wildcard: false,
                    catalog_id: r.catalog_id.clone(),
                }),
                TableType::TableWithColumns,
            ),
            other => (other.expand(), TableType::None),
        }
    }

    /// Filter criteria matching this block for `principal`
    pub fn filter_criteria(&self, principal: &Principal) -> FilterCriteria {
        let (resource, table_type) = self.expand_for_listing();
        let mut criteria = FilterCriteria {
            principal: principal.clone(),
            resource,
            table_type,
            column_names: Vec::new(),
            excluded_column_names: Vec::new(),
            column_wildcard: false,
        };

        if let ResourceConfig::TableWithColumns(r) = self {
            criteria.column_names = r.column_names.clone();
            criteria.excluded_column_names = r.excluded_column_names.clone();
            criteria.column_wildcard = r.wildcard;
        }

        criteria
    }
}

/// Desired permissions, as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsConfig {
    pub principal: Principal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    pub permissions: Vec<Action>,
    #[serde(default)]
    pub permissions_with_grant_option: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceConfig>,
}

impl PermissionsConfig {
    pub fn validate(&self) -> Result<(), ResourceError> {
        if self.principal.identifier().is_empty() {
            return Err(ResourceError::InvalidConfig("principal must not be empty".into()));
        }
        if self.permissions.is_empty() {
            return Err(ResourceError::InvalidConfig(
                "at least one permission is required".into(),
            ));
        }
        if self.resource.is_none() {
            return Err(ResourceError::InvalidConfig(
                "exactly one resource block is required".into(),
            ));
        }
        Ok(())
    }

    fn permissions_input(&self, resource: &ResourceConfig) -> PermissionsInput {
        PermissionsInput {
            catalog_id: self.catalog_id.clone(),
            principal: self.principal.clone(),
            resource: resource.expand(),
            permissions: self.permissions.clone(),
            permissions_with_grant_option: self.permissions_with_grant_option.clone(),
        }
    }
}

/// Permissions as last read back, keyed by a stable id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsState {
    pub id: String,
    #[serde(flatten)]
    pub config: PermissionsConfig,
}

/// Create / Read / Delete handlers for a permissions resource
pub struct PermissionsResource<'a> {
    backend: &'a dyn LakeFormationBackend,
    retry: RetryConfig,
}

impl<'a> PermissionsResource<'a> {
    pub fn new(backend: &'a dyn LakeFormationBackend, retry: RetryConfig) -> Self {
        Self { backend, retry }
    }

    /// Grant the configured permissions, then read them back
    pub async fn create(&self, config: PermissionsConfig) -> Result<PermissionsState, ResourceError> {
        config.validate()?;
        let resource = config
            .resource
            .as_ref()
            .ok_or_else(|| ResourceError::InvalidConfig("missing resource".into()))?;
        let input = config.permissions_input(resource);

        retry_transient(
            self.retry.iam_propagation_timeout(),
            self.retry.poll_interval(),
            GRANT_RETRY_RULES,
            || self.backend.grant_permissions(&input),
        )
        .await
        .map_err(|err| ResourceError::backend("creating", err))?;

        let id = permissions_id(&input)?;
        info!(
            %id,
            principal = %input.principal,
            resource = %input.resource.kind(),
            "granted Lake Formation permissions"
        );

        let state = PermissionsState { id, config };
        self.read(&state, true)
            .await?
            .ok_or(ResourceError::EmptyResponse { operation: "creating" })
    }

    /// Read the permissions back. `Ok(None)` means they are gone and the
    /// resource should be dropped from state.
    pub async fn read(
        &self,
        state: &PermissionsState,
        is_new: bool,
    ) -> Result<Option<PermissionsState>, ResourceError> {
        let config = &state.config;
        let Some(configured) = &config.resource else {
            warn!(id = %state.id, "Lake Formation permissions have no resource, removing from state");
            return Ok(None);
        };

        let (resource, table_type) = configured.expand_for_listing();
        let input = ListPermissionsInput {
            catalog_id: config.catalog_id.clone(),
            principal: Some(config.principal.clone()),
            resource: Some(resource),
        };

        debug!(id = %state.id, ?table_type, ?input, "reading Lake Formation permissions");

        let criteria = configured.filter_criteria(&config.principal);

        // a fresh grant can take a while to show up in ListPermissions
        let result = if is_new {
            poll(
                self.retry.iam_propagation_timeout(),
                self.retry.poll_interval(),
                || self.list_permissions(&input),
                |result| matches!(result, Ok(records) if filter_permissions(&criteria, records).is_empty()),
            )
            .await
        } else {
            self.list_permissions(&input).await
        };

        if !is_new {
            match &result {
                Err(err) if err.is_a(ErrorKind::EntityNotFound) => {
                    warn!(id = %state.id, "Lake Formation permissions not found, removing from state");
                    return Ok(None);
                }
                Err(err) if err.message_contains(ErrorKind::AccessDenied, RESOURCE_DOES_NOT_EXIST) => {
                    warn!(id = %state.id, error = %err, "Lake Formation permissions not found, removing from state");
                    return Ok(None);
                }
                Ok(records) if records.is_empty() => {
                    warn!(id = %state.id, "Lake Formation permissions not found, removing from state (0 permissions)");
                    return Ok(None);
                }
                _ => {}
            }
        }

        let all_permissions = result.map_err(|err| ResourceError::backend("reading", err))?;

        let clean_permissions = filter_permissions(&criteria, &all_permissions);

        if clean_permissions.is_empty() {
            warn!(id = %state.id, "no Lake Formation permissions found, removing from state");
            return Ok(None);
        }

        if clean_permissions.len() != all_permissions.len() {
            info!(
                id = %state.id,
                clean = clean_permissions.len(),
                all = all_permissions.len(),
                "Lake Formation clean and all permissions differ in length (this is not necessarily a problem)"
            );
        }

        Ok(Some(flatten_state(state, configured, &clean_permissions)))
    }

    async fn list_permissions(
        &self,
        input: &ListPermissionsInput,
    ) -> Result<Vec<PermissionRecord>, BackendError> {
        retry_transient(
            self.retry.iam_propagation_timeout(),
            self.retry.poll_interval(),
            LIST_RETRY_RULES,
            || self.backend.list_permissions(input),
        )
        .await
    }

    /// Revoke the permissions and wait until the service confirms nothing is left
    pub async fn delete(&self, state: &PermissionsState) -> Result<(), ResourceError> {
        let config = &state.config;
        let Some(configured) = &config.resource else {
            warn!(id = %state.id, "no Lake Formation resource with permissions to revoke");
            return Ok(());
        };
        let input = config.permissions_input(configured);

        let result = retry_transient(
            self.retry.delete_timeout(),
            self.retry.poll_interval(),
            REVOKE_RETRY_RULES,
            || self.backend.revoke_permissions(&input),
        )
        .await;

        match result {
            Err(err) if already_revoked(&err) => return Ok(()),
            Err(err) => return Err(ResourceError::backend("revoking", err)),
            Ok(()) => {}
        }

        // ListPermissions keeps reporting some revoked permissions (catalog
        // CREATE_DATABASE at least), and other unrelated grants on the same
        // resource make counting useless. Revoke again until the service says
        // there is nothing left.
        let result = poll(
            self.retry.delete_timeout(),
            self.retry.poll_interval(),
            || self.backend.revoke_permissions(&input),
            |result| !matches!(result, Err(err) if err.message_contains(ErrorKind::InvalidInput, NOTHING_LEFT_TO_REVOKE)),
        )
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.message_contains(ErrorKind::InvalidInput, NO_PERMISSIONS_REVOKED) => Ok(()),
            Err(err) => Err(ResourceError::backend("revoking", err)),
        }
    }
}

fn already_revoked(err: &BackendError) -> bool {
    err.message_contains(ErrorKind::InvalidInput, NO_PERMISSIONS_REVOKED)
        || err.message_contains(ErrorKind::InvalidInput, NON_EXISTENT_COLUMN)
}

/// Stable id for a grant request: SHA-256 of its JSON form, hex encoded
pub fn permissions_id(input: &PermissionsInput) -> Result<String, ResourceError> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(input)?);
    Ok(hasher.finalize().encode_hex::<String>())
}

fn flatten_state(
    state: &PermissionsState,
    configured: &ResourceConfig,
    clean: &[&PermissionRecord],
) -> PermissionsState {
    let first = clean[0];

    let resource = match configured {
        // the list may hold TableWithColumns records too, take the first table-shaped one
        ResourceConfig::Table(_) => clean.iter().find_map(|record| match &record.resource {
            Resource::TableWithColumns(twc) if twc.column_wildcard.is_some() => {
                Some(ResourceConfig::Table(flatten_table_with_columns_as_table(twc)))
            }
            Resource::Table(table) => Some(ResourceConfig::Table(flatten_table(table))),
            _ => None,
        }),
        // and vice versa
        ResourceConfig::TableWithColumns(_) => clean.iter().find_map(|record| {
            record
                .resource
                .as_table_with_columns()
                .map(|twc| ResourceConfig::TableWithColumns(flatten_table_with_columns(twc)))
        }),
        _ => flatten_resource(&first.resource),
    };

    PermissionsState {
        id: state.id.clone(),
        config: PermissionsConfig {
            principal: first.principal.clone(),
            catalog_id: state.config.catalog_id.clone(),
            permissions: flatten_actions(clean, |record| &record.permissions),
            permissions_with_grant_option: flatten_actions(clean, |record| {
                &record.permissions_with_grant_option
            }),
            resource,
        },
    }
}

fn flatten_resource(resource: &Resource) -> Option<ResourceConfig> {
    match resource {
        Resource::Catalog => Some(ResourceConfig::CatalogResource),
        Resource::DataLocation(r) => Some(ResourceConfig::DataLocation(r.clone())),
        Resource::Database(r) => Some(ResourceConfig::Database(r.clone())),
        Resource::LfTag(r) => Some(ResourceConfig::LfTag(r.clone())),
        Resource::LfTagPolicy(r) => Some(ResourceConfig::LfTagPolicy(r.clone())),
        Resource::DataCellsFilter(r) => Some(ResourceConfig::DataCellsFilter(r.clone())),
        Resource::Table(_) | Resource::TableWithColumns(_) => None,
    }
}

/// Sorted union of one permission list over all records (duplicates kept)
fn flatten_actions<F>(records: &[&PermissionRecord], pick: F) -> Vec<Action>
where
    F: Fn(&PermissionRecord) -> &Vec<Action>,
{
    let mut actions: Vec<Action> = records.iter().flat_map(|r| pick(r).iter().copied()).collect();
    actions.sort_by_key(|a| a.as_str());
    actions
}

pub fn flatten_table(table: &TableResource) -> TableResource {
    let name = match &table.name {
        Some(name) if name == ALL_TABLES && table.wildcard => None,
        other => other.clone(),
    };

    TableResource {
        database_name: table.database_name.clone(),
        name,
        wildcard: table.wildcard,
        catalog_id: table.catalog_id.clone(),
    }
}

/// SELECT on a Table comes back as a TableWithColumns with a column wildcard:
/// TWC + ColumnWildcard              = Table
/// TWC + ColumnWildcard + ALL_TABLES = Table + TableWildcard
pub fn flatten_table_with_columns_as_table(twc: &TableWithColumnsResource) -> TableResource {
    let wildcard = twc.name == ALL_TABLES && twc.column_wildcard.is_some();

    TableResource {
        database_name: twc.database_name.clone(),
        name: if wildcard { None } else { Some(twc.name.clone()) },
        wildcard,
        catalog_id: twc.catalog_id.clone(),
    }
}

pub fn flatten_table_with_columns(twc: &TableWithColumnsResource) -> TableWithColumnsConfig {
    let mut column_names = twc.column_names.clone().unwrap_or_default();
    column_names.sort();

    let mut excluded_column_names = twc
        .column_wildcard
        .as_ref()
        .and_then(|w| w.excluded_column_names.clone())
        .unwrap_or_default();
    excluded_column_names.sort();

    TableWithColumnsConfig {
        database_name: twc.database_name.clone(),
        name: twc.name.clone(),
        column_names,
        excluded_column_names,
        wildcard: twc.column_wildcard.is_some(),
        catalog_id: twc.catalog_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const ROLE: &str = "arn:aws:iam::123456789012:role/analyst";

    /// Answers from a script, recording every request
    #[derive(Default)]
    struct ScriptedBackend {
        grants: Mutex<VecDeque<Result<(), BackendError>>>,
        revokes: Mutex<VecDeque<Result<(), BackendError>>>,
        lists: Mutex<VecDeque<Result<Vec<PermissionRecord>, BackendError>>>,
        revoke_calls: Mutex<u32>,
    }

    #[async_trait]
    impl LakeFormationBackend for ScriptedBackend {
        async fn grant_permissions(&self, _input: &PermissionsInput) -> Result<(), BackendError> {
            self.grants.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn revoke_permissions(&self, _input: &PermissionsInput) -> Result<(), BackendError> {
            *self.revoke_calls.lock().unwrap() += 1;
            self.revokes.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(BackendError::InvalidInput(
                    "No permissions revoked. Grantee has no permissions.".into(),
                ))
            })
        }

        async fn list_permissions(
            &self,
            _input: &ListPermissionsInput,
        ) -> Result<Vec<PermissionRecord>, BackendError> {
            self.lists.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            iam_propagation_timeout_secs: 1,
            delete_timeout_secs: 1,
            poll_interval_ms: 1,
        }
    }

    fn orders_table() -> TableResource {
        TableResource {
            database_name: "sales".to_string(),
            name: Some("orders".to_string()),
            ..Default::default()
        }
    }

    fn table_config() -> PermissionsConfig {
        PermissionsConfig {
            principal: ROLE.into(),
            catalog_id: None,
            permissions: vec![Action::Select, Action::Alter],
            permissions_with_grant_option: Vec::new(),
            resource: Some(ResourceConfig::Table(orders_table())),
        }
    }

    fn listed_table_records() -> Vec<PermissionRecord> {
        vec![
            PermissionRecord::new(ROLE, Resource::Table(orders_table()), vec![Action::Alter]),
            PermissionRecord::new(
                ROLE,
                Resource::TableWithColumns(TableWithColumnsResource {
                    database_name: "sales".to_string(),
                    name: "orders".to_string(),
                    column_wildcard: Some(ColumnWildcard::default()),
                    ..Default::default()
                }),
                vec![Action::Select],
            ),
        ]
    }

    #[test]
    fn test_expand_table_with_columns() {
        let config = ResourceConfig::TableWithColumns(TableWithColumnsConfig {
            database_name: "hr".to_string(),
            name: "employees".to_string(),
            excluded_column_names: vec!["salary".to_string()],
            wildcard: true,
            ..Default::default()
        });

        let Resource::TableWithColumns(twc) = config.expand() else {
            panic!("expected TableWithColumns");
        };
        assert_eq!(twc.column_names, None);
        assert_eq!(
            twc.column_wildcard.unwrap().excluded_column_names,
            Some(vec!["salary".to_string()])
        );

        let (listed, table_type) = config.expand_for_listing();
        assert_eq!(table_type, TableType::TableWithColumns);
        assert_eq!(listed.as_table().unwrap().name.as_deref(), Some("employees"));
    }

    #[test]
    fn test_flatten_tables() {
        let wildcard = TableResource {
            database_name: "sales".to_string(),
            name: Some(ALL_TABLES.to_string()),
            wildcard: true,
            catalog_id: None,
        };
        assert_eq!(flatten_table(&wildcard).name, None);

        let twc = TableWithColumnsResource {
            database_name: "sales".to_string(),
            name: ALL_TABLES.to_string(),
            column_wildcard: Some(ColumnWildcard::default()),
            ..Default::default()
        };
        let table = flatten_table_with_columns_as_table(&twc);
        assert!(table.wildcard);
        assert_eq!(table.name, None);

        let flat = flatten_table_with_columns(&TableWithColumnsResource {
            column_names: Some(vec!["b".to_string(), "a".to_string()]),
            ..twc
        });
        assert_eq!(flat.column_names, vec!["a".to_string(), "b".to_string()]);
        assert!(flat.wildcard);
    }

    #[tokio::test]
    async fn test_create_retries_and_reads_back() {
        let backend = ScriptedBackend::default();
        backend
            .grants
            .lock()
            .unwrap()
            .push_back(Err(BackendError::InvalidInput("Invalid principal".into())));
        backend.lists.lock().unwrap().push_back(Ok(listed_table_records()));

        let resource = PermissionsResource::new(&backend, fast_retry());
        let state = resource.create(table_config()).await.unwrap();

        assert!(!state.id.is_empty());
        assert_eq!(state.config.permissions, vec![Action::Alter, Action::Select]);
        assert_eq!(state.config.resource, Some(ResourceConfig::Table(orders_table())));
    }

    #[tokio::test]
    async fn test_create_surfaces_terminal_error() {
        let backend = ScriptedBackend::default();
        backend
            .grants
            .lock()
            .unwrap()
            .push_back(Err(BackendError::AccessDenied("Resource does not exist".into())));

        let resource = PermissionsResource::new(&backend, fast_retry());
        let err = resource.create(table_config()).await.unwrap_err();

        assert!(matches!(err, ResourceError::Backend { operation: "creating", .. }));
    }

    #[tokio::test]
    async fn test_read_removes_missing_permissions() {
        let state = PermissionsState {
            id: "1".to_string(),
            config: table_config(),
        };

        for answer in [
            Err(BackendError::EntityNotFound("no such table".into())),
            Err(BackendError::AccessDenied("Resource does not exist".into())),
            Ok(Vec::new()),
            Ok(vec![PermissionRecord::new(
                "arn:aws:iam::123456789012:role/other",
                Resource::Table(orders_table()),
                vec![Action::Alter],
            )]),
        ] {
            let backend = ScriptedBackend::default();
            backend.lists.lock().unwrap().push_back(answer);
            let resource = PermissionsResource::new(&backend, fast_retry());

            assert_eq!(resource.read(&state, false).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_read_errors_for_new_resource() {
        let backend = ScriptedBackend::default();
        backend
            .lists
            .lock()
            .unwrap()
            .push_back(Err(BackendError::EntityNotFound("no such table".into())));
        let resource = PermissionsResource::new(&backend, fast_retry());
        let state = PermissionsState {
            id: "1".to_string(),
            config: table_config(),
        };

        assert!(resource.read(&state, true).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_confirms_revocation() {
        let backend = ScriptedBackend::default();
        {
            let mut revokes = backend.revokes.lock().unwrap();
            revokes.push_back(Err(BackendError::ConcurrentModification("busy".into())));
            revokes.push_back(Ok(()));
            // permissions still visible once more
            revokes.push_back(Ok(()));
        }
        let resource = PermissionsResource::new(&backend, fast_retry());
        let state = PermissionsState {
            id: "1".to_string(),
            config: table_config(),
        };

        resource.delete(&state).await.unwrap();
        assert_eq!(*backend.revoke_calls.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_delete_without_resource_is_noop() {
        let backend = ScriptedBackend::default();
        let resource = PermissionsResource::new(&backend, fast_retry());
        let mut config = table_config();
        config.resource = None;

        resource
            .delete(&PermissionsState { id: "1".to_string(), config })
            .await
            .unwrap();
        assert_eq!(*backend.revoke_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_permissions_id_is_stable() {
        let config = table_config();
        let input = config.permissions_input(config.resource.as_ref().unwrap());
        assert_eq!(permissions_id(&input).unwrap(), permissions_id(&input.clone()).unwrap());

        let mut other = input.clone();
        other.permissions.push(Action::Drop);
        assert_ne!(permissions_id(&input).unwrap(), permissions_id(&other).unwrap());

        let id = permissions_id(&input).unwrap();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_catalog_tag_permissions_round_trip() {
        let config: PermissionsConfig = serde_json::from_str(
            r#"{
                "principal": "arn:aws:iam::123456789012:role/analyst",
                "permissions": ["CREATE_LF_TAG", "CREATE_DATABASE"],
                "resource": "catalog_resource"
            }"#,
        )
        .unwrap();
        assert_eq!(config.resource, Some(ResourceConfig::CatalogResource));

        let backend = ScriptedBackend::default();
        backend.lists.lock().unwrap().push_back(Ok(vec![PermissionRecord::new(
            ROLE,
            Resource::Catalog,
            vec![Action::CreateLfTag, Action::CreateDatabase],
        )]));

        let resource = PermissionsResource::new(&backend, fast_retry());
        let state = resource.create(config).await.unwrap();

        assert_eq!(
            state.config.permissions,
            vec![Action::CreateDatabase, Action::CreateLfTag]
        );
        let json = serde_json::to_value(&state.config).unwrap();
        assert_eq!(json["permissions"][1], "CREATE_LF_TAG");
    }

    #[tokio::test]
    async fn test_create_waits_for_listing_to_catch_up() {
        let backend = ScriptedBackend::default();
        {
            let mut lists = backend.lists.lock().unwrap();
            lists.push_back(Ok(Vec::new()));
            // only somebody else's grant visible yet
            lists.push_back(Ok(vec![PermissionRecord::new(
                "arn:aws:iam::123456789012:role/other",
                Resource::Table(orders_table()),
                vec![Action::Alter],
            )]));
            lists.push_back(Ok(vec![PermissionRecord::new(
                ROLE,
                Resource::Table(orders_table()),
                vec![Action::Alter],
            )]));
        }

        let mut config = table_config();
        config.permissions = vec![Action::Alter];
        let resource = PermissionsResource::new(&backend, fast_retry());
        let state = resource.create(config).await.unwrap();

        assert_eq!(state.config.permissions, vec![Action::Alter]);
        assert!(backend.lists.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_gives_up_when_grant_never_shows() {
        let backend = ScriptedBackend::default();
        let retry = RetryConfig {
            iam_propagation_timeout_secs: 0,
            delete_timeout_secs: 0,
            poll_interval_ms: 1,
        };
        let resource = PermissionsResource::new(&backend, retry);

        let err = resource.create(table_config()).await.unwrap_err();
        assert!(matches!(err, ResourceError::EmptyResponse { operation: "creating" }));
    }
}
