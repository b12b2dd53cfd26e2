//! # Lake Formation Emulator
//!
//! In-memory implementation of the Lake Formation permission APIs.
//! Answers the way the service does where the permissions resource depends on
//! it: SELECT on a table is stored on a TableWithColumns + column wildcard
//! record, revoking nothing is an error, and listing a table also returns its
//! column-level records.

use anyhow::Result;
use async_trait::async_trait;
use lakeperm_core::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub mod storage;

pub use storage::{FileStorage, StateExporter};

const NOTHING_TO_REVOKE: &str = "No permissions revoked. Grantee has no permissions.";

/// Complete state of the Lake Formation emulator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmulatorState {
    /// Every stored permission record, in grant order
    pub records: Vec<PermissionRecord>,
}

impl EmulatorState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// API call an injected fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Grant,
    Revoke,
    List,
}

/// Lake Formation Emulator Backend
pub struct EmulatorBackend {
    state: Mutex<EmulatorState>,
    storage: Option<FileStorage>,
    faults: Mutex<HashMap<Operation, VecDeque<BackendError>>>,
}

impl EmulatorBackend {
    /// Create a new emulator backend, loading `state_file` when it exists
    pub async fn new(state_file: Option<String>) -> Result<Self> {
        let storage = state_file.map(FileStorage::new);
        let state = match &storage {
            Some(storage) if storage.exists() => {
                let state = storage.load().await?;
                info!(path = storage.path(), records = state.records.len(), "loaded emulator state");
                state
            }
            _ => EmulatorState::new(),
        };

        Ok(Self {
            state: Mutex::new(state),
            storage,
            faults: Mutex::new(HashMap::new()),
        })
    }

    /// Emulator seeded with records, without persistence
    pub fn with_records(records: Vec<PermissionRecord>) -> Self {
        Self {
            state: Mutex::new(EmulatorState { records }),
            storage: None,
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Make the next call of `operation` fail with `error`. Faults queue up and
    /// are consumed in order before the call succeeds again.
    pub async fn inject_error(&self, operation: Operation, error: BackendError) {
        self.faults
            .lock()
            .await
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Get current state (for debugging/inspection)
    pub async fn get_state(&self) -> EmulatorState {
        self.state.lock().await.clone()
    }

    async fn take_fault(&self, operation: Operation) -> Result<(), BackendError> {
        let fault = self
            .faults
            .lock()
            .await
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);

        match fault {
            Some(err) => {
                debug!(?operation, error = %err, "returning injected fault");
                Err(err)
            }
            None => Ok(()),
        }
    }

    async fn save_state(&self, state: &EmulatorState) -> Result<(), BackendError> {
        if let Some(storage) = &self.storage {
            storage.save(state).await.map_err(|err| {
                BackendError::from_code("InternalServiceException", format!("saving emulator state: {err}"))
            })?;
            debug!(path = storage.path(), "saved emulator state");
        }
        Ok(())
    }
}

/// One resource's share of a grant or revoke request
#[derive(Debug)]
struct Placement {
    resource: Resource,
    permissions: Vec<Action>,
    permissions_with_grant_option: Vec<Action>,
}

/// Where the service stores each requested permission:
/// SELECT on a Table lives on a TableWithColumns + column wildcard record, and
/// everything but SELECT on a column wildcard TableWithColumns lives on the Table.
fn placements(input: &PermissionsInput) -> Vec<Placement> {
    let (select, rest): (Vec<Action>, Vec<Action>) =
        input.permissions.iter().partition(|a| **a == Action::Select);
    let (select_grant, rest_grant): (Vec<Action>, Vec<Action>) = input
        .permissions_with_grant_option
        .iter()
        .partition(|a| **a == Action::Select);

    let (select_resource, rest_resource) = match &input.resource {
        Resource::Table(table) => {
            let name = match (&table.name, table.wildcard) {
                (_, true) | (None, _) => ALL_TABLES.to_string(),
                (Some(name), false) => name.clone(),
            };
            let columns = Resource::TableWithColumns(TableWithColumnsResource {
                database_name: table.database_name.clone(),
                name,
                column_names: None,
                column_wildcard: Some(ColumnWildcard::default()),
                catalog_id: table.catalog_id.clone(),
            });
            (columns, input.resource.clone())
        }
        Resource::TableWithColumns(twc) if twc.column_wildcard.is_some() => {
            let table = Resource::Table(TableResource {
                database_name: twc.database_name.clone(),
                name: Some(twc.name.clone()),
                wildcard: false,
                catalog_id: twc.catalog_id.clone(),
            });
            (input.resource.clone(), table)
        }
        other => {
            return vec![Placement {
                resource: other.clone(),
                permissions: input.permissions.clone(),
                permissions_with_grant_option: input.permissions_with_grant_option.clone(),
            }]
        }
    };

    [
        Placement {
            resource: select_resource,
            permissions: select,
            permissions_with_grant_option: select_grant,
        },
        Placement {
            resource: rest_resource,
            permissions: rest,
            permissions_with_grant_option: rest_grant,
        },
    ]
    .into_iter()
    .filter(|p| !p.permissions.is_empty() || !p.permissions_with_grant_option.is_empty())
    .collect()
}

fn merge_actions(into: &mut Vec<Action>, actions: &[Action]) {
    for action in actions {
        if !into.contains(action) {
            into.push(*action);
        }
    }
}

/// Remove `actions` from `from`, returning how many were held
fn remove_actions(from: &mut Vec<Action>, actions: &[Action]) -> usize {
    let before = from.len();
    from.retain(|a| !actions.contains(a));
    before - from.len()
}

/// Whether a stored record answers a ListPermissions request for `requested`
fn in_listing_scope(requested: &Resource, stored: &Resource) -> bool {
    match requested {
        // a table listing also answers with the column-level records of the database
        Resource::Table(table) => match stored {
            Resource::Table(s) => s.database_name == table.database_name,
            Resource::TableWithColumns(s) => s.database_name == table.database_name,
            _ => false,
        },
        Resource::TableWithColumns(twc) => stored
            .as_table_with_columns()
            .is_some_and(|s| s.database_name == twc.database_name && s.name == twc.name),
        Resource::Database(db) => matches!(stored, Resource::Database(s) if s.name == db.name),
        Resource::DataLocation(loc) => {
            matches!(stored, Resource::DataLocation(s) if s.arn == loc.arn)
        }
        Resource::DataCellsFilter(filter) => matches!(
            stored,
            Resource::DataCellsFilter(s)
                if s.database_name == filter.database_name
                    && s.table_name == filter.table_name
                    && s.name == filter.name
        ),
        Resource::LfTag(tag) => matches!(stored, Resource::LfTag(s) if s.key == tag.key),
        Resource::Catalog | Resource::LfTagPolicy(_) => stored.kind() == requested.kind(),
    }
}

#[async_trait]
impl LakeFormationBackend for EmulatorBackend {
    async fn grant_permissions(&self, input: &PermissionsInput) -> Result<(), BackendError> {
        self.take_fault(Operation::Grant).await?;

        let mut state = self.state.lock().await;
        let mut next = state.clone();
        for placement in placements(input) {
            let existing = next
                .records
                .iter_mut()
                .find(|r| r.principal.matches(&input.principal) && r.resource == placement.resource);

            match existing {
                Some(record) => {
                    merge_actions(&mut record.permissions, &placement.permissions);
                    merge_actions(
                        &mut record.permissions_with_grant_option,
                        &placement.permissions_with_grant_option,
                    );
                }
                None => next.records.push(PermissionRecord {
                    principal: input.principal.clone(),
                    resource: placement.resource,
                    permissions: placement.permissions,
                    permissions_with_grant_option: placement.permissions_with_grant_option,
                }),
            }
        }

        info!(
            principal = %input.principal,
            resource = %input.resource.kind(),
            permissions = ?input.permissions,
            "granted permissions"
        );
        self.save_state(&next).await?;
        *state = next;
        Ok(())
    }

    async fn revoke_permissions(&self, input: &PermissionsInput) -> Result<(), BackendError> {
        self.take_fault(Operation::Revoke).await?;

        // changes are staged on a copy until the request is known to succeed
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let mut revoked = 0;
        for placement in placements(input) {
            if let Some(record) = next
                .records
                .iter_mut()
                .find(|r| r.principal.matches(&input.principal) && r.resource == placement.resource)
            {
                revoked += remove_actions(&mut record.permissions, &placement.permissions);
                revoked += remove_actions(
                    &mut record.permissions_with_grant_option,
                    &placement.permissions_with_grant_option,
                );
                // a grant option cannot outlive its permission
                let held = record.permissions.clone();
                record.permissions_with_grant_option.retain(|a| held.contains(a));
            }
        }

        if revoked == 0 {
            return Err(BackendError::InvalidInput(NOTHING_TO_REVOKE.to_string()));
        }

        next.records.retain(|r| !r.permissions.is_empty());
        self.save_state(&next).await?;
        *state = next;
        info!(
            principal = %input.principal,
            resource = %input.resource.kind(),
            revoked,
            "revoked permissions"
        );
        Ok(())
    }

    async fn list_permissions(
        &self,
        input: &ListPermissionsInput,
    ) -> Result<Vec<PermissionRecord>, BackendError> {
        self.take_fault(Operation::List).await?;

        let state = self.state.lock().await;
        let records: Vec<PermissionRecord> = state
            .records
            .iter()
            .filter(|r| input.principal.as_ref().map_or(true, |p| r.principal.matches(p)))
            .filter(|r| {
                input
                    .resource
                    .as_ref()
                    .map_or(true, |resource| in_listing_scope(resource, &r.resource))
            })
            .cloned()
            .collect();

        debug!(count = records.len(), "listed permissions");
        Ok(records)
    }
}
