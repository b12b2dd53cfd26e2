//! Reconciliation of ListPermissions output against the requested resource
//!
//! ListPermissions does not answer in the shape it was asked:
//! 1. Implicit permissions of data lake administrators look exactly like explicit grants.
//! 2. One grant going in can come back as several records on several resources
//!    (SELECT on a Table is reported on a TableWithColumns + column wildcard record).
//! 3. Table permissions can come back on TableWithColumns records and vice versa.
//!
//! [`filter_permissions`] keeps the records that belong to the resource the caller
//! described, using the shape of the caller's own configuration.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// Which table block the caller configured (TableWithColumns is listed as a Table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    #[default]
    None,
    Table,
    TableWithColumns,
}

/// What the caller asked about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub principal: Principal,
    pub resource: Resource,
    #[serde(default)]
    pub table_type: TableType,
    #[serde(default)]
    pub column_names: Vec<String>,
    #[serde(default)]
    pub excluded_column_names: Vec<String>,
    #[serde(default)]
    pub column_wildcard: bool,
}

impl FilterCriteria {
    /// Criteria for a resource descriptor, column fields taken from a
    /// TableWithColumns descriptor when that is what was passed.
    pub fn new(principal: impl Into<Principal>, resource: Resource) -> Self {
        let mut criteria = Self {
            principal: principal.into(),
            table_type: TableType::None,
            column_names: Vec::new(),
            excluded_column_names: Vec::new(),
            column_wildcard: false,
            resource,
        };

        match &criteria.resource {
            Resource::Table(_) => criteria.table_type = TableType::Table,
            Resource::TableWithColumns(twc) => {
                criteria.table_type = TableType::TableWithColumns;
                criteria.column_names = twc.column_names.clone().unwrap_or_default();
                if let Some(wildcard) = &twc.column_wildcard {
                    criteria.column_wildcard = true;
                    criteria.excluded_column_names =
                        wildcard.excluded_column_names.clone().unwrap_or_default();
                }
            }
            _ => {}
        }

        criteria
    }
}

/// Select the records of `records` that pertain to `criteria`.
///
/// Never errors and never builds new records: the output borrows from the input.
pub fn filter_permissions<'a>(
    criteria: &FilterCriteria,
    records: &'a [PermissionRecord],
) -> Vec<&'a PermissionRecord> {
    let candidates = records
        .iter()
        .filter(|record| record.principal.matches(&criteria.principal));

    match &criteria.resource {
        Resource::Catalog
        | Resource::DataLocation(_)
        | Resource::Database(_)
        | Resource::LfTag(_)
        | Resource::LfTagPolicy(_)
        | Resource::DataCellsFilter(_) => {
            let kind = criteria.resource.kind();
            candidates.filter(|record| record.resource.kind() == kind).collect()
        }
        Resource::TableWithColumns(twc) => {
            filter_table_with_columns(criteria, &twc.name, candidates)
        }
        Resource::Table(table) if criteria.table_type == TableType::TableWithColumns => {
            filter_table_with_columns(criteria, table.name.as_deref().unwrap_or(""), candidates)
        }
        Resource::Table(table) => filter_table(table, candidates),
    }
}

// Granted on Table, Name = T:
//     listed ALTER, DELETE, DESCRIBE, DROP, INSERT on Table, Name = T
//     listed SELECT on TableWithColumns, Name = T, ColumnWildcard
// Granted on Table, TableWildcard:
//     listed ALTER, DELETE, DESCRIBE, DROP, INSERT on Table, TableWildcard, Name = ALL_TABLES
//     listed SELECT on TableWithColumns, Name = ALL_TABLES, ColumnWildcard
fn filter_table<'a>(
    table: &TableResource,
    candidates: impl Iterator<Item = &'a PermissionRecord>,
) -> Vec<&'a PermissionRecord> {
    let table_name = table.name.as_deref().unwrap_or("");

    candidates
        .filter(|record| match &record.resource {
            Resource::TableWithColumns(twc) if twc.column_wildcard.is_some() => {
                let same_table =
                    twc.name == table_name || (table.wildcard && twc.name == ALL_TABLES);
                same_table && leads_with_select(record)
            }
            Resource::Table(listed) if listed.database_name == table.database_name => {
                listed.name.as_deref().unwrap_or("") == table_name
                    || (listed.wildcard && table.wildcard)
            }
            _ => false,
        })
        .collect()
}

// Granted on TableWithColumns, Name = T, ColumnWildcard:
//     listed ALTER, DELETE, DESCRIBE, DROP, INSERT on Table, Name = T
//     listed SELECT on TableWithColumns, Name = T, ColumnWildcard
fn filter_table_with_columns<'a>(
    criteria: &FilterCriteria,
    table_name: &str,
    candidates: impl Iterator<Item = &'a PermissionRecord>,
) -> Vec<&'a PermissionRecord> {
    let wants_wildcard = criteria.column_wildcard || !criteria.excluded_column_names.is_empty();

    candidates
        .filter(|record| match &record.resource {
            Resource::TableWithColumns(twc) => {
                if let Some(columns) = &twc.column_names {
                    if column_sets_equal(columns, &criteria.column_names) {
                        return true;
                    }
                }

                match &twc.column_wildcard {
                    Some(wildcard) if wants_wildcard => {
                        let excluded = wildcard.excluded_column_names.as_deref();
                        (excluded.is_none() && criteria.excluded_column_names.is_empty())
                            || column_sets_equal(
                                excluded.unwrap_or(&[]),
                                &criteria.excluded_column_names,
                            )
                    }
                    _ => false,
                }
            }
            Resource::Table(listed) => listed.name.as_deref().unwrap_or("") == table_name,
            _ => false,
        })
        .collect()
}

fn leads_with_select(record: &PermissionRecord) -> bool {
    record.permissions.first() == Some(&Action::Select)
        || record.permissions_with_grant_option.first() == Some(&Action::Select)
}

/// Order-insensitive, case-sensitive comparison of column name lists
pub fn column_sets_equal(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut a: Vec<&str> = a.iter().map(String::as_str).collect();
    let mut b: Vec<&str> = b.iter().map(String::as_str).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}
