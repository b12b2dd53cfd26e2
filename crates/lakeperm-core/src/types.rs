//! Core data types for Lake Formation permissions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Table name the service reports for a table-wildcard grant
pub const ALL_TABLES: &str = "ALL_TABLES";

/// Principal identifier standing for "any IAM principal" (Lake Formation opt-out)
pub const IAM_ALLOWED_PRINCIPALS: &str = "IAM_ALLOWED_PRINCIPALS";

/// Represents a principal (user, role, account) that can hold permissions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Principal {
    /// The `IAM_ALLOWED_PRINCIPALS` group
    IamAllowedPrincipals,
    /// 12 digit AWS account id (cross-account grant)
    Account(String),
    /// IAM User (arn:aws:iam::123456789012:user/alice)
    User(String),
    /// IAM Role (arn:aws:iam::123456789012:role/data-scientist)
    Role(String),
    /// Anything else: SAML groups, organizations, organizational units
    Other(String),
}

impl Principal {
    /// Classify a raw `DataLakePrincipalIdentifier`
    pub fn from_identifier(identifier: &str) -> Self {
        if identifier == IAM_ALLOWED_PRINCIPALS {
            Principal::IamAllowedPrincipals
        } else if identifier.len() == 12 && identifier.chars().all(|c| c.is_ascii_digit()) {
            Principal::Account(identifier.to_string())
        } else if identifier.starts_with("arn:") && identifier.contains(":user/") {
            Principal::User(identifier.to_string())
        } else if identifier.starts_with("arn:") && identifier.contains(":role/") {
            Principal::Role(identifier.to_string())
        } else {
            Principal::Other(identifier.to_string())
        }
    }

    /// The identifier as sent on the wire
    pub fn identifier(&self) -> &str {
        match self {
            Principal::IamAllowedPrincipals => IAM_ALLOWED_PRINCIPALS,
            Principal::Account(id)
            | Principal::User(id)
            | Principal::Role(id)
            | Principal::Other(id) => id,
        }
    }

    /// Check if this principal matches another (identifiers are compared verbatim)
    pub fn matches(&self, other: &Principal) -> bool {
        self.identifier() == other.identifier()
    }
}

impl From<String> for Principal {
    fn from(identifier: String) -> Self {
        Principal::from_identifier(&identifier)
    }
}

impl From<&str> for Principal {
    fn from(identifier: &str) -> Self {
        Principal::from_identifier(identifier)
    }
}

impl From<Principal> for String {
    fn from(principal: Principal) -> Self {
        principal.identifier().to_string()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Permissions that can be granted on Lake Formation resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    All,
    Alter,
    Associate,
    CreateCatalog,
    CreateDatabase,
    CreateLfTag,
    CreateLfTagExpression,
    CreateTable,
    DataLocationAccess,
    Delete,
    Describe,
    Drop,
    GrantWithLfTagExpression,
    Insert,
    Select,
    SuperUser,
}

impl Action {
    pub const ALL_VALUES: [Action; 16] = [
        Action::All,
        Action::Alter,
        Action::Associate,
        Action::CreateCatalog,
        Action::CreateDatabase,
        Action::CreateLfTag,
        Action::CreateLfTagExpression,
        Action::CreateTable,
        Action::DataLocationAccess,
        Action::Delete,
        Action::Describe,
        Action::Drop,
        Action::GrantWithLfTagExpression,
        Action::Insert,
        Action::Select,
        Action::SuperUser,
    ];

    /// Wire name of the permission
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::All => "ALL",
            Action::Alter => "ALTER",
            Action::Associate => "ASSOCIATE",
            Action::CreateCatalog => "CREATE_CATALOG",
            Action::CreateDatabase => "CREATE_DATABASE",
            Action::CreateLfTag => "CREATE_LF_TAG",
            Action::CreateLfTagExpression => "CREATE_LF_TAG_EXPRESSION",
            Action::CreateTable => "CREATE_TABLE",
            Action::DataLocationAccess => "DATA_LOCATION_ACCESS",
            Action::Delete => "DELETE",
            Action::Describe => "DESCRIBE",
            Action::Drop => "DROP",
            Action::GrantWithLfTagExpression => "GRANT_WITH_LF_TAG_EXPRESSION",
            Action::Insert => "INSERT",
            Action::Select => "SELECT",
            Action::SuperUser => "SUPER_USER",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid Lake Formation permission: {0}")]
pub struct InvalidAction(pub String);

impl FromStr for Action {
    type Err = InvalidAction;

    // Case-insensitive, like the provider's permission validation
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Action::ALL_VALUES
            .iter()
            .copied()
            .find(|a| a.as_str() == upper)
            .ok_or_else(|| InvalidAction(s.to_string()))
    }
}

/// Data location (registered S3 path)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataLocationResource {
    pub arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DatabaseResource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
}

/// A table, or every table of a database when `wildcard` is set
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableResource {
    pub database_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub wildcard: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
}

/// "All columns except these"
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnWildcard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_column_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableWithColumnsResource {
    pub database_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_wildcard: Option<ColumnWildcard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
}

/// Lake Formation Tag key/values pair
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LfTag {
    pub key: String,
    pub values: Vec<String>,
}

/// Permissions on the LF-Tag itself
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LfTagKeyResource {
    pub key: String,
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LfTagPolicyResourceType {
    #[default]
    Database,
    Table,
}

impl LfTagPolicyResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LfTagPolicyResourceType::Database => "DATABASE",
            LfTagPolicyResourceType::Table => "TABLE",
        }
    }
}

/// Tag-based access policy: every resource of `resource_type` matching `expression`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LfTagPolicyResource {
    pub resource_type: LfTagPolicyResourceType,
    pub expression: Vec<LfTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
}

/// Row/cell level filter attached to a table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataCellsFilterResource {
    pub database_name: String,
    pub table_name: String,
    pub name: String,
    pub table_catalog_id: String,
}

/// Represents a Lake Formation resource a grant applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Catalog,
    DataLocation(DataLocationResource),
    Database(DatabaseResource),
    Table(TableResource),
    TableWithColumns(TableWithColumnsResource),
    LfTag(LfTagKeyResource),
    LfTagPolicy(LfTagPolicyResource),
    DataCellsFilter(DataCellsFilterResource),
}

/// Variant tag of a [`Resource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Catalog,
    DataLocation,
    Database,
    Table,
    TableWithColumns,
    LfTag,
    LfTagPolicy,
    DataCellsFilter,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Catalog => "Catalog",
            ResourceKind::DataLocation => "DataLocation",
            ResourceKind::Database => "Database",
            ResourceKind::Table => "Table",
            ResourceKind::TableWithColumns => "TableWithColumns",
            ResourceKind::LfTag => "LFTag",
            ResourceKind::LfTagPolicy => "LFTagPolicy",
            ResourceKind::DataCellsFilter => "DataCellsFilter",
        };
        f.write_str(name)
    }
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Catalog => ResourceKind::Catalog,
            Resource::DataLocation(_) => ResourceKind::DataLocation,
            Resource::Database(_) => ResourceKind::Database,
            Resource::Table(_) => ResourceKind::Table,
            Resource::TableWithColumns(_) => ResourceKind::TableWithColumns,
            Resource::LfTag(_) => ResourceKind::LfTag,
            Resource::LfTagPolicy(_) => ResourceKind::LfTagPolicy,
            Resource::DataCellsFilter(_) => ResourceKind::DataCellsFilter,
        }
    }

    pub fn as_table(&self) -> Option<&TableResource> {
        match self {
            Resource::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_with_columns(&self) -> Option<&TableWithColumnsResource> {
        match self {
            Resource::TableWithColumns(t) => Some(t),
            _ => None,
        }
    }

    /// Database a table-like resource lives in
    pub fn database_name(&self) -> Option<&str> {
        match self {
            Resource::Database(d) => Some(&d.name),
            Resource::Table(t) => Some(&t.database_name),
            Resource::TableWithColumns(t) => Some(&t.database_name),
            Resource::DataCellsFilter(f) => Some(&f.database_name),
            _ => None,
        }
    }
}

/// One entry of a ListPermissions response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub principal: Principal,
    pub resource: Resource,
    #[serde(default)]
    pub permissions: Vec<Action>,
    #[serde(default)]
    pub permissions_with_grant_option: Vec<Action>,
}

impl PermissionRecord {
    pub fn new(principal: impl Into<Principal>, resource: Resource, permissions: Vec<Action>) -> Self {
        Self {
            principal: principal.into(),
            resource,
            permissions,
            permissions_with_grant_option: Vec::new(),
        }
    }

    pub fn with_grant_option(mut self, permissions: Vec<Action>) -> Self {
        self.permissions_with_grant_option = permissions;
        self
    }
}
