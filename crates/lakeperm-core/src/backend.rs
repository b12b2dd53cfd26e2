//! Backend trait for different Lake Formation implementations

use crate::error::BackendError;
use crate::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request body shared by GrantPermissions and RevokePermissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    pub principal: Principal,
    pub resource: Resource,
    pub permissions: Vec<Action>,
    #[serde(default)]
    pub permissions_with_grant_option: Vec<Action>,
}

/// ListPermissions request; unset fields widen the listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPermissionsInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
}

/// Trait for Lake Formation backend implementations
/// This allows us to swap between local emulator and real AWS
#[async_trait]
pub trait LakeFormationBackend: Send + Sync {
    /// Grant permissions to a principal
    async fn grant_permissions(&self, input: &PermissionsInput) -> Result<(), BackendError>;

    /// Revoke permissions from a principal
    async fn revoke_permissions(&self, input: &PermissionsInput) -> Result<(), BackendError>;

    /// List permissions, following every page of the listing
    async fn list_permissions(
        &self,
        input: &ListPermissionsInput,
    ) -> Result<Vec<PermissionRecord>, BackendError>;
}
