//! # LakePerm Core
//!
//! Core types, the ListPermissions record filter and the permissions resource
//! handlers for AWS Lake Formation.

pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod permissions;
pub mod retry;
pub mod types;

pub use backend::*;
pub use config::*;
pub use error::*;
pub use filter::*;
pub use permissions::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_permission() {
        let record = PermissionRecord::new(
            "arn:aws:iam::123456789012:role/data_scientist",
            Resource::Table(TableResource {
                database_name: "sales".to_string(),
                name: Some("orders".to_string()),
                ..Default::default()
            }),
            vec![Action::Select],
        );

        assert!(matches!(record.principal, Principal::Role(_)));
        assert_eq!(record.permissions.len(), 1);
        assert_eq!(record.permissions[0], Action::Select);
    }
}
