//! Persistent storage for the Lake Formation emulator

use crate::EmulatorState;
use anyhow::{Context, Result};
use lakeperm_core::{PermissionRecord, Resource};
use std::collections::BTreeSet;
use std::path::Path;

/// Storage backend for emulator state
#[derive(Debug)]
pub struct FileStorage {
    file_path: String,
}

impl FileStorage {
    pub fn new(file_path: String) -> Self {
        Self { file_path }
    }

    pub fn path(&self) -> &str {
        &self.file_path
    }

    /// Load state from file
    pub async fn load(&self) -> Result<EmulatorState> {
        if !self.exists() {
            return Ok(EmulatorState::new());
        }

        let content = tokio::fs::read_to_string(&self.file_path)
            .await
            .with_context(|| format!("reading {}", self.file_path))?;
        let state: EmulatorState = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.file_path))?;
        Ok(state)
    }

    /// Save state to file
    pub async fn save(&self, state: &EmulatorState) -> Result<()> {
        let content = serde_json::to_string_pretty(state)?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(&self.file_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(&self.file_path, content).await?;
        Ok(())
    }

    /// Check if storage file exists
    pub fn exists(&self) -> bool {
        Path::new(&self.file_path).exists()
    }
}

/// Export state to different formats
pub struct StateExporter;

impl StateExporter {
    /// Export state as a human-readable summary
    pub fn to_summary(state: &EmulatorState) -> String {
        let principals: BTreeSet<&str> = state
            .records
            .iter()
            .map(|r| r.principal.identifier())
            .collect();

        let mut summary = String::new();
        summary.push_str("🦀 Lake Formation Emulator State Summary\n");
        summary.push_str("=========================================\n\n");

        summary.push_str("📊 **Statistics:**\n");
        summary.push_str(&format!("- Permission records: {}\n", state.records.len()));
        summary.push_str(&format!("- Principals: {}\n\n", principals.len()));

        if !state.records.is_empty() {
            summary.push_str("🔐 **Permissions:**\n");
            for (i, record) in state.records.iter().enumerate() {
                summary.push_str(&format!("{}. {}\n", i + 1, describe(record)));
            }
        }

        summary
    }
}

fn describe(record: &PermissionRecord) -> String {
    let actions = record
        .permissions
        .iter()
        .map(|a| {
            if record.permissions_with_grant_option.contains(a) {
                format!("{a} (grantable)")
            } else {
                a.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("{} → {} → {}", record.principal, actions, describe_resource(&record.resource))
}

fn describe_resource(resource: &Resource) -> String {
    match resource {
        Resource::Catalog => "CATALOG".to_string(),
        Resource::DataLocation(loc) => format!("DATA LOCATION {}", loc.arn),
        Resource::Database(db) => format!("DATABASE {}", db.name),
        Resource::Table(table) if table.wildcard => format!("TABLE {}.*", table.database_name),
        Resource::Table(table) => format!(
            "TABLE {}.{}",
            table.database_name,
            table.name.as_deref().unwrap_or_default()
        ),
        Resource::TableWithColumns(twc) => {
            let columns = match (&twc.column_names, &twc.column_wildcard) {
                (_, Some(wildcard)) => match &wildcard.excluded_column_names {
                    Some(excluded) if !excluded.is_empty() => format!("* EXCEPT {}", excluded.join(", ")),
                    _ => "*".to_string(),
                },
                (Some(names), None) => names.join(", "),
                (None, None) => String::new(),
            };
            format!("TABLE {}.{}({})", twc.database_name, twc.name, columns)
        }
        Resource::LfTag(tag) => format!("LF-TAG {}={}", tag.key, tag.values.join(",")),
        Resource::LfTagPolicy(policy) => {
            let expression = policy
                .expression
                .iter()
                .map(|tag| format!("{}={}", tag.key, tag.values.join(",")))
                .collect::<Vec<_>>()
                .join(" AND ");
            format!("{} RESOURCES TAGGED {}", policy.resource_type.as_str(), expression)
        }
        Resource::DataCellsFilter(filter) => format!(
            "DATA CELLS FILTER {}.{}.{}",
            filter.database_name, filter.table_name, filter.name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakeperm_core::{Action, DatabaseResource};
    use tempfile::TempDir;

    fn sample_state() -> EmulatorState {
        EmulatorState {
            records: vec![PermissionRecord::new(
                "arn:aws:iam::123456789012:role/analyst",
                Resource::Database(DatabaseResource {
                    name: "sales".to_string(),
                    catalog_id: None,
                }),
                vec![Action::CreateTable, Action::Describe],
            )
            .with_grant_option(vec![Action::Describe])],
        }
    }

    #[tokio::test]
    async fn test_file_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let storage = FileStorage::new(path.to_string_lossy().to_string());
        assert!(!storage.exists());

        // Missing file loads as empty state
        assert!(storage.load().await.unwrap().records.is_empty());

        storage.save(&sample_state()).await.unwrap();
        assert!(storage.exists());

        let loaded_state = storage.load().await.unwrap();
        assert_eq!(loaded_state.records, sample_state().records);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(path.to_string_lossy().to_string());
        assert!(storage.load().await.is_err());
    }

    #[test]
    fn test_summary() {
        let summary = StateExporter::to_summary(&sample_state());
        assert!(summary.contains("- Permission records: 1"));
        assert!(summary.contains("CREATE_TABLE, DESCRIBE (grantable)"));
        assert!(summary.contains("DATABASE sales"));
    }
}
