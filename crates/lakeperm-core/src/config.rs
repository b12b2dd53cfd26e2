//! Runtime configuration: which backend to talk to and how long to wait on it

use crate::error::ResourceError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// IAM principal propagation, also used for GrantPermissions retries
pub const DEFAULT_IAM_PROPAGATION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_DELETE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Configuration for backend implementations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Local emulator (no AWS required)
    Emulator {
        /// Optional file to persist state
        #[serde(default)]
        state_file: Option<String>,
    },
    /// Real AWS Lake Formation
    Aws {
        /// AWS region
        #[serde(default)]
        region: Option<String>,
        /// AWS profile name
        #[serde(default)]
        profile: Option<String>,
        /// Custom endpoint (for testing)
        #[serde(default)]
        endpoint: Option<String>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Emulator { state_file: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub iam_propagation_timeout_secs: u64,
    pub delete_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl RetryConfig {
    pub fn iam_propagation_timeout(&self) -> Duration {
        Duration::from_secs(self.iam_propagation_timeout_secs)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            iam_propagation_timeout_secs: DEFAULT_IAM_PROPAGATION_TIMEOUT_SECS,
            delete_timeout_secs: DEFAULT_DELETE_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LakePermConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl LakePermConfig {
    /// Build configuration from `LAKEPERM_*` and standard AWS environment variables
    pub fn from_env() -> Result<Self, ResourceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ResourceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("LAKEPERM_BACKEND").as_deref() {
            None | Some("emulator") => BackendConfig::Emulator {
                state_file: lookup("LAKEPERM_STATE_FILE"),
            },
            Some("aws") => BackendConfig::Aws {
                region: lookup("AWS_REGION"),
                profile: lookup("AWS_PROFILE"),
                endpoint: lookup("LAKEPERM_ENDPOINT"),
            },
            Some(other) => {
                return Err(ResourceError::InvalidConfig(format!(
                    "LAKEPERM_BACKEND must be 'emulator' or 'aws', got '{}'",
                    other
                )))
            }
        };

        let mut retry = RetryConfig::default();
        if let Some(v) = parse_number(&lookup, "LAKEPERM_IAM_PROPAGATION_TIMEOUT_SECS")? {
            retry.iam_propagation_timeout_secs = v;
        }
        if let Some(v) = parse_number(&lookup, "LAKEPERM_DELETE_TIMEOUT_SECS")? {
            retry.delete_timeout_secs = v;
        }
        if let Some(v) = parse_number(&lookup, "LAKEPERM_POLL_INTERVAL_MS")? {
            retry.poll_interval_ms = v;
        }

        Ok(Self { backend, retry })
    }
}

fn parse_number<F>(lookup: &F, key: &str) -> Result<Option<u64>, ResourceError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|_| {
                ResourceError::InvalidConfig(format!("{} must be a number, got '{}'", key, raw))
            })
        })
        .transpose()
}
