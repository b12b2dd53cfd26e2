use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lakeperm_aws::AwsBackend;
use lakeperm_core::*;
use lakeperm_emulator::{EmulatorBackend, StateExporter};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lakeperm")]
#[command(about = "Grant, read back and revoke AWS Lake Formation permissions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend to talk to (defaults to LAKEPERM_BACKEND, then the emulator)
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Emulator state file for persistence (optional)
    #[arg(short, long)]
    state_file: Option<String>,

    /// AWS region
    #[arg(long)]
    region: Option<String>,

    /// AWS profile name
    #[arg(long)]
    profile: Option<String>,

    /// Custom Lake Formation endpoint
    #[arg(long)]
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Emulator,
    Aws,
}

#[derive(Subcommand)]
enum Commands {
    /// Grant the permissions described in a JSON config and print the resulting state
    Grant {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Read permissions back from a JSON state
    Read {
        #[arg(long)]
        state: PathBuf,
        /// The state was just created (missing permissions are an error)
        #[arg(long)]
        new: bool,
    },
    /// Revoke the permissions of a JSON state
    Revoke {
        #[arg(long)]
        state: PathBuf,
    },
    /// Filter listed permission records against criteria, offline
    Filter {
        #[arg(long)]
        criteria: PathBuf,
        #[arg(long)]
        records: PathBuf,
    },
    /// Show emulator state
    Status,
}

enum Backend {
    Emulator(EmulatorBackend),
    Aws(AwsBackend),
}

impl Backend {
    async fn connect(config: &BackendConfig) -> Result<Self> {
        match config {
            BackendConfig::Emulator { state_file } => {
                Ok(Backend::Emulator(EmulatorBackend::new(state_file.clone()).await?))
            }
            BackendConfig::Aws {
                region,
                profile,
                endpoint,
            } => Ok(Backend::Aws(
                AwsBackend::with_config(region.clone(), profile.clone(), endpoint.clone()).await?,
            )),
        }
    }

    fn as_dyn(&self) -> &dyn LakeFormationBackend {
        match self {
            Backend::Emulator(backend) => backend,
            Backend::Aws(backend) => backend,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = resolve_config(&cli, LakePermConfig::from_env()?);

    match &cli.command {
        Commands::Grant { config: path } => {
            let permissions: PermissionsConfig = read_json(path)?;
            let backend = Backend::connect(&config.backend).await?;
            let state = PermissionsResource::new(backend.as_dyn(), config.retry)
                .create(permissions)
                .await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }

        Commands::Read { state, new } => {
            let state: PermissionsState = read_json(state)?;
            let backend = Backend::connect(&config.backend).await?;
            match PermissionsResource::new(backend.as_dyn(), config.retry)
                .read(&state, *new)
                .await?
            {
                Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                None => println!("removed"),
            }
        }

        Commands::Revoke { state } => {
            let state: PermissionsState = read_json(state)?;
            let backend = Backend::connect(&config.backend).await?;
            PermissionsResource::new(backend.as_dyn(), config.retry)
                .delete(&state)
                .await?;
            info!(id = %state.id, "revoked Lake Formation permissions");
        }

        Commands::Filter { criteria, records } => {
            let criteria: FilterCriteria = read_json(criteria)?;
            let records: Vec<PermissionRecord> = read_json(records)?;
            let clean = filter_permissions(&criteria, &records);
            println!("{}", serde_json::to_string_pretty(&clean)?);
        }

        Commands::Status => match Backend::connect(&config.backend).await? {
            Backend::Emulator(backend) => {
                println!("{}", StateExporter::to_summary(&backend.get_state().await));
            }
            Backend::Aws(backend) => {
                bail!(
                    "status is only available for the emulator backend (AWS region {})",
                    backend.region()
                );
            }
        },
    }

    Ok(())
}

/// Write logs to stderr, filtered by RUST_LOG (default `info`)
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Layer command line flags over environment configuration
fn resolve_config(cli: &Cli, mut config: LakePermConfig) -> LakePermConfig {
    let kind = cli.backend.unwrap_or(match config.backend {
        BackendConfig::Emulator { .. } => BackendKind::Emulator,
        BackendConfig::Aws { .. } => BackendKind::Aws,
    });

    config.backend = match (kind, config.backend) {
        (BackendKind::Emulator, BackendConfig::Emulator { state_file }) => BackendConfig::Emulator {
            state_file: cli.state_file.clone().or(state_file),
        },
        (BackendKind::Emulator, BackendConfig::Aws { .. }) => BackendConfig::Emulator {
            state_file: cli.state_file.clone(),
        },
        (
            BackendKind::Aws,
            BackendConfig::Aws {
                region,
                profile,
                endpoint,
            },
        ) => BackendConfig::Aws {
            region: cli.region.clone().or(region),
            profile: cli.profile.clone().or(profile),
            endpoint: cli.endpoint.clone().or(endpoint),
        },
        (BackendKind::Aws, BackendConfig::Emulator { .. }) => BackendConfig::Aws {
            region: cli.region.clone(),
            profile: cli.profile.clone(),
            endpoint: cli.endpoint.clone(),
        },
    };

    config
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli::try_parse_from(["lakeperm", "--region", "eu-west-1", "status"]).unwrap();
        let env = LakePermConfig {
            backend: BackendConfig::Aws {
                region: Some("us-east-1".to_string()),
                profile: Some("dev".to_string()),
                endpoint: None,
            },
            retry: RetryConfig::default(),
        };

        assert_eq!(
            resolve_config(&cli, env).backend,
            BackendConfig::Aws {
                region: Some("eu-west-1".to_string()),
                profile: Some("dev".to_string()),
                endpoint: None,
            }
        );
    }

    #[test]
    fn test_backend_flag_switches_backend() {
        let cli = Cli::try_parse_from([
            "lakeperm",
            "--backend",
            "emulator",
            "--state-file",
            "lf.json",
            "status",
        ])
        .unwrap();
        let env = LakePermConfig {
            backend: BackendConfig::Aws {
                region: None,
                profile: None,
                endpoint: None,
            },
            retry: RetryConfig::default(),
        };

        assert_eq!(
            resolve_config(&cli, env).backend,
            BackendConfig::Emulator {
                state_file: Some("lf.json".to_string())
            }
        );
    }

    #[test]
    fn test_read_subcommand() {
        let cli = Cli::try_parse_from(["lakeperm", "read", "--state", "perm.json", "--new"]).unwrap();
        assert!(matches!(cli.command, Commands::Read { new: true, .. }));
    }
}
