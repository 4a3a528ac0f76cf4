use thiserror::Error;

use engine_core::error::SyncError;
use engine_core::registry::RegistryError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to read the configuration file: {0}")]
    ConfigFileRead(#[from] std::io::Error),

    #[error("failed to parse the configuration file as TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to run a sync cycle: {0}")]
    Sync(#[from] SyncError),

    #[error("failed to open the sync metadata registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("invalid connection format provided: {0}")]
    InvalidConnectionFormat(String),

    #[error("unsupported connection kind for testing")]
    UnsupportedConnectionKind,

    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("unexpected error: {0}")]
    Unexpected(String),

    #[error("shutdown requested")]
    ShutdownRequested,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Aggregate(String),
}

impl CliError {
    /// Maps to the process exit code spec §6 assigns this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigFileRead(_)
            | CliError::ConfigParse(_)
            | CliError::InvalidConnectionFormat(_)
            | CliError::UnsupportedConnectionKind
            | CliError::Config(_) => 2,
            CliError::Sync(SyncError::ConfigError(_)) => 2,
            CliError::ShutdownRequested => 130,
            _ => 1,
        }
    }
}
