//! TOML configuration: one target warehouse, N sources, each with the
//! table plans it participates in (spec §3, §4.1). Parsed with `toml` +
//! `serde`, the way the teacher's CLI layer reads its own config files.

use std::collections::BTreeMap;

use model::identifiers::{SourceId, SourceTable, TargetTable};
use model::plan::{ColumnSelection, RefreshRecent, TablePlan};
use model::schema::IndexSpec;
use serde::Deserialize;

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Mysql,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub engine: EngineKind,
    pub conn_str: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColumnsConfig {
    All(AllColumnsMarker),
    List(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllColumnsMarker {
    All,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        ColumnsConfig::All(AllColumnsMarker::All)
    }
}

impl From<ColumnsConfig> for ColumnSelection {
    fn from(value: ColumnsConfig) -> Self {
        match value {
            ColumnsConfig::All(_) => ColumnSelection::All,
            ColumnsConfig::List(cols) => ColumnSelection::List(cols),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshRecentConfig {
    #[default]
    Disabled,
    Timestamp,
    Column(String),
}

impl From<RefreshRecentConfig> for RefreshRecent {
    fn from(value: RefreshRecentConfig) -> Self {
        match value {
            RefreshRecentConfig::Disabled => RefreshRecent::Disabled,
            RefreshRecentConfig::Timestamp => RefreshRecent::EnabledByTimestamp,
            RefreshRecentConfig::Column(c) => RefreshRecent::Column(c),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub source_table: String,
    pub target_table: String,
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    #[serde(default)]
    pub timestamp_in_millis: bool,
    #[serde(default)]
    pub refresh_recent: RefreshRecentConfig,
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexSpec>,
    pub charset: Option<String>,
}

fn default_timestamp_column() -> String {
    "updated_at".to_string()
}

impl TableConfig {
    pub fn into_plan(self, source_id: &SourceId) -> TablePlan {
        TablePlan {
            target_table: TargetTable::new(self.target_table),
            source_table: SourceTable::new(self.source_table),
            source_id: source_id.clone(),
            columns: self.columns.into(),
            timestamp_column: self.timestamp_column,
            timestamp_in_millis: self.timestamp_in_millis,
            indexes: self.indexes,
            refresh_recent: self.refresh_recent.into(),
            charset: self.charset,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    #[serde(flatten)]
    pub database: DatabaseConfig,
    pub tables: Vec<TableConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Compact
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: DatabaseConfig,
    pub sources: Vec<SourceConfig>,
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: String,
    /// Max lines per chunk the pipeline splits a staged extract into
    /// before loading (spec §4.3). `0` disables chunking.
    #[serde(default)]
    pub chunk_size: usize,
    #[serde(default)]
    pub logger: LoggerConfig,
}

fn default_tmp_dir() -> String {
    std::env::var("TMPDIR").unwrap_or_else(|_| "/tmp".to_string())
}

impl Config {
    pub fn load(path: &str) -> Result<Config, CliError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }

    pub fn table_plans(&self) -> Vec<TablePlan> {
        self.sources
            .iter()
            .flat_map(|source| {
                let source_id = SourceId::new(source.id.clone());
                source
                    .tables
                    .clone()
                    .into_iter()
                    .map(move |table| table.into_plan(&source_id))
            })
            .collect()
    }
}
