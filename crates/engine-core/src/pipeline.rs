//! `ExtractLoadPipeline`: the source-to-target data movement spec §4.2
//! delegates to the database adapters (spec §5, §6). The pipeline itself
//! only resolves column projections, stages a temp file between the two
//! bulk calls, and asks a `TempFileJanitor` to dispose of it — the actual
//! cleanup policy is left to that interface, matching spec's Non-goal that
//! temp-file cleanup is specified only via an interface, not implemented
//! here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use connectors::adapter::DatabaseAdapter;
use connectors::query;
use model::plan::{ColumnSelection, TablePlan};
use model::schema::TableSchema;

use crate::error::SyncError;

#[async_trait]
pub trait TempFileJanitor: Send + Sync {
    async fn cleanup(&self, path: &Path);
}

/// Leaves the staged file in place. Real retention/quota policy is a
/// deployment concern, not the pipeline's (spec Non-goals).
pub struct NoopJanitor;

#[async_trait]
impl TempFileJanitor for NoopJanitor {
    async fn cleanup(&self, _path: &Path) {}
}

/// Removes the file unconditionally once the pipeline is done with it.
pub struct DeletingJanitor;

#[async_trait]
impl TempFileJanitor for DeletingJanitor {
    async fn cleanup(&self, path: &Path) {
        let _ = tokio::fs::remove_file(path).await;
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub rows: u64,
    pub last_row_at: Option<i64>,
}

/// A bulk-extracted file staged on disk, with the column order it was
/// written in, ready for `ExtractLoadPipeline::load`.
pub struct StagedExtract {
    pub file: PathBuf,
    pub columns: Vec<String>,
    pub rows: u64,
}

pub struct ExtractLoadPipeline {
    source: Arc<dyn DatabaseAdapter>,
    target: Arc<dyn DatabaseAdapter>,
    tmp_dir: PathBuf,
    janitor: Arc<dyn TempFileJanitor>,
    chunk_size: usize,
}

impl ExtractLoadPipeline {
    pub fn new(
        source: Arc<dyn DatabaseAdapter>,
        target: Arc<dyn DatabaseAdapter>,
        tmp_dir: impl Into<PathBuf>,
        janitor: Arc<dyn TempFileJanitor>,
    ) -> Self {
        Self {
            source,
            target,
            tmp_dir: tmp_dir.into(),
            janitor,
            chunk_size: 0,
        }
    }

    /// Sets the max lines per chunk `load` splits a staged extract into
    /// before loading each piece in order (spec §4.3 step 3). `0` (the
    /// default) skips splitting and loads the whole file as one chunk.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Bulk-extracts rows from `source_table` newer than `since` (in the
    /// plan's declared unit) to a staged file, without touching the target.
    pub async fn extract(
        &self,
        plan: &TablePlan,
        source_table: &str,
        label: &str,
        since: Option<i64>,
    ) -> Result<StagedExtract, SyncError> {
        let schema = self
            .source
            .schema(source_table)
            .await
            .map_err(|e| SyncError::extract(source_table, e))?;
        let columns = resolve_columns(&plan.columns, &schema);

        let sql = query::select_since(
            self.source.kind(),
            source_table,
            &columns,
            Some(&plan.timestamp_column),
            since,
        );

        let file = self
            .tmp_dir
            .join(format!("{}-{}.extract", label, uuid::Uuid::new_v4()));

        self.source
            .extract_to_file(&sql, &file, plan.charset.as_deref())
            .await
            .map_err(|e| SyncError::extract(source_table, e))?;

        let rows = count_rows(&file).await.unwrap_or(0);

        Ok(StagedExtract { file, columns, rows })
    }

    /// Bulk-loads a previously staged extract into `target_table`. If a
    /// chunk size is set, the staged file is first split into equal-line
    /// chunks on disk and each is loaded (and deleted on success) in order;
    /// otherwise the whole file is loaded as one chunk. The original staged
    /// file is disposed of via the janitor on every exit path (spec §4.3).
    pub async fn load(
        &self,
        target_table: &str,
        staged: &StagedExtract,
    ) -> Result<(), SyncError> {
        let chunks = split_file_into_chunks(&staged.file, self.chunk_size)
            .await
            .map_err(|e| SyncError::split(target_table, connectors::error::DbError::Io(e)))?;

        let mut result = Ok(());
        for chunk in &chunks {
            match self.target.load_from_file(target_table, &staged.columns, chunk).await {
                Ok(()) => {
                    if chunk != &staged.file {
                        let _ = tokio::fs::remove_file(chunk).await;
                    }
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        self.janitor.cleanup(&staged.file).await;
        for chunk in &chunks {
            if chunk != &staged.file {
                let _ = tokio::fs::remove_file(chunk).await;
            }
        }

        result.map_err(|e| SyncError::load(target_table, e))
    }

    /// Extracts rows from `source_table` newer than `since` and bulk-loads
    /// them into `target_table` in one step, returning the row count moved
    /// and the new high-water timestamp observed on the target.
    pub async fn run(
        &self,
        plan: &TablePlan,
        source_table: &str,
        target_table: &str,
        since: Option<i64>,
    ) -> Result<PipelineReport, SyncError> {
        let staged = self.extract(plan, source_table, target_table, since).await?;
        let rows = staged.rows;
        self.load(target_table, &staged).await?;

        let last_row_at = self
            .target
            .max_timestamp(target_table, &plan.timestamp_column)
            .await
            .map_err(|e| SyncError::load(target_table, e))?;

        Ok(PipelineReport { rows, last_row_at })
    }
}

fn resolve_columns(selection: &ColumnSelection, schema: &TableSchema) -> Vec<String> {
    match selection {
        ColumnSelection::All => schema.column_names(),
        ColumnSelection::List(cols) => cols.clone(),
    }
}

async fn count_rows(path: &Path) -> std::io::Result<u64> {
    let contents = tokio::fs::read(path).await?;
    Ok(contents.iter().filter(|&&b| b == b'\n').count() as u64)
}

/// Splits `file` into chunks of at most `chunk_size` lines each, writing
/// each chunk alongside the original file and returning the chunk paths in
/// order. `chunk_size == 0` (or a file with no more lines than one chunk)
/// treats the whole file as a single chunk without touching the
/// filesystem (spec §4.3 step 3).
async fn split_file_into_chunks(file: &Path, chunk_size: usize) -> std::io::Result<Vec<PathBuf>> {
    if chunk_size == 0 {
        return Ok(vec![file.to_path_buf()]);
    }

    let content = tokio::fs::read_to_string(file).await?;
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= chunk_size {
        return Ok(vec![file.to_path_buf()]);
    }

    let mut chunks = Vec::new();
    for (idx, group) in lines.chunks(chunk_size).enumerate() {
        let chunk_path = PathBuf::from(format!("{}.chunk{idx}", file.display()));
        let mut body = group.join("\n");
        body.push('\n');
        tokio::fs::write(&chunk_path, body).await?;
        chunks.push(chunk_path);
    }
    Ok(chunks)
}
