use model::sync_metadata::SyncMetadata;

use crate::error::CliError;

pub fn print_status_table(metas: &[SyncMetadata]) {
    println!(
        "{:<24} {:<30} {:<30} {:<15}",
        "Table", "Last synced", "Last batch synced", "Last row at"
    );
    println!("{}", "-".repeat(100));
    for meta in metas {
        let last_batch = meta
            .last_batch_synced_at
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        let last_row_at = meta
            .last_row_at
            .map(|v| v.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:<24} {:<30} {:<30} {:<15}",
            meta.target_table.as_str(),
            meta.last_synced_at.to_rfc3339(),
            last_batch,
            last_row_at,
        );
    }
}

pub fn print_status_json(metas: &[SyncMetadata]) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(metas)
        .map_err(|e| CliError::Unexpected(format!("failed to serialize status: {e}")))?;
    println!("{json}");
    Ok(())
}
