use shared::{JsonlReader, QueryAssociatedItems, RunRecord};
use std::path::Path;
use tracing::info;

use crate::error::Result;

/// Reads a JSONL run, one entry per line, keeping the file's item order.
pub fn load_run(run_path: impl AsRef<Path>) -> Result<Vec<QueryAssociatedItems>> {
    let reader = JsonlReader::<RunRecord>::open(run_path)?;
    let path = reader.path().to_string();

    let run = reader
        .map(|record| record.map(QueryAssociatedItems::from_record))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    info!("Loaded run with {} queries from {}", run.len(), path);
    Ok(run)
}
