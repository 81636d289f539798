use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::models::{PairingSummary, PairingTable};

/// Write the pairing table as comma-separated text, creating parent directories
pub fn write_pairs(table: &PairingTable, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, table.to_delimited())?;
    tracing::info!(path = %path.display(), rows = table.len(), "pairing table written");
    Ok(())
}

/// Write the run summary as pretty-printed JSON
pub fn write_summary(summary: &PairingSummary, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut json = serde_json::to_string_pretty(summary)?;
    json.push('\n');
    fs::write(path, json)?;
    tracing::info!(path = %path.display(), "summary written");
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
