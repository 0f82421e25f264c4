use std::fs;
use std::path::{Path, PathBuf};

use aprledger_ingest::IngestError;
use chrono::NaiveDateTime;
use log::info;

/// Copy the ledger to `<ledger dir>/<backup_dir>/<stem>_backup_<YYYYMMDD-HHMMSS><ext>`.
/// The copy keeps the original extension, so macro-enabled workbooks stay
/// macro-enabled. `at` is the run's local start time.
pub fn backup_ledger(ledger: &Path, backup_dir: &str, at: NaiveDateTime) -> Result<PathBuf, IngestError> {
    let dir = ledger.parent().unwrap_or_else(|| Path::new(".")).join(backup_dir);
    let dest = dir.join(backup_name(ledger, at));

    let backup_err = |message: String| IngestError::Backup { path: dest.clone(), message };

    fs::create_dir_all(&dir).map_err(|e| backup_err(format!("Failed to create {}: {}", dir.display(), e)))?;
    fs::copy(ledger, &dest).map_err(|e| backup_err(format!("Failed to copy {}: {}", ledger.display(), e)))?;

    info!("backed up {} to {}", ledger.display(), dest.display());
    Ok(dest)
}

fn backup_name(ledger: &Path, at: NaiveDateTime) -> String {
    let stem = ledger
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger".to_string());
    let ext = ledger
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{}_backup_{}{}", stem, at.format("%Y%m%d-%H%M%S"), ext)
}
