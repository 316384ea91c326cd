use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::constants::EXPORT_FILE_PREFIX;
use crate::edits::{EditError, EditStore, Result};
use crate::slot::SlotStore;

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub path: PathBuf,
    pub filename: String,
    pub edited_count: usize,
    pub bytes: usize,
}

/// Export filename for an instant: `edits_backup_2024-01-02T03-04-05-678Z.json`
///
/// Colons and periods of the ISO timestamp become hyphens so the name is
/// safe on every filesystem and still sorts chronologically.
pub fn export_filename(at: DateTime<Utc>) -> String {
    let iso = at.to_rfc3339_opts(SecondsFormat::Millis, true);
    format!("{}{}.json", EXPORT_FILE_PREFIX, iso.replace([':', '.'], "-"))
}

/// Snapshot bytes and the filename to offer them under
///
/// Refused with `NothingToExport` when no record has been edited.
pub fn prepare_export<S: SlotStore>(store: &EditStore<S>) -> Result<(String, Vec<u8>)> {
    if store.edited_count() == 0 {
        return Err(EditError::NothingToExport);
    }
    let bytes = store.export_snapshot()?;
    Ok((export_filename(Utc::now()), bytes))
}

/// Write a snapshot of all edits into `dir`
pub fn export_edits<S: SlotStore>(store: &EditStore<S>, dir: &Path) -> Result<ExportResponse> {
    let (filename, bytes) = prepare_export(store)?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(&filename);
    std::fs::write(&path, &bytes)?;

    info!(
        "Exported edits for {} records to {}",
        store.edited_count(),
        path.display()
    );

    Ok(ExportResponse {
        path,
        filename,
        edited_count: store.edited_count(),
        bytes: bytes.len(),
    })
}

/// Backup export when a session ends; skipped when nothing was edited
///
/// Never fails: problems are logged and `None` is returned.
pub fn export_on_session_end<S: SlotStore>(store: &EditStore<S>, dir: &Path) -> Option<PathBuf> {
    if store.edited_count() == 0 {
        return None;
    }
    match export_edits(store, dir) {
        Ok(response) => Some(response.path),
        Err(e) => {
            warn!("Session-end export to {} failed: {}", dir.display(), e);
            None
        }
    }
}
