//! Database file import helpers
//!
//! File-level plumbing for replacing the live database with an external
//! file: the safety backup, the swap, the rollback, and the corruption
//! classification. The orchestration (close, swap, reopen, verify) lives
//! on the façade, which owns the connection.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::storage::error::{DatabaseError, DatabaseResult};

/// Path of the safety backup kept next to the live file
///
/// The backup is left on disk after a successful import as a manual
/// recovery point; it is overwritten by the next import.
pub(crate) fn backup_path(live: &Path) -> PathBuf {
    let mut name = live.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Copy the live file aside, then the candidate over the live path
///
/// A failure in the first copy leaves everything untouched; a failure in
/// the second leaves the backup in place for the caller to restore from.
pub(crate) fn stage(live: &Path, backup: &Path, source: &Path) -> DatabaseResult<()> {
    fs::copy(live, backup).map_err(|e| DatabaseError::from_io(e, live.to_path_buf()))?;
    debug!("Backed up '{}' to '{}'", live.display(), backup.display());
    fs::copy(source, live).map_err(|e| DatabaseError::from_io(e, source.to_path_buf()))?;
    debug!("Copied import candidate '{}' into place", source.display());
    Ok(())
}

/// Restore the backup over the live file after a failed import
pub(crate) fn restore(live: &Path, backup: &Path) -> DatabaseResult<()> {
    fs::copy(backup, live).map_err(|e| DatabaseError::from_io(e, backup.to_path_buf()))?;
    info!("Restored previous database from '{}'", backup.display());
    Ok(())
}

/// Whether an engine error means the file is not a readable database
pub(crate) fn is_corruption(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                rusqlite::ErrorCode::NotADatabase | rusqlite::ErrorCode::DatabaseCorrupt
            )
    )
}
