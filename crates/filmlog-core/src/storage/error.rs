//! Storage error handling
//!
//! Provides typed errors for storage operations with descriptive messages
//! and recovery suggestions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to copy a database file
    #[error("Failed to copy database file '{path}': {source}")]
    CopyFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File not found (when expected to exist)
    #[error("File not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Database file was written by a newer version of the application
    #[error("Database schema version {found} is newer than the supported version {supported}. Update the application.")]
    NewerSchema { found: i32, supported: i32 },

    /// Database file predates the oldest supported schema version
    #[error("Database schema version {found} is no longer supported")]
    UnsupportedSchema { found: i32 },

    /// Imported file is not a readable database
    #[error("Imported file '{path}' is corrupt or not a database: {details}. The previous database has been restored.")]
    CorruptImport { path: PathBuf, details: String },

    /// Imported file opened but its schema does not match
    #[error("Imported file '{path}' failed the schema check: {details}. The previous database has been restored.")]
    IncompatibleImport { path: PathBuf, details: String },

    /// Import was requested on an in-memory database
    #[error("Import requires a file-backed database")]
    InMemoryImport,

    /// SQLite database error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DatabaseError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => DatabaseError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => DatabaseError::NotFound { path },
            // StorageFull is available but may not be on all platforms
            // Also check for "No space left" in the error message
            _ if is_disk_full_error(&error) => DatabaseError::DiskFull {
                path,
                source: error,
            },
            _ => DatabaseError::CopyFailed {
                path,
                source: error,
            },
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable import failures leave the previous database restored
    /// and fully usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DatabaseError::DiskFull { .. }
                | DatabaseError::PermissionDenied { .. }
                | DatabaseError::CorruptImport { .. }
                | DatabaseError::IncompatibleImport { .. }
                | DatabaseError::NewerSchema { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            DatabaseError::DiskFull { .. } => {
                Some("Free up disk space and try again.")
            }
            DatabaseError::PermissionDenied { .. } => {
                Some("Check file and directory permissions. You may need to run with different permissions or change ownership.")
            }
            DatabaseError::CorruptImport { .. } => {
                Some("The imported file could not be read as a database. Your previous data is intact; verify the file and try again.")
            }
            DatabaseError::IncompatibleImport { .. } => {
                Some("The imported file was not produced by a compatible version of this application. Your previous data is intact.")
            }
            DatabaseError::NewerSchema { .. } => {
                Some("This file was written by a newer version of the application. Update and try again.")
            }
            DatabaseError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            _ => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    // Check error message for disk full indicators
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for storage operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = DatabaseError::from_io(io_err, PathBuf::from("/test/path"));

        assert!(matches!(err, DatabaseError::PermissionDenied { .. }));
        assert!(err.is_recoverable());
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_not_found_classification() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = DatabaseError::from_io(io_err, PathBuf::from("/missing/file"));

        assert!(matches!(err, DatabaseError::NotFound { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_disk_full_detection() {
        let io_err = io::Error::new(io::ErrorKind::Other, "No space left on device");
        let err = DatabaseError::from_io(io_err, PathBuf::from("/full/disk"));

        assert!(matches!(err, DatabaseError::DiskFull { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = DatabaseError::PermissionDenied {
            path: PathBuf::from("/test/file"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };

        let msg = err.to_string();
        assert!(msg.contains("Permission denied"));
        assert!(msg.contains("/test/file"));
    }

    #[test]
    fn test_corrupt_import_display() {
        let err = DatabaseError::CorruptImport {
            path: PathBuf::from("/data/filmlog.db"),
            details: "file is not a database".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("corrupt"));
        assert!(msg.contains("restored"));
        assert!(err.is_recoverable());
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_newer_schema_display() {
        let err = DatabaseError::NewerSchema {
            found: 99,
            supported: 24,
        };

        let msg = err.to_string();
        assert!(msg.contains("99"));
        assert!(msg.contains("24"));
        assert!(err.is_recoverable());
    }
}
