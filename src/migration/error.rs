//! Migration-specific error types

use crate::TideError;

/// Migration-specific errors
#[derive(Debug)]
pub enum MigrationError {
    /// Database execution error
    Database(TideError),
    /// Migrations directory could not be read, or a file could not be written
    Io(String),
    /// Referenced migration file absent from the catalog
    FileNotFound(String),
    /// Filename or boundary key does not match the expected shape
    InvalidFormat(String),
    /// Bookkeeping table missing when required
    StateTableMissing,
    /// Migration failed during execution; its transaction was rolled back
    ExecutionFailed { filename: String, error: String },
    /// Catalog and bookkeeping state disagree
    Consistency(String),
}

impl std::fmt::Display for MigrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationError::Database(e) => write!(f, "Database error: {}", e),
            MigrationError::Io(msg) => write!(f, "Migration store I/O error: {}", msg),
            MigrationError::FileNotFound(filename) => {
                write!(f, "Migration file not found: {}", filename)
            }
            MigrationError::InvalidFormat(msg) => {
                write!(f, "Invalid migration format: {}", msg)
            }
            MigrationError::StateTableMissing => {
                write!(
                    f,
                    "The migrations bookkeeping table does not exist.\n\
                     Run `setup` against this database before resolving a revert plan."
                )
            }
            MigrationError::ExecutionFailed { filename, error } => {
                write!(
                    f,
                    "Migration '{}' failed during execution: {}\n\
                     The unit's transaction was rolled back; earlier units remain applied.\n\
                     Fix the failure and rerun - already-applied units are skipped.",
                    filename, error
                )
            }
            MigrationError::Consistency(msg) => {
                write!(
                    f,
                    "Migration state is inconsistent: {}\n\
                     This indicates the catalog and the bookkeeping table have diverged;\n\
                     no database mutation was performed.",
                    msg
                )
            }
        }
    }
}

impl std::error::Error for MigrationError {}

impl From<TideError> for MigrationError {
    fn from(error: TideError) -> Self {
        MigrationError::Database(error)
    }
}

impl From<crate::transaction::TransactionError> for MigrationError {
    fn from(error: crate::transaction::TransactionError) -> Self {
        MigrationError::Database(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_failed_display_names_the_unit() {
        let err = MigrationError::ExecutionFailed {
            filename: "20240101120000_create-users.apply.sql".to_string(),
            error: "relation already exists".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("20240101120000_create-users.apply.sql"));
        assert!(text.contains("rolled back"));
    }

    #[test]
    fn test_state_table_missing_display_mentions_setup() {
        assert!(MigrationError::StateTableMissing.to_string().contains("setup"));
    }

    #[test]
    fn test_consistency_display_reports_no_mutation() {
        let err = MigrationError::Consistency("bad suffix".to_string());
        assert!(err.to_string().contains("no database mutation"));
    }
}
