//! Bookkeeping table management: the durable record of applied units.

use crate::migration::MigrationError;
use crate::TideExecutor;
use chrono::{DateTime, Utc};
use sea_query::{ColumnDef, Keyword, PostgresQueryBuilder, Table, TableCreateStatement};

/// Name of the bookkeeping table. Part of the external interface; existing
/// databases depend on it.
pub const STATE_TABLE: &str = "migrations";

/// A row in the bookkeeping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRecord {
    /// Surrogate key
    pub id: i32,

    /// The apply-unit's filename
    pub filename: String,

    /// When the unit was applied (defaults to insertion time)
    pub applied_at: DateTime<Utc>,
}

impl AppliedRecord {
    /// Create an `AppliedRecord` from a database row.
    ///
    /// Expected column order: `id`, `filename`, `applied_at`.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` if the timestamp cannot be parsed.
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, MigrationError> {
        let id: i32 = row.get(0);
        let filename: String = row.get(1);

        // PostgreSQL TIMESTAMP comes back as a string from may_postgres.
        let applied_at_str: String = row.get(2);
        let applied_at = parse_timestamp(&applied_at_str)?;

        Ok(Self {
            id,
            filename,
            applied_at,
        })
    }
}

/// Parse a timestamp string as returned by may_postgres.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, MigrationError> {
    let formats = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];
    for format in formats {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(MigrationError::Database(crate::TideError::ParseError(
        format!("Failed to parse timestamp '{}': unrecognized format", s),
    )))
}

/// Build the bookkeeping table DDL.
///
/// `id` surrogate key, `filename` of the apply unit, `applied_at` defaulting
/// to the time of insertion. No uniqueness constraint on `filename`: never
/// re-selecting an applied unit is the Plan Resolver's invariant, not the
/// storage layer's.
pub fn create_state_table() -> TableCreateStatement {
    Table::create()
        .table(STATE_TABLE)
        .if_not_exists()
        .col(
            ColumnDef::new("id")
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new("filename").text().not_null())
        .col(
            ColumnDef::new("applied_at")
                .timestamp()
                .not_null()
                .default(Keyword::CurrentTimestamp),
        )
        .to_owned()
}

/// Check catalog metadata for the bookkeeping table's presence. Never mutates.
///
/// # Errors
///
/// Returns `MigrationError` if the metadata query fails.
pub fn state_table_exists(executor: &dyn TideExecutor) -> Result<bool, MigrationError> {
    let sql = format!(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = '{}'
        )
    "#,
        STATE_TABLE
    );

    let row = executor.query_one(&sql, &[])?;
    Ok(row.get(0))
}

/// Create the bookkeeping table if absent; no-op otherwise.
///
/// Idempotent - safe to call on every startup.
///
/// # Errors
///
/// Returns `MigrationError` if the DDL execution fails.
pub fn initialize_state_table(executor: &dyn TideExecutor) -> Result<(), MigrationError> {
    let sql = create_state_table().build(PostgresQueryBuilder);
    executor.execute(&sql, &[])?;
    Ok(())
}

/// List applied filenames ordered by filename ascending (equivalent to
/// timestamp-ascending, given the fixed-width key).
///
/// # Errors
///
/// Returns `MigrationError` if the query fails - including when the
/// bookkeeping table does not exist; callers gate on
/// [`state_table_exists`] where that matters.
pub fn list_applied(executor: &dyn TideExecutor) -> Result<Vec<String>, MigrationError> {
    let sql = format!(
        "SELECT filename FROM {} ORDER BY filename ASC",
        STATE_TABLE
    );

    let rows = executor.query_all(&sql, &[])?;
    Ok(rows.iter().map(|row| row.get(0)).collect())
}

/// List full applied records ordered by filename ascending.
///
/// # Errors
///
/// Returns `MigrationError` if the query fails or a row cannot be parsed.
pub fn list_applied_records(
    executor: &dyn TideExecutor,
) -> Result<Vec<AppliedRecord>, MigrationError> {
    let sql = format!(
        "SELECT id, filename, applied_at FROM {} ORDER BY filename ASC",
        STATE_TABLE
    );

    let rows = executor.query_all(&sql, &[])?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        records.push(AppliedRecord::from_row(row)?);
    }

    Ok(records)
}

/// Insert an applied record. Only ever invoked inside the execution engine's
/// per-unit transaction.
///
/// # Errors
///
/// Returns `MigrationError` if the insert fails.
pub fn record_applied(executor: &dyn TideExecutor, filename: &str) -> Result<(), MigrationError> {
    let sql = format!("INSERT INTO {} (filename) VALUES ($1)", STATE_TABLE);
    executor.execute(&sql, &[&filename])?;
    Ok(())
}

/// Delete an applied record by filename. Only ever invoked inside the
/// execution engine's per-unit transaction.
///
/// # Errors
///
/// Returns `MigrationError` if the delete fails.
pub fn remove_applied(executor: &dyn TideExecutor, filename: &str) -> Result<(), MigrationError> {
    let sql = format!("DELETE FROM {} WHERE filename = $1", STATE_TABLE);
    executor.execute(&sql, &[&filename])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_state_table_ddl() {
        let sql = create_state_table().build(PostgresQueryBuilder);
        assert!(sql.contains("IF NOT EXISTS"));
        assert!(sql.contains("migrations"));
        assert!(sql.contains("filename"));
        assert!(sql.contains("applied_at"));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        for s in [
            "2024-01-20 12:00:00.123456",
            "2024-01-20 12:00:00",
            "2024-01-20T12:00:00.123456",
            "2024-01-20T12:00:00",
        ] {
            let parsed = parse_timestamp(s).unwrap();
            assert_eq!(parsed.date_naive().to_string(), "2024-01-20");
        }
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("20240120120000").is_err());
        assert!(parse_timestamp("not a timestamp").is_err());
    }
}
