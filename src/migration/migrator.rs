//! Migrator - Core migration execution engine

use crate::migration::catalog::Catalog;
use crate::migration::plan::{resolve_down, resolve_up};
use crate::migration::state_table::{
    initialize_state_table, list_applied, list_applied_records, record_applied, remove_applied,
    state_table_exists,
};
use crate::migration::unit::{TimestampKey, UnitKind, UnitName};
use crate::migration::{MigrationError, MigrationStatus};
use crate::{MayPostgresExecutor, TideExecutor};
use std::collections::HashSet;
use std::path::Path;

/// Core migration execution engine.
///
/// Orchestrates catalog discovery, applied-state reconciliation, plan
/// resolution, and per-unit transactional execution. One connection,
/// strictly sequential: units run one at a time, each inside its own
/// transaction together with its bookkeeping mutation.
///
/// There is no lock against concurrent invocations; two processes running
/// against the same database can race on "is this unit already applied".
pub struct Migrator {
    catalog: Catalog,
}

impl Migrator {
    /// Create a new Migrator over the given migrations directory.
    pub fn new(migrations_dir: impl AsRef<Path>) -> Self {
        Self {
            catalog: Catalog::new(migrations_dir),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Ensure the bookkeeping table exists. Idempotent; run before any plan
    /// is resolved so `list_applied` cannot fail against a fresh database.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` if the DDL execution fails.
    pub fn bootstrap(&self, executor: &dyn TideExecutor) -> Result<(), MigrationError> {
        initialize_state_table(executor)
    }

    /// Get migration status (applied vs pending).
    ///
    /// Ensures the bookkeeping table exists, then reconciles the catalog
    /// scan with the applied-state snapshot.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` if the catalog scan or state query fails.
    pub fn status(&self, executor: &dyn TideExecutor) -> Result<MigrationStatus, MigrationError> {
        self.bootstrap(executor)?;

        let units = self.catalog.list_units()?;
        let applied = list_applied_records(executor)?;

        let applied_names: HashSet<&str> =
            applied.iter().map(|record| record.filename.as_str()).collect();

        let pending: Vec<UnitName> = units
            .into_iter()
            .filter(|unit| !applied_names.contains(unit.filename().as_str()))
            .collect();

        Ok(MigrationStatus::new(applied, pending))
    }

    /// Apply pending units in ascending order, optionally bounded.
    ///
    /// Each unit's SQL body and its bookkeeping insert run inside one
    /// transaction. On failure that transaction rolls back, the error
    /// propagates, and the run halts - earlier units stay committed, and a
    /// rerun resumes where this one stopped because applied units are
    /// excluded from the next plan.
    ///
    /// Returns the number of units applied. An empty plan returns 0 without
    /// opening a transaction.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` on catalog, state, or execution failure.
    pub fn up(
        &self,
        executor: &MayPostgresExecutor,
        boundary: Option<&TimestampKey>,
    ) -> Result<usize, MigrationError> {
        self.bootstrap(executor)?;

        let units = self.catalog.list_units()?;
        let applied = list_applied(executor)?;
        let plan = resolve_up(&units, &applied, boundary);

        if plan.is_empty() {
            log::info!("no pending migrations to apply");
            return Ok(0);
        }

        for unit in &plan {
            log::info!("applying {}", unit.filename());
            self.apply_unit(executor, unit)?;
        }

        Ok(plan.len())
    }

    /// Revert applied units in descending order, optionally bounded.
    ///
    /// Reverting against a database that was never bootstrapped is a
    /// reportable error, not "nothing applied". Same per-unit transaction
    /// and halt-on-failure semantics as [`Migrator::up`].
    ///
    /// Returns the number of units reverted.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::StateTableMissing` on a fresh database, a
    /// `Consistency` error when the bookkeeping state and catalog have
    /// diverged, or any state/execution failure.
    pub fn down(
        &self,
        executor: &MayPostgresExecutor,
        boundary: Option<&TimestampKey>,
    ) -> Result<usize, MigrationError> {
        if !state_table_exists(executor)? {
            return Err(MigrationError::StateTableMissing);
        }

        let applied = list_applied(executor)?;
        let plan = resolve_down(&applied, boundary)?;

        if plan.is_empty() {
            log::info!("no applied migrations to revert");
            return Ok(0);
        }

        for unit in &plan {
            log::info!("reverting {}", unit.filename());
            self.revert_unit(executor, unit)?;
        }

        Ok(plan.len())
    }

    /// Apply one unit: run its body and insert the applied record inside a
    /// single transaction.
    pub fn apply_unit(
        &self,
        executor: &MayPostgresExecutor,
        unit: &UnitName,
    ) -> Result<(), MigrationError> {
        let filename = unit.filename();
        let body = self.catalog.read_body(unit)?;

        let tx = executor.begin()?;

        let result = tx
            .batch_execute(&body)
            .map_err(MigrationError::Database)
            .and_then(|()| record_applied(&tx, &filename));

        match result {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(e) => {
                // Roll back the schema change and the bookkeeping insert
                // together; the unit either fully happened or didn't.
                if let Err(rollback_err) = tx.rollback() {
                    log::warn!("rollback after failed {} also failed: {}", filename, rollback_err);
                }
                Err(MigrationError::ExecutionFailed {
                    filename,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Revert one unit: run its revert body and delete the applied record
    /// (keyed by the derived apply filename) inside a single transaction.
    pub fn revert_unit(
        &self,
        executor: &MayPostgresExecutor,
        unit: &UnitName,
    ) -> Result<(), MigrationError> {
        let filename = unit.filename();

        // Suffix self-check before touching the database.
        if unit.kind() != UnitKind::Revert || !filename.ends_with(UnitKind::Revert.suffix()) {
            return Err(MigrationError::Consistency(format!(
                "refusing to revert '{}': expected a filename ending in '{}'",
                filename,
                UnitKind::Revert.suffix()
            )));
        }

        // An applied record whose revert body is missing is divergence
        // between catalog and bookkeeping, not a skippable case.
        let body = self.catalog.read_body(unit).map_err(|e| match e {
            MigrationError::FileNotFound(name) => MigrationError::Consistency(format!(
                "revert file '{}' is missing for an applied migration",
                name
            )),
            other => other,
        })?;

        let apply_filename = unit.counterpart().filename();

        let tx = executor.begin()?;

        let result = tx
            .batch_execute(&body)
            .map_err(MigrationError::Database)
            .and_then(|()| remove_applied(&tx, &apply_filename));

        match result {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    log::warn!("rollback after failed {} also failed: {}", filename, rollback_err);
                }
                Err(MigrationError::ExecutionFailed {
                    filename,
                    error: e.to_string(),
                })
            }
        }
    }
}
