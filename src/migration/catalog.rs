//! Migration catalog: discovery and generation of unit files on disk.

use crate::migration::unit::{normalize_slug, TimestampKey, UnitKind, UnitName};
use crate::migration::MigrationError;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

/// Paths of a freshly generated unit pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    pub apply_path: PathBuf,
    pub revert_path: PathBuf,
}

/// The migration store: a directory of paired
/// `{timestamp}_{slug}.apply.sql` / `{timestamp}_{slug}.revert.sql` files.
#[derive(Debug, Clone)]
pub struct Catalog {
    dir: PathBuf,
}

impl Catalog {
    /// Create a catalog over the given migrations directory.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List apply-kind units in ascending filename order.
    ///
    /// Files that do not match the unit filename pattern are ignored. An
    /// empty directory yields an empty list - that is a valid "nothing to
    /// do" state, not an error.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Io` if the directory is missing or
    /// unreadable.
    pub fn list_units(&self) -> Result<Vec<UnitName>, MigrationError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            MigrationError::Io(format!(
                "Failed to read migrations directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut units = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| {
                MigrationError::Io(format!("Failed to read directory entry: {}", e))
            })?;

            let path = entry.path();
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            // Non-matching files (including revert halves) are not listed;
            // revert bodies are resolved by counterpart at revert time.
            let Ok(unit) = UnitName::parse_filename(filename) else {
                continue;
            };
            if unit.kind() == UnitKind::Apply {
                units.push(unit);
            }
        }

        // Directory scan order is platform-dependent; the contract is
        // ascending filename order.
        units.sort_by_key(UnitName::filename);

        Ok(units)
    }

    /// Read a unit's SQL body.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::FileNotFound` if the file is absent, or
    /// `MigrationError::Io` for any other read failure.
    pub fn read_body(&self, unit: &UnitName) -> Result<String, MigrationError> {
        let filename = unit.filename();
        let path = self.dir.join(&filename);

        fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MigrationError::FileNotFound(filename)
            } else {
                MigrationError::Io(format!("Failed to read {}: {}", path.display(), e))
            }
        })
    }

    /// Generate a new unit pair from a human-supplied name.
    ///
    /// The name is normalized to slug form, the key is taken from the
    /// current UTC instant at second resolution, and two placeholder files
    /// are written. The directory is created if missing.
    ///
    /// If the second write fails the first file is left behind; cleanup is
    /// manual. There is no transactional rollback of file creation.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidFormat` if the name normalizes to an
    /// empty slug, or `MigrationError::Io` if a write fails.
    pub fn generate(&self, raw_name: &str) -> Result<GeneratedUnit, MigrationError> {
        let slug = normalize_slug(raw_name);
        if slug.is_empty() {
            return Err(MigrationError::InvalidFormat(format!(
                "Migration name '{}' contains no usable characters",
                raw_name
            )));
        }

        let key = TimestampKey::from_datetime(Utc::now());
        let apply = UnitName::new(key.clone(), slug.clone(), UnitKind::Apply);
        let revert = apply.counterpart();

        fs::create_dir_all(&self.dir).map_err(|e| {
            MigrationError::Io(format!(
                "Failed to create migrations directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let apply_path = self.dir.join(apply.filename());
        let revert_path = self.dir.join(revert.filename());

        write_placeholder(&apply_path, &apply, "apply")?;
        write_placeholder(&revert_path, &revert, "revert")?;

        Ok(GeneratedUnit {
            apply_path,
            revert_path,
        })
    }
}

fn write_placeholder(path: &Path, unit: &UnitName, verb: &str) -> Result<(), MigrationError> {
    let body = format!(
        "-- {}\n-- Write the SQL to {} this migration.\n",
        unit.filename(),
        verb
    );
    fs::write(path, body)
        .map_err(|e| MigrationError::Io(format!("Failed to write {}: {}", path.display(), e)))
}
