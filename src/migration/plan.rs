//! Plan resolution: which units an up or down invocation will execute.
//!
//! Pure functions over in-memory collections - no filesystem or database
//! access. The execution engine feeds them the catalog scan and the
//! applied-state snapshot and runs whatever comes back, so everything about
//! ordering and selection is decided (and testable) here.

use crate::migration::unit::{TimestampKey, UnitKind, UnitName};
use crate::migration::MigrationError;
use std::collections::HashSet;

/// Resolve the ordered set of units to apply.
///
/// Keeps apply-kind units not present in `applied`, and - when a boundary is
/// given - only units whose key is at or before it. The result is re-sorted
/// by filename ascending so it does not depend on directory scan order.
///
/// An empty result is a valid "nothing to do" outcome.
pub fn resolve_up(
    units: &[UnitName],
    applied: &[String],
    boundary: Option<&TimestampKey>,
) -> Vec<UnitName> {
    let applied: HashSet<&str> = applied.iter().map(String::as_str).collect();

    let mut plan: Vec<UnitName> = units
        .iter()
        .filter(|unit| unit.kind() == UnitKind::Apply)
        .filter(|unit| !applied.contains(unit.filename().as_str()))
        .filter(|unit| boundary.map_or(true, |b| unit.key() <= b))
        .cloned()
        .collect();

    plan.sort_by_key(UnitName::filename);
    plan
}

/// Resolve the ordered set of revert units to run.
///
/// Applied filenames are parsed back into unit form, sorted descending by
/// key, bounded from below when a boundary is given, and mapped to their
/// revert counterparts. Every resulting filename must carry the revert
/// suffix; a violation is a naming-convention corruption and fails loudly
/// rather than being filtered out.
///
/// # Errors
///
/// Returns `MigrationError::Consistency` if an applied record's filename
/// does not parse as an apply unit, or if a resolved filename fails the
/// revert-suffix self-check.
pub fn resolve_down(
    applied: &[String],
    boundary: Option<&TimestampKey>,
) -> Result<Vec<UnitName>, MigrationError> {
    let mut units = Vec::with_capacity(applied.len());
    for filename in applied {
        let unit = UnitName::parse_filename(filename).map_err(|_| {
            MigrationError::Consistency(format!(
                "applied record '{}' does not parse as a migration unit",
                filename
            ))
        })?;
        if unit.kind() != UnitKind::Apply {
            return Err(MigrationError::Consistency(format!(
                "applied record '{}' is not an apply-unit filename",
                filename
            )));
        }
        units.push(unit);
    }

    units.sort_by_key(UnitName::filename);
    units.reverse();

    let plan: Vec<UnitName> = units
        .into_iter()
        .filter(|unit| boundary.map_or(true, |b| unit.key() >= b))
        .map(|unit| unit.counterpart())
        .collect();

    // Self-check, not a filter: the mapping above must only ever produce
    // revert filenames.
    for unit in &plan {
        let filename = unit.filename();
        if !filename.ends_with(UnitKind::Revert.suffix()) {
            return Err(MigrationError::Consistency(format!(
                "resolved revert plan contains '{}', which does not end in '{}'",
                filename,
                UnitKind::Revert.suffix()
            )));
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(filename: &str) -> UnitName {
        UnitName::parse_filename(filename).unwrap()
    }

    fn key(s: &str) -> TimestampKey {
        TimestampKey::parse(s).unwrap()
    }

    fn filenames(plan: &[UnitName]) -> Vec<String> {
        plan.iter().map(UnitName::filename).collect()
    }

    #[test]
    fn test_resolve_up_skips_applied_and_respects_boundary() {
        // Catalog scan order is deliberately shuffled.
        let units = vec![
            unit("20240104000000_create-likes.apply.sql"),
            unit("20240101000000_create-users.apply.sql"),
            unit("20240103000000_create-comments.apply.sql"),
            unit("20240102000000_create-posts.apply.sql"),
        ];
        let applied = vec!["20240101000000_create-users.apply.sql".to_string()];
        let boundary = key("20240103000000");

        let plan = resolve_up(&units, &applied, Some(&boundary));

        assert_eq!(
            filenames(&plan),
            vec![
                "20240102000000_create-posts.apply.sql",
                "20240103000000_create-comments.apply.sql",
            ]
        );
    }

    #[test]
    fn test_resolve_up_never_returns_applied_units() {
        let units = vec![
            unit("20240101000000_create-users.apply.sql"),
            unit("20240102000000_create-posts.apply.sql"),
        ];
        let applied: Vec<String> = units.iter().map(UnitName::filename).collect();

        assert!(resolve_up(&units, &applied, None).is_empty());
    }

    #[test]
    fn test_resolve_up_no_boundary_takes_everything_pending() {
        let units = vec![
            unit("20240102000000_create-posts.apply.sql"),
            unit("20240101000000_create-users.apply.sql"),
        ];

        let plan = resolve_up(&units, &[], None);
        assert_eq!(
            filenames(&plan),
            vec![
                "20240101000000_create-users.apply.sql",
                "20240102000000_create-posts.apply.sql",
            ]
        );
    }

    #[test]
    fn test_resolve_up_empty_catalog() {
        assert!(resolve_up(&[], &[], None).is_empty());
    }

    #[test]
    fn test_resolve_up_boundary_is_inclusive() {
        let units = vec![unit("20240102000000_create-posts.apply.sql")];
        let plan = resolve_up(&units, &[], Some(&key("20240102000000")));
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_resolve_down_descending_with_boundary() {
        let applied = vec![
            "20240101000000_create-users.apply.sql".to_string(),
            "20240102000000_create-posts.apply.sql".to_string(),
            "20240103000000_create-comments.apply.sql".to_string(),
        ];

        let plan = resolve_down(&applied, Some(&key("20240103000000"))).unwrap();
        assert_eq!(
            filenames(&plan),
            vec!["20240103000000_create-comments.revert.sql"]
        );
    }

    #[test]
    fn test_resolve_down_no_boundary_reverts_everything_descending() {
        let applied = vec![
            "20240101000000_create-users.apply.sql".to_string(),
            "20240103000000_create-comments.apply.sql".to_string(),
            "20240102000000_create-posts.apply.sql".to_string(),
        ];

        let plan = resolve_down(&applied, None).unwrap();
        assert_eq!(
            filenames(&plan),
            vec![
                "20240103000000_create-comments.revert.sql",
                "20240102000000_create-posts.revert.sql",
                "20240101000000_create-users.revert.sql",
            ]
        );
    }

    #[test]
    fn test_resolve_down_maps_back_to_subset_of_applied() {
        let applied = vec![
            "20240101000000_create-users.apply.sql".to_string(),
            "20240102000000_create-posts.apply.sql".to_string(),
            "20240103000000_create-comments.apply.sql".to_string(),
        ];

        let plan = resolve_down(&applied, Some(&key("20240102000000"))).unwrap();
        let back: Vec<String> = plan
            .iter()
            .map(|u| u.counterpart().filename())
            .collect();

        for filename in &back {
            assert!(applied.contains(filename));
        }
        assert_eq!(
            back,
            vec![
                "20240103000000_create-comments.apply.sql",
                "20240102000000_create-posts.apply.sql",
            ]
        );
    }

    #[test]
    fn test_resolve_down_empty_applied() {
        assert!(resolve_down(&[], None).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_down_rejects_malformed_applied_record() {
        let applied = vec!["not-a-migration.sql".to_string()];
        match resolve_down(&applied, None) {
            Err(MigrationError::Consistency(msg)) => {
                assert!(msg.contains("not-a-migration.sql"));
            }
            other => panic!("expected Consistency error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_down_rejects_revert_record_in_applied_state() {
        // A revert filename in the bookkeeping table is corruption, not a
        // normal empty-result case.
        let applied = vec!["20240101000000_create-users.revert.sql".to_string()];
        match resolve_down(&applied, None) {
            Err(MigrationError::Consistency(_)) => {}
            other => panic!("expected Consistency error, got {:?}", other),
        }
    }
}
