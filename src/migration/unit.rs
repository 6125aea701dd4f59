//! Migration unit identity: timestamp keys, slugs, and filename parsing.
//!
//! A unit's identity lives entirely in its filename:
//! `{14-digit UTC timestamp}_{slug}.apply.sql` and the matching
//! `{timestamp}_{slug}.revert.sql`. Filenames are parsed once into a
//! structured [`UnitName`] and only re-derived at the filesystem/storage
//! boundary.

use crate::migration::MigrationError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Pattern: `{14 digits}_{lowercase-hyphenated slug}.apply.sql` or `.revert.sql`
static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{14})_([a-z0-9]+(?:-[a-z0-9]+)*)\.(apply|revert)\.sql$")
        .expect("filename pattern")
});

/// Fixed-width, zero-padded UTC timestamp key (`YYYYMMDDHHMMSS`).
///
/// The sole ordering and identity mechanism for units. String comparison is
/// chronologically correct because the width is fixed; the width is enforced
/// here, at parse time, so a drifted key fails loudly instead of silently
/// mis-ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampKey(String);

impl TimestampKey {
    /// Parse a key, enforcing the fixed-width 14-digit format.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidFormat` if `s` is not exactly 14
    /// ASCII digits.
    pub fn parse(s: &str) -> Result<Self, MigrationError> {
        if s.len() == 14 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(MigrationError::InvalidFormat(format!(
                "timestamp key '{}' must be exactly 14 digits (UTC YYYYMMDDHHMMSS)",
                s
            )))
        }
    }

    /// Derive a key from a UTC instant at second resolution.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y%m%d%H%M%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimestampKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which half of a unit a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Apply,
    Revert,
}

impl UnitKind {
    /// The filename suffix for this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            UnitKind::Apply => ".apply.sql",
            UnitKind::Revert => ".revert.sql",
        }
    }

    /// The opposite kind.
    pub fn counterpart(self) -> UnitKind {
        match self {
            UnitKind::Apply => UnitKind::Revert,
            UnitKind::Revert => UnitKind::Apply,
        }
    }
}

/// Parsed identity of one migration file: timestamp key + slug + kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitName {
    key: TimestampKey,
    slug: String,
    kind: UnitKind,
}

impl UnitName {
    pub fn new(key: TimestampKey, slug: String, kind: UnitKind) -> Self {
        Self { key, slug, kind }
    }

    /// Parse a migration filename into its structured form.
    ///
    /// # Example
    /// - `20240120120000_create-users.apply.sql` → key `20240120120000`,
    ///   slug `create-users`, kind `Apply`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidFormat` if the filename does not match
    /// the expected pattern.
    pub fn parse_filename(filename: &str) -> Result<Self, MigrationError> {
        let caps = FILENAME_RE.captures(filename).ok_or_else(|| {
            MigrationError::InvalidFormat(format!(
                "Migration file name '{}' does not match expected pattern: \
                 {{YYYYMMDDHHMMSS}}_{{slug}}.apply.sql or {{YYYYMMDDHHMMSS}}_{{slug}}.revert.sql",
                filename
            ))
        })?;

        let key = TimestampKey::parse(caps.get(1).expect("key group").as_str())?;
        let slug = caps.get(2).expect("slug group").as_str().to_string();
        let kind = match caps.get(3).expect("kind group").as_str() {
            "apply" => UnitKind::Apply,
            _ => UnitKind::Revert,
        };

        Ok(Self { key, slug, kind })
    }

    /// Re-derive the filename string form.
    pub fn filename(&self) -> String {
        format!("{}_{}{}", self.key, self.slug, self.kind.suffix())
    }

    pub fn key(&self) -> &TimestampKey {
        &self.key
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// The other half of this unit (apply ↔ revert), same key and slug.
    pub fn counterpart(&self) -> UnitName {
        Self {
            key: self.key.clone(),
            slug: self.slug.clone(),
            kind: self.kind.counterpart(),
        }
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename())
    }
}

/// Normalize a human-supplied migration name into slug form.
///
/// Spaces, underscores, and any other non-alphanumeric characters become
/// hyphens, a hyphen is inserted at camelCase boundaries, and the result is
/// lowercased. Runs of separators collapse to a single hyphen.
pub fn normalize_slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev: Option<char> = None;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() {
                let boundary = matches!(prev, Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit());
                if boundary && !out.ends_with('-') && !out.is_empty() {
                    out.push('-');
                }
            }
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
        prev = Some(ch);
    }

    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_apply_filename() {
        let unit = UnitName::parse_filename("20240120120000_create-users.apply.sql").unwrap();
        assert_eq!(unit.key().as_str(), "20240120120000");
        assert_eq!(unit.slug(), "create-users");
        assert_eq!(unit.kind(), UnitKind::Apply);
    }

    #[test]
    fn test_parse_revert_filename() {
        let unit = UnitName::parse_filename("20240120120000_create-users.revert.sql").unwrap();
        assert_eq!(unit.kind(), UnitKind::Revert);
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        let bad = [
            "20240120120000_create-users.sql",       // no kind segment
            "2024012012000_create-users.apply.sql",  // 13-digit key
            "202401201200000_create-users.apply.sql", // 15-digit key
            "20240120120000_Create-Users.apply.sql", // uppercase slug
            "20240120120000_create_users.apply.sql", // underscore slug
            "20240120120000-create-users.apply.sql", // wrong separator
            "create-users.apply.sql",                // no key
            "20240120120000_.apply.sql",             // empty slug
        ];
        for filename in bad {
            assert!(
                UnitName::parse_filename(filename).is_err(),
                "Should reject: {}",
                filename
            );
        }
    }

    #[test]
    fn test_filename_round_trip() {
        for filename in [
            "20240120120000_create-users.apply.sql",
            "20991231235959_drop-legacy-2.revert.sql",
        ] {
            let unit = UnitName::parse_filename(filename).unwrap();
            assert_eq!(unit.filename(), filename);
        }
    }

    #[test]
    fn test_counterpart_flips_kind_only() {
        let apply = UnitName::parse_filename("20240120120000_create-users.apply.sql").unwrap();
        let revert = apply.counterpart();
        assert_eq!(revert.filename(), "20240120120000_create-users.revert.sql");
        assert_eq!(revert.counterpart(), apply);
    }

    #[test]
    fn test_key_rejects_drifted_formats() {
        assert!(TimestampKey::parse("20240120120000").is_ok());
        assert!(TimestampKey::parse("202401201200").is_err()); // minute resolution
        assert!(TimestampKey::parse("2024-01-20T12:00").is_err());
        assert!(TimestampKey::parse("").is_err());
    }

    #[test]
    fn test_key_string_order_matches_chronological_order() {
        // Instants chosen across second/minute/day/month/year carries.
        let instants = [
            Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 11, 5, 9, 30, 0).unwrap(),
        ];
        let keys: Vec<TimestampKey> = instants
            .iter()
            .map(|at| TimestampKey::from_datetime(*at))
            .collect();

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, keys, "string order must equal chronological order");
    }

    #[test]
    fn test_from_datetime_is_fixed_width() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(TimestampKey::from_datetime(at).as_str(), "20240102030405");
    }

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug("create users"), "create-users");
        assert_eq!(normalize_slug("create_users_table"), "create-users-table");
        assert_eq!(normalize_slug("createUsersTable"), "create-users-table");
        assert_eq!(normalize_slug("Create Users"), "create-users");
        assert_eq!(normalize_slug("add  2fa"), "add-2fa");
        assert_eq!(normalize_slug("drop!legacy?views"), "drop-legacy-views");
        assert_eq!(normalize_slug("trailing_"), "trailing");
        assert_eq!(normalize_slug("___"), "");
    }
}
