//! Field type model, value classification, and the type lattice.
//!
//! This module owns [`FieldType`] (the five loadable column types),
//! [`TypePolicy`] (the knobs that vary between predecessor behaviors), the
//! [`classify()`] function that maps one raw field value to a type, and the
//! lattice operations [`join()`] / [`promote()`] that merge per-row
//! classifications into a single column type.
//!
//! The lattice is flat with two levels: `{Integer, Date, DateTime,
//! ShortString} < Text`. Absence of evidence (blank or null values) is
//! `Option::None` and acts as the identity element, so folding order never
//! affects the result.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    Date,
    DateTime,
    ShortString,
    Text,
}

impl FieldType {
    /// All legal hint types, in display form.
    pub const NAMES: &[&str] = &["integer", "date", "datetime", "string", "text"];
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Integer => "integer",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::ShortString => "string",
            FieldType::Text => "text",
        };
        write!(f, "{name}")
    }
}

impl FromStr for FieldType {
    type Err = anyhow::Error;

    fn from_str(token: &str) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(FieldType::Integer),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::DateTime),
            "string" | "short_string" | "varchar" => Ok(FieldType::ShortString),
            "text" => Ok(FieldType::Text),
            other => Err(anyhow!(
                "unknown field type '{other}', expected one of {}",
                FieldType::NAMES.join(", ")
            )),
        }
    }
}

/// Classification knobs that differ between predecessor behaviors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePolicy {
    /// Strings at or under this many characters classify as `ShortString`;
    /// `None` classifies every non-blank string as `Text`.
    pub short_string_limit: Option<usize>,
    /// When set, date-only tokens infer as `Date`; otherwise they fold into
    /// `DateTime`. `Date` remains a legal hint type either way.
    pub infer_dates: bool,
}

impl Default for TypePolicy {
    fn default() -> Self {
        Self {
            short_string_limit: Some(255),
            infer_dates: false,
        }
    }
}

impl TypePolicy {
    /// Whether `field_type` can be produced by inference under this policy.
    pub fn inferable(&self, field_type: FieldType) -> bool {
        match field_type {
            FieldType::Date => self.infer_dates,
            _ => true,
        }
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Maps one raw field value to a type, or `None` for blank values.
pub fn classify(raw: &str, policy: &TypePolicy) -> Option<FieldType> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.parse::<i64>().is_ok() {
        return Some(FieldType::Integer);
    }
    if parse_naive_date(trimmed).is_ok() {
        // Date-only tokens fold into DateTime unless dates are first-class.
        return Some(if policy.infer_dates {
            FieldType::Date
        } else {
            FieldType::DateTime
        });
    }
    if parse_naive_datetime(trimmed).is_ok() {
        return Some(FieldType::DateTime);
    }
    match policy.short_string_limit {
        Some(limit) if raw.chars().count() <= limit => Some(FieldType::ShortString),
        Some(_) => Some(FieldType::Text),
        None => Some(FieldType::Text),
    }
}

/// Lattice join of two classifications. `None` is the identity; equal types
/// keep their type; `Text` absorbs everything else; any other mix degrades
/// to `ShortString` (conflicting values keep their string representation).
pub fn join(left: Option<FieldType>, right: Option<FieldType>) -> Option<FieldType> {
    match (left, right) {
        (None, other) | (other, None) => other,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(FieldType::Text), Some(_)) | (Some(_), Some(FieldType::Text)) => {
            Some(FieldType::Text)
        }
        _ => Some(FieldType::ShortString),
    }
}

/// Folds a sequence of classifications into one, rejecting types the policy
/// cannot have inferred.
pub fn promote<I>(types: I, policy: &TypePolicy) -> Result<Option<FieldType>>
where
    I: IntoIterator<Item = Option<FieldType>>,
{
    let mut merged = None;
    for entry in types {
        if let Some(field_type) = entry {
            if !policy.inferable(field_type) {
                return Err(LoadError::UnrecognizedType(field_type).into());
            }
        }
        merged = join(merged, entry);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TypePolicy {
        TypePolicy::default()
    }

    #[test]
    fn classify_detects_integers_and_blanks() {
        assert_eq!(classify("42", &policy()), Some(FieldType::Integer));
        assert_eq!(classify("-7", &policy()), Some(FieldType::Integer));
        assert_eq!(classify("", &policy()), None);
        assert_eq!(classify("   ", &policy()), None);
    }

    #[test]
    fn classify_folds_dates_into_datetime_by_default() {
        assert_eq!(
            classify("2024-05-06 14:30:00", &policy()),
            Some(FieldType::DateTime)
        );
        assert_eq!(classify("2024-05-06", &policy()), Some(FieldType::DateTime));

        let dated = TypePolicy {
            infer_dates: true,
            ..policy()
        };
        assert_eq!(classify("2024-05-06", &dated), Some(FieldType::Date));
        assert_eq!(
            classify("2024-05-06 14:30:00", &dated),
            Some(FieldType::DateTime)
        );
    }

    #[test]
    fn classify_splits_strings_on_the_length_limit() {
        let short = "a".repeat(255);
        let long = "a".repeat(256);
        assert_eq!(classify(&short, &policy()), Some(FieldType::ShortString));
        assert_eq!(classify(&long, &policy()), Some(FieldType::Text));

        let text_only = TypePolicy {
            short_string_limit: None,
            ..policy()
        };
        assert_eq!(classify("abc", &text_only), Some(FieldType::Text));
    }

    #[test]
    fn join_treats_none_as_identity() {
        assert_eq!(join(None, None), None);
        assert_eq!(join(None, Some(FieldType::Integer)), Some(FieldType::Integer));
        assert_eq!(join(Some(FieldType::Text), None), Some(FieldType::Text));
    }

    #[test]
    fn join_widens_conflicts() {
        assert_eq!(
            join(Some(FieldType::Integer), Some(FieldType::Text)),
            Some(FieldType::Text)
        );
        assert_eq!(
            join(Some(FieldType::Integer), Some(FieldType::DateTime)),
            Some(FieldType::ShortString)
        );
        assert_eq!(
            join(Some(FieldType::ShortString), Some(FieldType::ShortString)),
            Some(FieldType::ShortString)
        );
    }

    #[test]
    fn promote_rejects_uninferable_types() {
        let err = promote([Some(FieldType::Date)], &policy()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::UnrecognizedType(FieldType::Date))
        ));

        let dated = TypePolicy {
            infer_dates: true,
            ..policy()
        };
        assert_eq!(
            promote([Some(FieldType::Date)], &dated).unwrap(),
            Some(FieldType::Date)
        );
    }

    #[test]
    fn field_type_round_trips_through_names() {
        for name in FieldType::NAMES {
            let parsed: FieldType = name.parse().unwrap();
            assert_eq!(parsed.to_string(), *name);
        }
        assert!("decimal".parse::<FieldType>().is_err());
    }
}
