//! Column profiling: sampling, hint resolution, and diagnostics.
//!
//! [`sample_rows()`] reads up to `sample_size` valid rows from a
//! [`RowSource`], classifies every field, and folds classifications through
//! the type lattice, keeping the first successfully read row as the column
//! order basis. [`apply_hints()`] then overlays caller-supplied type
//! overrides and resolves still-undetermined columns to `string`, emitting
//! [`Diagnostic`]s along the way.

use std::{collections::HashMap, fmt, path::Path, str::FromStr};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::LoadError,
    rows::{LineTerminator, Row, RowError, RowSource},
    schema::{FieldType, TypePolicy, classify, join},
};

/// One entry of a resolved column profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Caller-supplied type override, valid by construction: parsing is the
/// fatal gate for bad type names, so a `Hint` value can always be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub column: String,
    pub field_type: FieldType,
}

impl Hint {
    /// Parses a `column=type` argument. The column name is normalized the
    /// same way header names are.
    pub fn parse(spec: &str) -> Result<Self> {
        let (column, type_name) = spec.split_once('=').ok_or_else(|| LoadError::InvalidHintSpec {
            spec: spec.to_string(),
        })?;
        let column = crate::rows::normalize_header(column);
        if column.is_empty() {
            return Err(LoadError::InvalidHintSpec {
                spec: spec.to_string(),
            }
            .into());
        }
        let field_type = FieldType::from_str(type_name).map_err(|_| LoadError::InvalidHintType {
            column: column.clone(),
            value: type_name.trim().to_string(),
        })?;
        Ok(Self { column, field_type })
    }
}

/// Non-fatal findings from profiling and hint resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A hint named a column that is not in the profile.
    UnknownHintColumn { column: String },
    /// Every sampled value was blank; the column defaulted to `string`.
    UndeterminedType { column: String },
    /// A hint supplied a type for a column inference could not determine.
    HintFilledUnknown { column: String, hinted: FieldType },
    /// A hint disagreed with (and overrode) the inferred type.
    HintOverride {
        column: String,
        inferred: FieldType,
        hinted: FieldType,
    },
}

impl Diagnostic {
    /// Warnings flag conditions worth operator attention; the rest are
    /// informational notices.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Diagnostic::UnknownHintColumn { .. } | Diagnostic::UndeterminedType { .. }
        )
    }

    pub fn report(&self) {
        if self.is_warning() {
            warn!("{self}");
        } else {
            info!("{self}");
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownHintColumn { column } => {
                write!(f, "hint for unknown column '{column}' ignored")
            }
            Diagnostic::UndeterminedType { column } => write!(
                f,
                "type could not be determined for '{column}', defaulting to string"
            ),
            Diagnostic::HintFilledUnknown { column, hinted } => {
                write!(f, "hint set undetermined column '{column}' to {hinted}")
            }
            Diagnostic::HintOverride {
                column,
                inferred,
                hinted,
            } => write!(
                f,
                "hint overrides inferred type for '{column}': {inferred} -> {hinted}"
            ),
        }
    }
}

/// A profiled column before hint resolution; `None` means no sampled value
/// produced a concrete classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledColumn {
    pub name: String,
    pub inferred: Option<FieldType>,
}

/// Fully resolved profiling result for one file.
#[derive(Debug, Clone)]
pub struct FileProfile {
    pub columns: Vec<ColumnProfile>,
    pub diagnostics: Vec<Diagnostic>,
    pub line_terminator: LineTerminator,
}

/// Samples up to `sample_size` valid rows (`0` scans the whole file) and
/// returns per-column inferences in first-row order.
///
/// Malformed rows are skipped without counting toward `sample_size`; the
/// row source guarantees forward progress past them. Any other row error is
/// fatal.
pub fn sample_rows(
    source: &mut RowSource,
    sample_size: usize,
    policy: &TypePolicy,
) -> Result<Vec<SampledColumn>> {
    let mut first_row: Option<Row> = None;
    let mut types: HashMap<String, Option<FieldType>> = HashMap::new();
    let mut valid_rows = 0usize;

    while sample_size == 0 || valid_rows < sample_size {
        let row = match source.next_row() {
            None => break,
            Some(Err(RowError::Malformed { row, source })) => {
                debug!("Skipping malformed row {row}: {source}");
                continue;
            }
            Some(Err(RowError::Unreadable { row })) => {
                return Err(LoadError::UnrecognizedValue {
                    path: source.path().to_path_buf(),
                    row,
                }
                .into());
            }
            Some(Err(RowError::Read(err))) => {
                return Err(err).with_context(|| format!("Reading rows from {:?}", source.path()));
            }
            Some(Ok(row)) => row,
        };

        for (name, value) in row.iter() {
            let classified = classify(value, policy);
            let entry = types.entry(name.to_string()).or_insert(None);
            *entry = join(*entry, classified);
        }
        if first_row.is_none() {
            first_row = Some(row);
        }
        valid_rows += 1;
    }

    let first_row = first_row.ok_or_else(|| LoadError::EmptySource {
        path: source.path().to_path_buf(),
    })?;

    Ok(first_row
        .columns()
        .map(|name| SampledColumn {
            name: name.to_string(),
            inferred: types.get(name).copied().flatten(),
        })
        .collect())
}

/// Overlays hints on sampled columns and finalizes every column to a
/// concrete type. Order is preserved; only types change.
pub fn apply_hints(
    sampled: Vec<SampledColumn>,
    hints: &[Hint],
) -> (Vec<ColumnProfile>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    for hint in hints {
        if !sampled.iter().any(|column| column.name == hint.column) {
            diagnostics.push(Diagnostic::UnknownHintColumn {
                column: hint.column.clone(),
            });
        }
    }

    let columns = sampled
        .into_iter()
        .map(|column| {
            let hint = hints.iter().find(|hint| hint.column == column.name);
            let field_type = match (column.inferred, hint) {
                (None, Some(hint)) => {
                    diagnostics.push(Diagnostic::HintFilledUnknown {
                        column: column.name.clone(),
                        hinted: hint.field_type,
                    });
                    hint.field_type
                }
                (Some(inferred), Some(hint)) => {
                    if inferred != hint.field_type {
                        diagnostics.push(Diagnostic::HintOverride {
                            column: column.name.clone(),
                            inferred,
                            hinted: hint.field_type,
                        });
                    }
                    hint.field_type
                }
                (Some(inferred), None) => inferred,
                (None, None) => {
                    diagnostics.push(Diagnostic::UndeterminedType {
                        column: column.name.clone(),
                    });
                    FieldType::ShortString
                }
            };
            ColumnProfile {
                name: column.name,
                field_type,
            }
        })
        .collect();

    (columns, diagnostics)
}

/// Profiles one file end to end: open, sample, resolve hints.
pub fn profile_file(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    sample_size: usize,
    hints: &[Hint],
    policy: &TypePolicy,
) -> Result<FileProfile> {
    let mut source = RowSource::open(path, delimiter, encoding)?;
    let sampled = sample_rows(&mut source, sample_size, policy)?;
    let (columns, diagnostics) = apply_hints(sampled, hints);
    Ok(FileProfile {
        columns,
        diagnostics,
        line_terminator: source.line_terminator(),
    })
}
