use std::path::PathBuf;

use thiserror::Error;

use crate::schema::FieldType;

/// Fatal conditions raised by profiling and loading. Transient row-level
/// errors live in [`crate::rows::RowError`] and are handled by the sampler.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source yielded no rows, so no column order can be established.
    #[error("no rows could be read from {path:?}")]
    EmptySource { path: PathBuf },

    /// A hint argument was not of the form `column=type`.
    #[error("invalid hint '{spec}', expected column=type")]
    InvalidHintSpec { spec: String },

    /// A hint named a type outside the legal type set.
    #[error("invalid hint type '{value}' for column '{column}'")]
    InvalidHintType { column: String, value: String },

    /// A type outside the inferable set reached the lattice. Unreachable
    /// through `classify`; guards hand-constructed inputs.
    #[error("type '{0}' is outside the inferable type set")]
    UnrecognizedType(FieldType),

    /// A field value could not be decoded as text under the input encoding.
    #[error("unreadable value in row {row} of {path:?}")]
    UnrecognizedValue { path: PathBuf, row: u64 },
}
