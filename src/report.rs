//! Human-readable load report.
//!
//! Appends one markdown section per load so a folder of imports keeps a
//! running record of which table each file landed in and what the inferred
//! schema was.

use std::{fs::OpenOptions, io::Write, path::Path};

use anyhow::{Context, Result};

use crate::profile::ColumnProfile;

pub fn append_profile(path: &Path, table: &str, columns: &[ColumnProfile]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Opening report file {path:?}"))?;
    writeln!(file, "\n## {table}\n")?;
    writeln!(file, "| column | type |")?;
    writeln!(file, "| --- | --- |")?;
    for column in columns {
        writeln!(file, "| {} | {} |", column.name, column.field_type)?;
    }
    Ok(())
}
