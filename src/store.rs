//! Store collaborator seam and the MySQL script renderer.
//!
//! The loader talks to the relational store through the [`Store`] trait:
//! connection scoping, destructive table creation, native bulk import, and
//! ad-hoc SQL for normalization. [`ScriptStore`] is the shipped
//! implementation; it renders each operation as MySQL statements into a
//! writer so the resulting script can be run by any client. Tests drive the
//! same seam with spy stores.

use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;

use crate::{profile::ColumnProfile, rows::LineTerminator, schema::FieldType};

/// One bulk-import request: the store ingests the original file in a single
/// operation, skipping the header lines the profiler already consumed.
#[derive(Debug, Clone)]
pub struct BulkImport<'a> {
    pub file: &'a Path,
    pub table: &'a str,
    pub field_separator: u8,
    pub line_terminator: LineTerminator,
    pub skip_header_lines: usize,
    /// Client-side-readable-file transport, for stores that cannot read the
    /// file from the server process.
    pub local: bool,
}

pub trait Store {
    /// Makes `name` the active connection and returns the previously active
    /// one so the caller can restore it on every exit path.
    fn activate_connection(&mut self, name: &str) -> Result<Option<String>>;

    /// Restores the connection that was active before [`Self::activate_connection`].
    fn restore_connection(&mut self, prior: Option<String>) -> Result<()>;

    /// Destructive create-or-replace of `table` from the column profile.
    fn create_table(&mut self, table: &str, columns: &[ColumnProfile]) -> Result<()>;

    /// Imports the whole file as one store-native operation.
    fn bulk_import(&mut self, request: &BulkImport<'_>) -> Result<()>;

    /// Executes one literal SQL statement.
    fn execute(&mut self, sql: &str) -> Result<()>;
}

/// Escapes a value for embedding in a single-quoted MySQL string literal.
fn escape_sql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}

/// MySQL column type for a profiled field type.
pub fn column_ddl(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Integer => "INT",
        FieldType::Date => "DATE",
        FieldType::DateTime => "DATETIME",
        FieldType::ShortString => "VARCHAR(255)",
        FieldType::Text => "TEXT",
    }
}

/// Renders every store operation as MySQL statements into `out`.
pub struct ScriptStore<W: Write> {
    out: W,
    active: Option<String>,
}

impl<W: Write> ScriptStore<W> {
    pub fn new(out: W) -> Self {
        Self { out, active: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Store for ScriptStore<W> {
    fn activate_connection(&mut self, name: &str) -> Result<Option<String>> {
        writeln!(self.out, "-- connection: {name}").context("Writing connection header")?;
        Ok(self.active.replace(name.to_string()))
    }

    fn restore_connection(&mut self, prior: Option<String>) -> Result<()> {
        if let Some(name) = &prior {
            writeln!(self.out, "-- connection restored: {name}")
                .context("Writing connection footer")?;
        }
        self.active = prior;
        Ok(())
    }

    fn create_table(&mut self, table: &str, columns: &[ColumnProfile]) -> Result<()> {
        let column_list = columns
            .iter()
            .map(|column| format!("  `{}` {}", column.name, column_ddl(column.field_type)))
            .join(",\n");
        writeln!(self.out, "DROP TABLE IF EXISTS `{table}`;")
            .and_then(|_| writeln!(self.out, "CREATE TABLE `{table}` (\n{column_list}\n);"))
            .with_context(|| format!("Writing DDL for table '{table}'"))
    }

    fn bulk_import(&mut self, request: &BulkImport<'_>) -> Result<()> {
        let local = if request.local { " LOCAL" } else { "" };
        let file = escape_sql(&request.file.to_string_lossy());
        writeln!(
            self.out,
            "LOAD DATA{local} INFILE '{file}' INTO TABLE `{table}`\n  \
             FIELDS TERMINATED BY '{separator}' ENCLOSED BY '\"'\n  \
             LINES TERMINATED BY '{terminator}'\n  \
             IGNORE {skip} LINES;",
            table = request.table,
            separator = escape_sql(&(request.field_separator as char).to_string()),
            terminator = request.line_terminator.as_sql_literal(),
            skip = request.skip_header_lines,
        )
        .with_context(|| format!("Writing bulk import for table '{}'", request.table))
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        writeln!(self.out, "{sql};").context("Writing SQL statement")
    }
}
