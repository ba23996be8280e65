//! Load pipeline orchestration.
//!
//! [`Loader`] resolves the input file and target table name, profiles the
//! file, then drives the store through the fixed pipeline: activate
//! connection → create table → bulk import → optional post-load
//! normalization. The connection active before the load is restored on
//! every exit path; any other failure aborts the pipeline as-is.
//!
//! The create-table step fully replaces the target table. Callers must
//! serialize loads against the same table name.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use encoding_rs::Encoding;
use heck::ToSnakeCase;
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    profile::{ColumnProfile, Diagnostic, FileProfile, Hint, profile_file},
    report,
    schema::{FieldType, TypePolicy},
    store::{BulkImport, Store},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Base path for relative input files.
    pub folder: PathBuf,
    /// Prefix joined to derived and explicit table names with `_`. Empty
    /// disables prefixing; the default guards against clobbering real
    /// tables, since the target table is replaced.
    pub table_prefix: String,
    /// Extension appended when the input name has none.
    pub default_extension: String,
    /// Rows to sample during profiling; `0` scans the whole file.
    pub sample_size: usize,
    /// Connection identifier activated for the duration of the load.
    pub connection: String,
    /// Use the client-side-readable-file bulk transport.
    pub bulk_local_mode: bool,
    pub field_separator: char,
    /// Run the post-load normalization stage (zero-date nullification and
    /// short-string trimming).
    pub normalize_after_load: bool,
    pub short_string_limit: Option<usize>,
    pub infer_dates: bool,
    /// Append a human-readable load report here after profiling.
    pub report: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            table_prefix: "load".to_string(),
            default_extension: "csv".to_string(),
            sample_size: 10,
            connection: "default".to_string(),
            bulk_local_mode: false,
            field_separator: ',',
            normalize_after_load: true,
            short_string_limit: Some(255),
            infer_dates: false,
            report: None,
        }
    }
}

impl LoaderConfig {
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Reading config file {path:?}"))?;
        serde_yaml::from_str(&raw).with_context(|| format!("Parsing config file {path:?}"))
    }

    pub fn type_policy(&self) -> TypePolicy {
        TypePolicy {
            short_string_limit: self.short_string_limit,
            infer_dates: self.infer_dates,
        }
    }

    /// The configured field separator as a byte. Config files can carry any
    /// character, so this is where non-ASCII separators get rejected.
    pub fn delimiter(&self) -> Result<u8> {
        ensure!(
            self.field_separator.is_ascii(),
            "Field separator '{}' must be a single ASCII character",
            self.field_separator
        );
        Ok(self.field_separator as u8)
    }
}

/// What a completed load hands back to the caller.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub table: String,
    pub columns: Vec<ColumnProfile>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Loader {
    config: LoaderConfig,
}

impl Loader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Resolves `filename` against the configured folder, appending the
    /// default extension when none is given.
    pub fn resolve_file(&self, filename: &str) -> PathBuf {
        let mut name = filename.to_string();
        if Path::new(filename).extension().is_none() && !self.config.default_extension.is_empty() {
            name = format!("{name}.{}", self.config.default_extension);
        }
        self.config.folder.join(name)
    }

    /// Resolves the target table: explicit name or derived from the file
    /// name, with the configured prefix applied to either.
    pub fn resolve_table(&self, filename: &str, explicit: Option<&str>) -> String {
        let table = match explicit {
            Some(name) => name.to_string(),
            None => derive_table_name(filename),
        };
        if self.config.table_prefix.is_empty() {
            table
        } else {
            format!("{}_{}", self.config.table_prefix, table)
        }
    }

    /// Profiles `filename` and loads it into the store. Returns the
    /// resolved table identifier together with the profile and any
    /// non-fatal diagnostics.
    pub fn load<S: Store>(
        &self,
        store: &mut S,
        filename: &str,
        table: Option<&str>,
        hints: &[Hint],
        encoding: &'static Encoding,
    ) -> Result<LoadOutcome> {
        let file = self.resolve_file(filename);
        let table = self.resolve_table(filename, table);
        let policy = self.config.type_policy();
        let delimiter = self.config.delimiter()?;

        let profile = profile_file(
            &file,
            delimiter,
            encoding,
            self.config.sample_size,
            hints,
            &policy,
        )
        .with_context(|| format!("Profiling {file:?}"))?;
        for diagnostic in &profile.diagnostics {
            diagnostic.report();
        }
        if let Some(report_path) = &self.config.report {
            report::append_profile(report_path, &table, &profile.columns)
                .with_context(|| format!("Appending load report {report_path:?}"))?;
        }

        let prior = store.activate_connection(&self.config.connection)?;
        let outcome = self.run_pipeline(store, &file, &table, &profile, delimiter);
        let restored = store.restore_connection(prior);
        outcome?;
        restored?;

        info!("Loaded {file:?} into table '{table}'");
        Ok(LoadOutcome {
            table,
            columns: profile.columns,
            diagnostics: profile.diagnostics,
        })
    }

    fn run_pipeline<S: Store>(
        &self,
        store: &mut S,
        file: &Path,
        table: &str,
        profile: &FileProfile,
        delimiter: u8,
    ) -> Result<()> {
        store
            .create_table(table, &profile.columns)
            .with_context(|| format!("Creating table '{table}'"))?;
        info!(
            "Bulk importing {:?} into '{table}' ({} columns)",
            file.file_name().unwrap_or(file.as_os_str()),
            profile.columns.len()
        );
        store
            .bulk_import(&BulkImport {
                file,
                table,
                field_separator: delimiter,
                line_terminator: profile.line_terminator,
                skip_header_lines: 1,
                local: self.config.bulk_local_mode,
            })
            .with_context(|| format!("Bulk importing into '{table}'"))?;
        if self.config.normalize_after_load {
            self.normalize(store, table, &profile.columns)
                .with_context(|| format!("Normalizing table '{table}'"))?;
        }
        Ok(())
    }

    /// Post-load cleanup: bulk import turns empty date fields into zero
    /// dates, and string cells keep their surrounding whitespace. Zero
    /// dates become NULL; short strings are trimmed, whitespace-only ones
    /// become NULL. `text` columns are left untouched.
    fn normalize<S: Store>(
        &self,
        store: &mut S,
        table: &str,
        columns: &[ColumnProfile],
    ) -> Result<()> {
        for column in columns
            .iter()
            .filter(|c| matches!(c.field_type, FieldType::Date | FieldType::DateTime))
        {
            store.execute(&format!(
                "UPDATE `{table}` SET `{name}` = NULL WHERE `{name}` = 0",
                name = column.name
            ))?;
        }

        let assignments = columns
            .iter()
            .filter(|c| c.field_type == FieldType::ShortString)
            .map(|c| {
                format!(
                    "`{name}` = CASE WHEN CHAR_LENGTH(TRIM(`{name}`)) = 0 \
                     THEN NULL ELSE TRIM(`{name}`) END",
                    name = c.name
                )
            })
            .join(", ");
        if !assignments.is_empty() {
            store.execute(&format!("UPDATE `{table}` SET {assignments}"))?;
        }
        Ok(())
    }
}

/// Derives a table name from a file name: snake-cased stem with trailing
/// digits and underscores stripped, so `Sales Report 2024.csv` becomes
/// `sales_report`.
pub fn derive_table_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let snake = stem.to_snake_case();
    let trimmed = snake.trim_end_matches(|c: char| c.is_ascii_digit() || c == '_');
    if trimmed.is_empty() {
        snake
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_table_name_snake_cases_and_strips_trailing_digits() {
        assert_eq!(derive_table_name("Sales Report 2024.csv"), "sales_report");
        assert_eq!(derive_table_name("people.csv"), "people");
        assert_eq!(derive_table_name("orders_2024_01.tsv"), "orders");
        assert_eq!(derive_table_name("2024.csv"), "2024");
    }

    #[test]
    fn resolve_table_applies_prefix_to_explicit_and_derived_names() {
        let loader = Loader::new(LoaderConfig::default());
        assert_eq!(loader.resolve_table("people.csv", None), "load_people");
        assert_eq!(
            loader.resolve_table("people.csv", Some("staging")),
            "load_staging"
        );

        let bare = Loader::new(LoaderConfig {
            table_prefix: String::new(),
            ..LoaderConfig::default()
        });
        assert_eq!(bare.resolve_table("people.csv", None), "people");
    }

    #[test]
    fn delimiter_rejects_non_ascii_separators() {
        let config = LoaderConfig {
            field_separator: '€',
            ..LoaderConfig::default()
        };
        let err = config.delimiter().unwrap_err();
        assert!(err.to_string().contains("must be a single ASCII character"));

        let tab = LoaderConfig {
            field_separator: '\t',
            ..LoaderConfig::default()
        };
        assert_eq!(tab.delimiter().unwrap(), b'\t');
    }

    #[test]
    fn resolve_file_appends_default_extension() {
        let loader = Loader::new(LoaderConfig {
            folder: PathBuf::from("/data"),
            ..LoaderConfig::default()
        });
        assert_eq!(
            loader.resolve_file("people"),
            PathBuf::from("/data/people.csv")
        );
        assert_eq!(
            loader.resolve_file("people.tsv"),
            PathBuf::from("/data/people.tsv")
        );
    }
}
