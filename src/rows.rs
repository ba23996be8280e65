//! Row source for delimited files.
//!
//! [`RowSource`] opens a delimited file and yields rows one at a time as
//! ordered name→value pairs. Header names are normalized (snake-cased,
//! non-alphanumeric runs collapsed to single underscores) and de-duplicated.
//! Malformed rows surface as per-row [`RowError`]s without terminating the
//! sequence, and the detected line terminator is available from the opened
//! source rather than any ambient state.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;
use heck::ToSnakeCase;
use thiserror::Error;

pub const DEFAULT_DELIMITER: u8 = b',';
pub const TSV_DELIMITER: u8 = b'\t';

/// Extension-based delimiter auto-detection with manual override.
pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => TSV_DELIMITER,
        _ => DEFAULT_DELIMITER,
    })
}

/// Line terminator detected from the file's first physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTerminator {
    Lf,
    CrLf,
}

impl LineTerminator {
    /// Escaped form for embedding in an SQL string literal.
    pub fn as_sql_literal(&self) -> &'static str {
        match self {
            LineTerminator::Lf => "\\n",
            LineTerminator::CrLf => "\\r\\n",
        }
    }
}

/// One parsed row: column name → raw value, in file order.
#[derive(Debug, Clone)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

/// Row-level read failures. `Malformed` is transient: the reader has already
/// consumed the offending record, so the next read makes forward progress.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("malformed row {row}: {source}")]
    Malformed {
        row: u64,
        #[source]
        source: csv::Error,
    },
    #[error("unreadable value in row {row}")]
    Unreadable { row: u64 },
    #[error(transparent)]
    Read(#[from] csv::Error),
}

pub struct RowSource {
    reader: csv::Reader<Box<dyn Read>>,
    headers: Vec<String>,
    terminator: LineTerminator,
    path: PathBuf,
    rows_read: u64,
}

impl RowSource {
    /// Opens `path` and prepares it for row iteration. The line terminator
    /// is detected up front and travels with the returned source.
    pub fn open(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let terminator = detect_line_terminator(path)?;
        let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
        let raw: Box<dyn Read> = if encoding == UTF_8 {
            Box::new(BufReader::new(file))
        } else {
            Box::new(
                DecodeReaderBytesBuilder::new()
                    .encoding(Some(encoding))
                    .build(BufReader::new(file)),
            )
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .double_quote(true)
            .flexible(false)
            .from_reader(raw);
        let headers = reader
            .headers()
            .with_context(|| format!("Reading header row of {path:?}"))?
            .iter()
            .map(normalize_header)
            .collect::<Vec<_>>();
        let headers = dedupe_headers(headers);
        Ok(Self {
            reader,
            headers,
            terminator,
            path: path.to_path_buf(),
            rows_read: 0,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn line_terminator(&self) -> LineTerminator {
        self.terminator
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next row. `None` means the source is exhausted; an `Err`
    /// covers only the offending record and iteration may continue.
    pub fn next_row(&mut self) -> Option<Result<Row, RowError>> {
        let mut record = csv::StringRecord::new();
        self.rows_read += 1;
        match self.reader.read_record(&mut record) {
            Ok(false) => None,
            Ok(true) => {
                let fields = self
                    .headers
                    .iter()
                    .cloned()
                    .zip(record.iter().map(str::to_string))
                    .collect();
                Some(Ok(Row { fields }))
            }
            Err(source) => Some(Err(match source.kind() {
                csv::ErrorKind::UnequalLengths { .. } => RowError::Malformed {
                    row: self.rows_read,
                    source,
                },
                csv::ErrorKind::Utf8 { .. } => RowError::Unreadable {
                    row: self.rows_read,
                },
                _ => RowError::Read(source),
            })),
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Normalizes a raw header into an identifier: snake-cased, lower-cased,
/// non-alphanumeric runs collapsed to a single underscore, no leading or
/// trailing underscores.
pub fn normalize_header(raw: &str) -> String {
    let snake = raw.trim().to_snake_case();
    let mut out = String::with_capacity(snake.len());
    let mut pending_separator = false;
    for c in snake.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    out
}

/// Appends `_2`, `_3`, … to headers that collide after normalization so the
/// profile's unique-name invariant holds.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        if !seen.contains(&header) {
            seen.push(header);
            continue;
        }
        let mut suffix = 2usize;
        loop {
            let candidate = format!("{header}_{suffix}");
            if !seen.contains(&candidate) {
                log::warn!("Duplicate column '{header}' renamed to '{candidate}'");
                seen.push(candidate);
                break;
            }
            suffix += 1;
        }
    }
    seen
}

fn detect_line_terminator(path: &Path) -> Result<LineTerminator> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut reader = BufReader::new(file);
    let mut first_line = Vec::new();
    reader
        .read_until(b'\n', &mut first_line)
        .with_context(|| format!("Detecting line terminator of {path:?}"))?;
    if first_line.ends_with(b"\r\n") {
        Ok(LineTerminator::CrLf)
    } else if first_line.ends_with(b"\n") {
        Ok(LineTerminator::Lf)
    } else {
        // No newline in the file at all; the bulk-import default.
        Ok(LineTerminator::CrLf)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn normalize_header_collapses_runs_and_trims() {
        assert_eq!(normalize_header("Order ID"), "order_id");
        assert_eq!(normalize_header("  First--Name  "), "first_name");
        assert_eq!(normalize_header("$Percent%"), "percent");
        assert_eq!(normalize_header("CreatedAt"), "created_at");
    }

    #[test]
    fn dedupe_headers_suffixes_collisions() {
        let headers = vec!["id".to_string(), "id".to_string(), "id".to_string()];
        assert_eq!(dedupe_headers(headers), vec!["id", "id_2", "id_3"]);
    }

    #[test]
    fn open_detects_line_terminator() {
        let mut crlf = NamedTempFile::new().expect("temp file");
        crlf.write_all(b"id,name\r\n1,Bob\r\n").unwrap();
        let source = RowSource::open(crlf.path(), DEFAULT_DELIMITER, UTF_8).unwrap();
        assert_eq!(source.line_terminator(), LineTerminator::CrLf);

        let mut lf = NamedTempFile::new().expect("temp file");
        lf.write_all(b"id,name\n1,Bob\n").unwrap();
        let source = RowSource::open(lf.path(), DEFAULT_DELIMITER, UTF_8).unwrap();
        assert_eq!(source.line_terminator(), LineTerminator::Lf);
    }

    #[test]
    fn next_row_pairs_values_with_normalized_headers() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "Order ID,Customer Name\n1,Bob\n").unwrap();
        let mut source = RowSource::open(file.path(), DEFAULT_DELIMITER, UTF_8).unwrap();
        assert_eq!(source.headers(), ["order_id", "customer_name"]);

        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.get("order_id"), Some("1"));
        assert_eq!(row.get("customer_name"), Some("Bob"));
        assert!(source.next_row().is_none());
    }

    #[test]
    fn ragged_rows_surface_as_malformed_and_reading_continues() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "id,name\n1,Bob\n2\n3,Carol\n").unwrap();
        let mut source = RowSource::open(file.path(), DEFAULT_DELIMITER, UTF_8).unwrap();

        assert!(source.next_row().unwrap().is_ok());
        let err = source.next_row().unwrap().unwrap_err();
        assert!(matches!(err, RowError::Malformed { .. }));
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.get("name"), Some("Carol"));
    }
}
