//! Spreadsheet loading.
//!
//! Every source sheet uses the same fixed layout: the first named row is the
//! country aggregate, the second the district aggregate and every row after
//! that a region. Only the first two columns matter: the unit name and its
//! Gini index.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use thiserror::Error;

use crate::config::DEFAULT_MISSING_VALUE_TOKEN;

/// Errors that can occur while reading a sheet.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Unsupported sheet format: {0}")]
    Unsupported(PathBuf),

    #[error("Failed to read workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        source: calamine::Error,
    },

    #[error("Failed to read CSV {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Workbook has no worksheets: {0}")]
    Empty(PathBuf),
}

/// One normalized `{name, index value}` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub name: String,
    pub gini: Option<f64>,
}

impl SheetRow {
    pub fn new(name: impl Into<String>, gini: Option<f64>) -> Self {
        Self {
            name: name.into(),
            gini,
        }
    }
}

/// One sheet's rows, in file order, with unnamed rows already dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSheet {
    pub rows: Vec<SheetRow>,
}

impl SourceSheet {
    pub fn new(rows: Vec<SheetRow>) -> Self {
        Self { rows }
    }

    /// Country aggregate (row 0).
    pub fn country(&self) -> Option<&SheetRow> {
        self.rows.first()
    }

    /// District aggregate (row 1).
    pub fn district(&self) -> Option<&SheetRow> {
        self.rows.get(1)
    }

    /// Region rows (rows 2..).
    pub fn regions(&self) -> &[SheetRow] {
        self.rows.get(2..).unwrap_or(&[])
    }
}

/// Reads spreadsheet files into `SourceSheet`s.
#[derive(Debug, Clone)]
pub struct SheetLoader {
    missing_value_token: String,
    header_rows: usize,
}

impl Default for SheetLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MISSING_VALUE_TOKEN, 0)
    }
}

impl SheetLoader {
    /// Create a loader treating `missing_value_token` as an absent value and
    /// skipping `header_rows` leading rows of every sheet.
    pub fn new(missing_value_token: &str, header_rows: usize) -> Self {
        Self {
            missing_value_token: missing_value_token.to_string(),
            header_rows,
        }
    }

    /// Check if a file extension is one this loader can read.
    pub fn is_supported(path: &Path) -> bool {
        matches!(
            extension(path).as_deref(),
            Some("xls" | "xlsx" | "xlsm" | "xlsb" | "ods" | "csv")
        )
    }

    /// Load and normalize a sheet from disk.
    pub fn load(&self, path: &Path) -> Result<SourceSheet, SheetError> {
        if !Self::is_supported(path) {
            return Err(SheetError::Unsupported(path.to_path_buf()));
        }
        match extension(path).as_deref() {
            Some("csv") => self.load_csv(path),
            _ => self.load_workbook(path),
        }
    }

    /// Read the first worksheet of a workbook.
    fn load_workbook(&self, path: &Path) -> Result<SourceSheet, SheetError> {
        let workbook_error = |source| SheetError::Workbook {
            path: path.to_path_buf(),
            source,
        };

        let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| SheetError::Empty(path.to_path_buf()))?
            .map_err(workbook_error)?;

        let rows = range.rows().skip(self.header_rows).filter_map(|row| {
            let name = row.first().and_then(name_from_data)?;
            let gini = row.get(1).and_then(|cell| self.value_from_data(cell));
            Some(SheetRow { name, gini })
        });

        Ok(SourceSheet::new(rows.collect()))
    }

    /// Read a headerless CSV file. Semicolon-separated files are detected
    /// from the first line. Files that are not valid UTF-8 are read as
    /// Latin-1, the encoding the agency exports use.
    fn load_csv(&self, path: &Path) -> Result<SourceSheet, SheetError> {
        let bytes = std::fs::read(path).map_err(|source| SheetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let contents = decode_text(bytes);
        let first_line = contents.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        let delimiter = if first_line.contains(';') { b';' } else { b',' };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(contents.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records().skip(self.header_rows) {
            let record = record.map_err(|source| SheetError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            let Some(name) = record.get(0).map(str::trim).filter(|n| !n.is_empty()) else {
                continue;
            };
            let gini = record.get(1).and_then(|cell| self.parse_index_value(cell));
            rows.push(SheetRow::new(name, gini));
        }

        Ok(SourceSheet::new(rows))
    }

    fn value_from_data(&self, cell: &Data) -> Option<f64> {
        match cell {
            Data::Float(f) if f.is_finite() => Some(*f),
            Data::Int(i) => Some(*i as f64),
            Data::String(s) => self.parse_index_value(s),
            _ => None,
        }
    }

    /// Parse an index value from cell text.
    ///
    /// The missing-value token, blanks and unparseable text yield `None`.
    /// A comma is accepted as the decimal separator.
    pub fn parse_index_value(&self, text: &str) -> Option<f64> {
        let text = text.trim();
        if text.is_empty() || text == self.missing_value_token {
            return None;
        }
        match text.replace(',', ".").parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                tracing::debug!("Unparseable index value '{}', treating as missing", text);
                None
            }
        }
    }
}

/// Decode file contents as UTF-8, falling back to Latin-1.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        // Every Latin-1 byte maps to the code point of the same value
        Err(e) => e.into_bytes().iter().map(|&b| char::from(b)).collect(),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn name_from_data(cell: &Data) -> Option<String> {
    let name = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        _ => return None,
    };
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
