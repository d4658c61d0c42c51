//! Tabular input for enrichment runs.
//!
//! A [`Dataset`] is a CSV file whose first record names the columns. Every
//! following record becomes a [`Row`] that can be looked up by heading.
//!
//! ```
//! use inet_data::Dataset;
//!
//! let data = Dataset::from_reader("name,website\nAcme,acme.example\n".as_bytes()).unwrap();
//! assert_eq!(data.headings(), ["name", "website"]);
//! assert_eq!(data.rows()[0].get("website"), Some("acme.example"));
//! ```

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("no input file given")]
    MissingInput,
    #[error("input file must be of type .csv: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("input has no heading row")]
    NoHeadings,
    #[error("record on line {line} has {found} fields, expected {expected}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Csv(csv::Error),
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => DataError::FieldCount {
                line: pos.as_ref().map(|p| p.line()).unwrap_or_default(),
                expected: *expected_len as usize,
                found: *len as usize,
            },
            _ => DataError::Csv(err),
        }
    }
}

/// One data record, addressable by column heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    headings: Arc<[String]>,
    values: Vec<String>,
}

impl Row {
    /// Value under `heading`. With duplicate headings the first wins.
    pub fn get(&self, heading: &str) -> Option<&str> {
        let idx = self.headings.iter().position(|h| h == heading)?;
        self.values.get(idx).map(String::as_str)
    }

    /// `(heading, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headings
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (heading, value) in self.iter() {
            map.serialize_entry(heading, value)?;
        }
        map.end()
    }
}

/// Rows loaded from a CSV file, in file order.
#[derive(Debug, Clone)]
pub struct Dataset {
    source: Option<PathBuf>,
    headings: Arc<[String]>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Load a `.csv` file (extension checked case-insensitively).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(DataError::MissingInput);
        }
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(DataError::UnsupportedFormat(path.to_path_buf()));
        }

        let reader = csv::ReaderBuilder::new().from_path(path)?;
        let mut data = Self::from_csv(reader)?;
        data.source = Some(path.to_path_buf());
        tracing::info!(path=%path.display(), rows=data.len(), columns=data.headings.len(), "dataset.loaded");
        Ok(data)
    }

    /// Read CSV from any reader; the first record is the heading row.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, DataError> {
        Self::from_csv(csv::ReaderBuilder::new().from_reader(rdr))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, DataError> {
        let headings: Arc<[String]> = reader.headers()?.iter().map(str::to_string).collect();
        if headings.is_empty() {
            return Err(DataError::NoHeadings);
        }

        let rows = reader
            .records()
            .map(|record| {
                Ok(Row {
                    headings: Arc::clone(&headings),
                    values: record?.iter().map(str::to_string).collect(),
                })
            })
            .collect::<Result<Vec<_>, DataError>>()?;

        Ok(Self {
            source: None,
            headings,
            rows,
        })
    }

    /// No headings, no rows.
    pub fn empty() -> Self {
        Self {
            source: None,
            headings: Arc::from(Vec::new()),
            rows: Vec::new(),
        }
    }

    /// Path the data was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn headings(&self) -> &[String] {
        &self.headings
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, `None` for every row when the heading is unknown.
    pub fn column<'a>(&'a self, heading: &'a str) -> impl Iterator<Item = Option<&'a str>> + 'a {
        self.rows.iter().map(move |row| row.get(heading))
    }
}
