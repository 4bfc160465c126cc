use crate::error::DataError;
use crate::models::{AdmissionTable, UNKNOWN};
use crate::schema::{compact_key, ColumnMap};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// A source table exactly as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            // Spreadsheet exports often end with blank separator rows
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    /// Reads a CSV file, naming the table after the lowercased file stem.
    pub fn read_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path, &content)
    }

    pub fn from_bytes(path: &Path, content: &[u8]) -> Result<Self, DataError> {
        Self::from_reader(&table_key(path), content).map_err(|source| DataError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first header matching any candidate, ignoring case and punctuation.
    pub fn column_index(&self, candidates: &[&str]) -> Option<usize> {
        let headers: Vec<String> = self.headers.iter().map(|h| compact_key(h)).collect();
        candidates.iter().find_map(|candidate| {
            let candidate = compact_key(candidate);
            headers.iter().position(|h| *h == candidate)
        })
    }

    /// The first `n` rows as header -> value maps.
    pub fn sample(&self, n: usize) -> Vec<BTreeMap<String, String>> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                self.headers
                    .iter()
                    .enumerate()
                    .map(|(idx, header)| (header.clone(), row.get(idx).cloned().unwrap_or_default()))
                    .collect()
            })
            .collect()
    }

    pub fn admission_records(&self) -> AdmissionTable {
        let columns = ColumnMap::from_headers(&self.headers);
        let records = self
            .rows
            .iter()
            .map(|row| columns.record(row, &self.name))
            .collect();

        AdmissionTable {
            source: self.name.clone(),
            records,
        }
    }
}

/// Cache key for a table file: the file stem, lowercased.
pub fn table_key(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_lowercase)
        .unwrap_or_else(|| UNKNOWN.to_lowercase())
}

pub fn is_table_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
}
