//! Ground-truth table sources: CSV, spreadsheet, JSON and JSON Lines files.

use crate::error::RadbiasError;
use async_trait::async_trait;
use calamine::{Data, Reader, open_workbook_auto};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The type of source a table is loaded from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSourceType {
    Csv {
        path: PathBuf,
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    Json {
        path: PathBuf,
    },
    Jsonl {
        path: PathBuf,
    },
    Xlsx {
        path: PathBuf,
        #[serde(default)]
        sheet: Option<String>,
    },
}

fn default_delimiter() -> char {
    ','
}

impl DataSourceType {
    /// Pick a source type from the file extension.
    pub fn from_path(path: &Path, delimiter: char) -> Result<Self, RadbiasError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Ok(Self::Csv {
                path: path.to_path_buf(),
                delimiter: if ext == "tsv" { '\t' } else { delimiter },
            }),
            "json" => Ok(Self::Json {
                path: path.to_path_buf(),
            }),
            "jsonl" | "ndjson" => Ok(Self::Jsonl {
                path: path.to_path_buf(),
            }),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Xlsx {
                path: path.to_path_buf(),
                sheet: None,
            }),
            other => Err(RadbiasError::data_load(format!(
                "Unsupported file type '{other}' for {}",
                path.display()
            ))),
        }
    }

    /// Pick the worksheet of a spreadsheet source. Other sources ignore it.
    pub fn with_sheet(self, sheet: Option<String>) -> Self {
        match self {
            Self::Xlsx { path, .. } => Self::Xlsx { path, sheet },
            other => other,
        }
    }

    pub fn into_source(self) -> Box<dyn DataSource> {
        match self {
            Self::Csv { path, delimiter } => Box::new(CsvSource { path, delimiter }),
            Self::Json { path } => Box::new(JsonSource { path }),
            Self::Jsonl { path } => Box::new(JsonlSource { path }),
            Self::Xlsx { path, sheet } => Box::new(XlsxSource { path, sheet }),
        }
    }
}

/// An in-memory table with free-text cells. A missing cell is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Build a table, dropping every repeated column name after its first
    /// occurrence.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let keep: Vec<usize> = {
            let mut seen = HashSet::new();
            columns
                .iter()
                .enumerate()
                .filter(|(_, name)| seen.insert(name.as_str()))
                .map(|(i, _)| i)
                .collect()
        };

        if keep.len() == columns.len() {
            return Self { columns, rows };
        }

        tracing::debug!(
            dropped = columns.len() - keep.len(),
            "Dropping duplicate columns"
        );
        let columns = keep.iter().map(|&i| columns[i].clone()).collect();
        let rows = rows
            .into_iter()
            .map(|row| keep.iter().map(|&i| row.get(i).cloned().flatten()).collect())
            .collect();
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column, or `InvalidColumn` naming the available ones.
    pub fn column_index(&self, name: &str) -> Result<usize, RadbiasError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| RadbiasError::invalid_column(name, &self.columns))
    }

    /// A single cell; `None` when missing or the row is short.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<&str>>, RadbiasError> {
        let idx = self.column_index(name)?;
        Ok((0..self.rows.len()).map(|r| self.cell(r, idx)).collect())
    }
}

/// Information about where a table came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
}

/// Trait for loading a table from a source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Load the table, optionally limiting the number of rows.
    async fn load(&self, limit: Option<usize>) -> Result<Table, RadbiasError>;

    /// Return metadata about this source.
    fn source_info(&self) -> DataSourceInfo;
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn json_cell(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => non_empty(s),
        other => Some(other.to_string()),
    }
}

/// Turn a list of JSON objects into a table. Columns are the union of keys in
/// first-seen order.
fn table_from_objects(items: &[serde_json::Value]) -> Result<Table, RadbiasError> {
    let mut columns: Vec<String> = Vec::new();
    for item in items {
        let serde_json::Value::Object(map) = item else {
            return Err(RadbiasError::data_load("Every record must be a JSON object"));
        };
        for key in map.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = items
        .iter()
        .map(|item| columns.iter().map(|col| json_cell(item.get(col))).collect())
        .collect();
    Ok(Table::new(columns, rows))
}

async fn read_file(path: &Path) -> Result<String, RadbiasError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RadbiasError::data_load(format!("Failed to read {}: {e}", path.display())))
}

// ---------------------------------------------------------------------------
// CsvSource
// ---------------------------------------------------------------------------

/// Delimited text file source.
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: char,
}

impl CsvSource {
    /// Parse delimited text that is already in memory.
    pub fn parse(
        content: &str,
        delimiter: char,
        limit: Option<usize>,
    ) -> Result<Table, RadbiasError> {
        let delimiter = u8::try_from(delimiter)
            .map_err(|_| RadbiasError::data_load(format!("Delimiter '{delimiter}' is not ASCII")))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| RadbiasError::data_load(format!("Unreadable CSV header: {e}")))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(RadbiasError::data_load("Empty CSV file"));
        }

        let mut rows = Vec::new();
        for (line, result) in reader.records().enumerate() {
            if limit.is_some_and(|max| rows.len() >= max) {
                break;
            }
            let record = result.map_err(|e| {
                RadbiasError::data_load(format!("Malformed CSV record {}: {e}", line + 1))
            })?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let row: Vec<Option<String>> = (0..columns.len())
                .map(|i| record.get(i).and_then(non_empty))
                .collect();
            rows.push(row);
        }

        Ok(Table::new(columns, rows))
    }
}

#[async_trait]
impl DataSource for CsvSource {
    async fn load(&self, limit: Option<usize>) -> Result<Table, RadbiasError> {
        let content = read_file(&self.path).await?;
        let table = Self::parse(&content, self.delimiter, limit)?;
        tracing::info!(
            path = %self.path.display(),
            rows = table.row_count(),
            columns = table.column_count(),
            "Loaded CSV table"
        );
        Ok(table)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "csv".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// XlsxSource
// ---------------------------------------------------------------------------

/// Spreadsheet file source. The first row of the sheet holds the headers.
pub struct XlsxSource {
    pub path: PathBuf,
    /// Worksheet name; the first sheet when `None`.
    pub sheet: Option<String>,
}

fn sheet_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => non_empty(s),
        other => non_empty(&other.to_string()),
    }
}

impl XlsxSource {
    fn read(path: &Path, sheet: Option<&str>, limit: Option<usize>) -> Result<Table, RadbiasError> {
        let mut workbook = open_workbook_auto(path).map_err(|e| {
            RadbiasError::data_load(format!("Failed to open {}: {e}", path.display()))
        })?;
        let name = match sheet {
            Some(name) => name.to_string(),
            None => workbook.sheet_names().into_iter().next().ok_or_else(|| {
                RadbiasError::data_load(format!("{} has no worksheets", path.display()))
            })?,
        };
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| RadbiasError::data_load(format!("Failed to read sheet '{name}': {e}")))?;

        let mut rows = range.rows();
        let columns: Vec<String> = rows
            .next()
            .ok_or_else(|| RadbiasError::data_load(format!("Sheet '{name}' is empty")))?
            .iter()
            .map(|header| header.to_string().trim().to_string())
            .collect();

        let rows: Vec<Vec<Option<String>>> = rows
            .map(|row| row.iter().map(sheet_cell).collect::<Vec<_>>())
            .filter(|row| row.iter().any(Option::is_some))
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(Table::new(columns, rows))
    }
}

#[async_trait]
impl DataSource for XlsxSource {
    async fn load(&self, limit: Option<usize>) -> Result<Table, RadbiasError> {
        let path = self.path.clone();
        let sheet = self.sheet.clone();
        let table = tokio::task::spawn_blocking(move || Self::read(&path, sheet.as_deref(), limit))
            .await
            .map_err(|e| RadbiasError::data_load(format!("Spreadsheet reader failed: {e}")))??;
        tracing::info!(
            path = %self.path.display(),
            sheet = self.sheet.as_deref().unwrap_or("<first>"),
            rows = table.row_count(),
            columns = table.column_count(),
            "Loaded spreadsheet table"
        );
        Ok(table)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "xlsx".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonSource
// ---------------------------------------------------------------------------

/// JSON file source: an array of objects, or a single object.
pub struct JsonSource {
    pub path: PathBuf,
}

#[async_trait]
impl DataSource for JsonSource {
    async fn load(&self, limit: Option<usize>) -> Result<Table, RadbiasError> {
        let content = read_file(&self.path).await?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| RadbiasError::data_load(format!("Invalid JSON: {e}")))?;

        let items = match value {
            serde_json::Value::Array(arr) => arr,
            obj @ serde_json::Value::Object(_) => vec![obj],
            _ => return Err(RadbiasError::data_load("JSON must be an array or object")),
        };
        let limited: Vec<_> = match limit {
            Some(max) => items.into_iter().take(max).collect(),
            None => items,
        };

        let table = table_from_objects(&limited)?;
        tracing::info!(path = %self.path.display(), rows = table.row_count(), "Loaded JSON table");
        Ok(table)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "json".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonlSource
// ---------------------------------------------------------------------------

/// JSON Lines file source, one object per line.
pub struct JsonlSource {
    pub path: PathBuf,
}

#[async_trait]
impl DataSource for JsonlSource {
    async fn load(&self, limit: Option<usize>) -> Result<Table, RadbiasError> {
        let content = read_file(&self.path).await?;
        let mut items = Vec::new();
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if limit.is_some_and(|max| items.len() >= max) {
                break;
            }
            let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
                RadbiasError::data_load(format!("Invalid JSON on line {}: {e}", n + 1))
            })?;
            items.push(value);
        }

        let table = table_from_objects(&items)?;
        tracing::info!(path = %self.path.display(), rows = table.row_count(), "Loaded JSONL table");
        Ok(table)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "jsonl".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}
