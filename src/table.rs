//! Minimal ordered-column data table.
//!
//! Backs the behavioral log, the single-trial table and the evoked summary.
//! Cells are typed ([`Value`]); CSV output uses `NA` for missing values and
//! four decimal places for floats.

use std::fmt;
use std::path::Path;

use crate::errors::{Error, Result};

/// One table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Missing,
}

impl Value {
    /// Parse a raw CSV cell: integer, then float, `""`/`"NA"` as missing,
    /// anything else as a string.
    pub fn parse(cell: &str) -> Value {
        let trimmed = cell.trim();
        if trimmed.is_empty() || trimmed == "NA" {
            return Value::Missing;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
        Value::Str(trimmed.to_string())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:.4}"),
            Value::Missing => write!(f, "NA"),
        }
    }
}

/// Column-ordered table of typed cells.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: vec![] }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::Format(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Insert a column at position 0 (used for the participant id).
    pub fn insert_column_front(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        self.check_new_column(name, values.len())?;
        self.columns.insert(0, name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(0, value);
        }
        Ok(())
    }

    /// Overwrite an existing column or append a new one at the end.
    /// Keeps derived columns from duplicating names already present.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.n_rows() {
            return Err(Error::Format(format!(
                "column {name:?} has {} values for {} rows",
                values.len(),
                self.n_rows()
            )));
        }
        match self.column_index(name) {
            Some(col) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[col] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    fn check_new_column(&self, name: &str, len: usize) -> Result<()> {
        if self.column_index(name).is_some() {
            return Err(Error::Format(format!("column {name:?} already exists")));
        }
        if len != self.n_rows() {
            return Err(Error::Format(format!(
                "column {name:?} has {len} values for {} rows",
                self.n_rows()
            )));
        }
        Ok(())
    }

    /// Read a delimited file; tab-separated for `.tsv`/`.txt`, comma
    /// otherwise.  The first record is the header.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some("tsv") | Some("txt") => b'\t',
            _ => b',',
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let columns: Vec<String> =
            reader.headers()?.iter().map(str::to_string).collect();
        let mut table = DataTable::new(columns);
        for record in reader.records() {
            let record = record?;
            table.push_row(record.iter().map(Value::parse).collect())?;
        }
        Ok(table)
    }

    /// Write as comma-separated values (`NA` missing cells, 4-decimal
    /// floats).
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}
