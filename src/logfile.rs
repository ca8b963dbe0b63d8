//! Behavioral log reading.
//!
//! The log file holds one row per presented trial.  Rows can be dropped by
//! index (`skip_rows`, e.g. practice trials) or by condition value
//! (`skip_conditions`, e.g. filler items); the retained rows must then align
//! 1:1, in order, with the extracted epochs — that alignment is checked at
//! fusion time in the pipeline, not here.

use std::path::Path;

use crate::errors::Result;
use crate::table::{DataTable, Value};

/// Read the behavioral log, dropping skipped rows and conditions.
///
/// `skip_rows` are 0-based indices into the data rows (header excluded).
/// `skip_conditions` pairs a column name with the values to drop; a row is
/// dropped when any configured column matches any of its listed values.
/// A condition column that does not exist in the log is ignored.
pub fn read_log(
    path: &Path,
    skip_rows: &[usize],
    skip_conditions: &[(String, Vec<String>)],
) -> Result<DataTable> {
    let full = DataTable::from_csv(path)?;

    let mut out = DataTable::new(full.columns().to_vec());
    'rows: for (ix, row) in full.rows().iter().enumerate() {
        if skip_rows.contains(&ix) {
            continue;
        }
        for (column, values) in skip_conditions {
            let Some(col) = full.column_index(column) else {
                continue;
            };
            let cell = cell_text(&row[col]);
            if values.iter().any(|v| v == &cell) {
                continue 'rows;
            }
        }
        out.push_row(row.clone())?;
    }
    Ok(out)
}

/// Condition matching compares the raw text of a cell, so `"1"` in the
/// config matches the integer 1 in the log.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Missing => "NA".to_string(),
    }
}
