use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::column::{cell_reference, resolve};

/// Physical sheet row of data row 0: row 1 holds the headers and sheet
/// rows are 1-based.
pub const DATA_ROW_OFFSET: usize = 2;

/// Ordered column names of a sheet, taken from its first row
pub type HeaderRow = Vec<String>;

/// Sparse set of requested edits: data row index -> column name -> new value
///
/// Row indices are 0-based and exclude the header row. On the wire the
/// row keys are JSON object keys (`{"0": {"STATUS": "W"}}`), which serde
/// parses into `usize`.
pub type ChangeSet = BTreeMap<usize, BTreeMap<String, String>>;

/// Deserialize an optional change set whose cell values may be any JSON
/// scalar
///
/// Numbers and booleans keep their JSON spelling and `null` clears the
/// cell, so `{"0": {"STATUS": 3}}` writes `3`. Arrays and objects are
/// rejected.
pub fn deserialize_scalars<'de, D>(deserializer: D) -> Result<Option<ChangeSet>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<usize, BTreeMap<String, Value>>> = Option::deserialize(deserializer)?;
    let Some(rows) = raw else {
        return Ok(None);
    };

    let mut changes = ChangeSet::new();
    for (row_index, cells) in rows {
        let row = changes.entry(row_index).or_default();
        for (column, value) in cells {
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other @ (Value::Number(_) | Value::Bool(_)) => other.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(D::Error::custom(format!(
                        "value of column '{}' in row {} must be a string, number or boolean",
                        column, row_index
                    )));
                }
            };
            row.insert(column, value);
        }
    }
    Ok(Some(changes))
}

/// A single resolved cell write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellWrite {
    /// Sheet-qualified single-cell reference, e.g. `Results!C4`
    pub range: String,
    pub value: String,
}

/// Compile a change set into one cell write per (row, column) pair
///
/// Columns missing from `headers` produce no write. They are logged at
/// `warn` so a misspelled column does not disappear silently.
pub fn compile(
    sheet_name: &str,
    headers: &[String],
    changes: &ChangeSet,
    row_offset: usize,
) -> Vec<CellWrite> {
    let mut writes = Vec::new();

    for (row_index, row) in changes {
        // Rows past the addressable range are dropped, never wrapped
        let Some(sheet_row) = row_index.checked_add(row_offset) else {
            log::warn!(
                "Skipping row {} of sheet '{}': row index out of range",
                row_index,
                sheet_name
            );
            continue;
        };

        for (column, value) in row {
            let Some(col) = resolve(headers, column) else {
                log::warn!(
                    "Skipping unknown column '{}' for row {} of sheet '{}'",
                    column,
                    row_index,
                    sheet_name
                );
                continue;
            };

            writes.push(CellWrite {
                range: cell_reference(sheet_name, col, sheet_row),
                value: value.clone(),
            });
        }
    }

    writes
}

/// Count the (row, column) pairs in a change set
pub fn cell_count(changes: &ChangeSet) -> usize {
    changes.values().map(BTreeMap::len).sum()
}
