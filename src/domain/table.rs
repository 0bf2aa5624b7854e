use crate::utils::error::{EtlError, Result};
use std::collections::{HashMap, HashSet};

/// Untyped tabular data as returned by the Census API: a header row and
/// string cells, `None` where the API sent `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Builds a table from a `[[header...], [row...], ...]` JSON document.
    /// Returns `Ok(None)` when there is no data row.
    pub fn from_json_rows(value: serde_json::Value) -> Result<Option<Self>> {
        let serde_json::Value::Array(rows) = value else {
            return Err(EtlError::ProcessingError {
                message: "expected a JSON array of rows".to_string(),
            });
        };
        if rows.len() < 2 {
            return Ok(None);
        }

        let mut rows = rows.into_iter();
        let headers = match rows.next() {
            Some(serde_json::Value::Array(cells)) => cells
                .into_iter()
                .map(|cell| cell_to_string(cell).unwrap_or_default())
                .collect::<Vec<_>>(),
            _ => {
                return Err(EtlError::ProcessingError {
                    message: "header row is not an array".to_string(),
                })
            }
        };

        let mut table = RawTable::new(headers);
        for (index, row) in rows.enumerate() {
            let serde_json::Value::Array(cells) = row else {
                return Err(EtlError::ProcessingError {
                    message: format!("row {} is not an array", index + 1),
                });
            };
            if cells.len() != table.headers.len() {
                return Err(EtlError::ProcessingError {
                    message: format!(
                        "row {} has {} cells, expected {}",
                        index + 1,
                        cells.len(),
                        table.headers.len()
                    ),
                });
            }
            table.rows.push(cells.into_iter().map(cell_to_string).collect());
        }
        Ok(Some(table))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// First alias, in priority order, that names a column of this table.
    pub fn find_column<'a>(&self, aliases: &'a [String]) -> Option<&'a str> {
        aliases
            .iter()
            .find(|alias| self.column_index(alias).is_some())
            .map(String::as_str)
    }

    /// Full outer merge on `key`. When both sides have a column of the same
    /// name the left one is kept and the right one is discarded.
    pub fn merge_outer(self, other: RawTable, key: &str) -> Result<RawTable> {
        let (Some(left_key), Some(right_key)) = (self.column_index(key), other.column_index(key))
        else {
            return Err(EtlError::ProcessingError {
                message: format!("merge column '{}' missing from one side", key),
            });
        };

        let existing: HashSet<&str> = self.headers.iter().map(String::as_str).collect();
        let appended: Vec<usize> = other
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !existing.contains(h.as_str()))
            .map(|(i, _)| i)
            .collect();

        let mut right_by_key: HashMap<&str, usize> = HashMap::new();
        for (index, row) in other.rows.iter().enumerate() {
            if let Some(k) = row[right_key].as_deref() {
                right_by_key.entry(k).or_insert(index);
            }
        }

        let mut headers = self.headers.clone();
        headers.extend(appended.iter().map(|&i| other.headers[i].clone()));

        let mut matched = vec![false; other.rows.len()];
        let mut rows = Vec::with_capacity(self.rows.len().max(other.rows.len()));
        for mut row in self.rows {
            let right = row[left_key]
                .as_deref()
                .and_then(|k| right_by_key.get(k).copied());
            match right {
                Some(r) => {
                    matched[r] = true;
                    row.extend(appended.iter().map(|&i| other.rows[r][i].clone()));
                }
                None => row.extend(appended.iter().map(|_| None)),
            }
            rows.push(row);
        }

        let left_width = self.headers.len();
        for (index, right_row) in other.rows.iter().enumerate() {
            if matched[index] {
                continue;
            }
            let mut row = vec![None; left_width];
            row[left_key] = right_row[right_key].clone();
            row.extend(appended.iter().map(|&i| right_row[i].clone()));
            rows.push(row);
        }

        Ok(RawTable { headers, rows })
    }

    /// Side-by-side concatenation by row position, for chunks that share no
    /// identifier column.
    pub fn concat_columns(mut self, other: RawTable) -> RawTable {
        let height = self.rows.len().max(other.rows.len());
        let left_width = self.headers.len();
        let right_width = other.headers.len();

        self.rows.resize_with(height, || vec![None; left_width]);
        let mut right_rows = other.rows.into_iter();
        for row in self.rows.iter_mut() {
            match right_rows.next() {
                Some(cells) => row.extend(cells),
                None => row.extend(std::iter::repeat(None).take(right_width)),
            }
        }
        self.headers.extend(other.headers);
        self
    }

    /// Removes the named columns, ignoring names that are not present.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep: Vec<bool> = self
            .headers
            .iter()
            .map(|h| !names.contains(&h.as_str()))
            .collect();
        let mut keep_iter = keep.iter();
        self.headers.retain(|_| *keep_iter.next().unwrap_or(&true));
        for row in self.rows.iter_mut() {
            let mut keep_iter = keep.iter();
            row.retain(|_| *keep_iter.next().unwrap_or(&true));
        }
    }
}

fn cell_to_string(cell: serde_json::Value) -> Option<String> {
    match cell {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
