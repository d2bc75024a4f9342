//! Query executor abstraction
//!
//! Every manager in snowcli talks to Snowflake through [`SqlExecutor`]: one SQL
//! string in, one [`QueryResult`] out. The concrete connection lives in
//! [`super::SqlApiConnection`]; tests substitute a scripted executor.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};

/// Sends SQL statements to Snowflake and returns their result sets.
///
/// Implementations must never fail silently: malformed SQL, permission errors
/// and transport failures are all returned as errors.
pub trait SqlExecutor {
    /// Execute a single SQL statement
    fn execute(&self, sql: &str) -> Result<QueryResult>;
}

impl<T: SqlExecutor + ?Sized> SqlExecutor for &T {
    fn execute(&self, sql: &str) -> Result<QueryResult> {
        (**self).execute(sql)
    }
}

impl<T: SqlExecutor + ?Sized> SqlExecutor for Box<T> {
    fn execute(&self, sql: &str) -> Result<QueryResult> {
        (**self).execute(sql)
    }
}

/// Tabular result of a statement
///
/// Snowflake returns every cell as a string (or null), so values are kept as
/// `Option<String>` and interpreted by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Result with no columns and no rows (e.g. for DDL)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result from `(column, value)` records.
    ///
    /// Columns are taken from the first record; later records must use the
    /// same column order.
    pub fn from_records(records: &[&[(&str, &str)]]) -> Self {
        let columns = records
            .first()
            .map(|r| r.iter().map(|(c, _)| c.to_string()).collect())
            .unwrap_or_default();
        let rows = records
            .iter()
            .map(|r| r.iter().map(|(_, v)| Some(v.to_string())).collect())
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value of the first column of the first row
    pub fn first_value(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }

    /// Iterate rows as [`Record`]s with by-name column access
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        (0..self.rows.len()).map(move |index| Record {
            result: self,
            index,
        })
    }

    /// Convert rows into JSON objects keyed by column name
    pub fn to_json_rows(&self) -> Vec<Map<String, Value>> {
        self.records().map(|r| r.to_json()).collect()
    }
}

impl Serialize for QueryResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_rows().serialize(serializer)
    }
}

/// Borrowed view of a single result row
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    result: &'a QueryResult,
    index: usize,
}

impl<'a> Record<'a> {
    /// Whether the result carries the column at all
    pub fn has_column(&self, column: &str) -> bool {
        self.result.column_index(column).is_some()
    }

    /// Cell value by column name (case-insensitive); `None` for null or missing
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.result.column_index(column)?;
        self.result.rows[self.index].get(idx)?.as_deref()
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let row = &self.result.rows[self.index];
        self.result
            .columns
            .iter()
            .zip(row.iter())
            .map(|(c, v)| {
                let value = match v {
                    Some(s) => Value::String(s.clone()),
                    None => Value::Null,
                };
                (c.clone(), value)
            })
            .collect()
    }
}
