use crate::error::{Error, Result};
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::Index;

/// Counters describing what a query changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    pub nodes_created: usize,
    pub nodes_deleted: usize,
    pub relationships_created: usize,
    pub relationships_deleted: usize,
    pub properties_set: usize,
}

impl QueryStats {
    pub fn contains_updates(&self) -> bool {
        *self != QueryStats::default()
    }
}

/// Rows produced by a query, with uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    stats: QueryStats,
}

impl QueryResult {
    /// Builds a result, checking that column names are unique and that every
    /// row has one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(Error::InvalidResult(format!("duplicate column name '{dup}'")));
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::InvalidResult(format!(
                "row {i} has {} values but there are {} columns",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self {
            columns,
            rows,
            stats: QueryStats::default(),
        })
    }

    pub(crate) fn with_stats(mut self, stats: QueryStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    pub fn get(&self, index: usize) -> Option<Record<'_>> {
        self.rows.get(index).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    /// The only record, `None` when there are no rows, an error when there are
    /// several.
    pub fn single(&self) -> Result<Option<Record<'_>>> {
        match self.rows.len() {
            0 => Ok(None),
            1 => Ok(self.get(0)),
            n => Err(Error::InvalidResult(format!(
                "expected a single record, got {n}"
            ))),
        }
    }

    /// The value in the single record, taken from `column` or from the only
    /// column when `None`.
    pub fn value(&self, column: Option<&str>) -> Result<&Value> {
        let record = self
            .single()?
            .ok_or_else(|| Error::InvalidResult("no records found".into()))?;
        let name = match column {
            Some(name) => name,
            None => match self.columns.as_slice() {
                [only] => only.as_str(),
                cols => {
                    return Err(Error::InvalidResult(format!(
                        "expected a single column, got {}",
                        cols.len()
                    )));
                }
            },
        };
        record
            .get(name)
            .ok_or_else(|| Error::InvalidResult(format!("unknown column '{name}'")))
    }

    pub fn to_maps(&self) -> Vec<IndexMap<String, Value>> {
        self.records().map(|r| r.to_map()).collect()
    }

    /// Renders the rows as a left-aligned text table.
    pub fn to_table(&self) -> String {
        if self.rows.is_empty() {
            return "No records found.".to_string();
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Value::to_string).collect())
            .collect();
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let header = pad_row(&self.columns, &widths);
        let separator = "-".repeat(header.chars().count());
        let mut lines = vec![header, separator];
        for row in &cells {
            lines.push(pad_row(row, &widths));
        }
        lines.join("\n")
    }
}

fn pad_row(items: &[String], widths: &[usize]) -> String {
    items
        .iter()
        .zip(widths)
        .map(|(item, width)| format!("{item:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// One row of a [`QueryResult`], addressed by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    pub fn keys(&self) -> &'a [String] {
        self.columns
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn to_map(&self) -> IndexMap<String, Value> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl Index<&str> for Record<'_> {
    type Output = Value;

    fn index(&self, column: &str) -> &Value {
        match self.get(column) {
            Some(value) => value,
            None => panic!("no column named '{column}'"),
        }
    }
}
