// src/materialize.rs
// Best-value materialization: one flat row per document

use ahash::AHashSet;
use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing::warn;

use crate::curation::Curation;
use crate::document::{Document, FieldValue, ValueEntry};
use crate::units::{Quantity, UnitRegistry};

/// One materialized value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Scalar document field, copied through
    Scalar(Value),
    /// Selected value without a recognized unit
    Number(f64),
    Quantity(Quantity),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Scalar(v) => v.as_f64(),
            Cell::Number(n) => Some(*n),
            Cell::Quantity(q) => Some(q.value),
        }
    }

    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self {
            Cell::Quantity(q) => Some(q),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Scalar(v) => v.clone(),
            Cell::Number(n) => Value::from(*n),
            Cell::Quantity(q) => json!({"value": q.value, "unit": q.unit.to_string()}),
        }
    }
}

pub type Row = IndexMap<String, Cell>;

/// Column ordering of a materialized table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnOrder {
    /// Fields of the first row in order, then fields first seen in later rows
    #[default]
    FirstRow,
    /// No row acts as template; columns are listed by name
    Unordered,
}

/// Materialized rows plus their column set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    fn from_rows(rows: Vec<Row>, order: ColumnOrder) -> Self {
        let mut seen = AHashSet::new();
        let mut columns = Vec::new();
        for row in &rows {
            for name in row.keys() {
                if seen.insert(name.as_str()) {
                    columns.push(name.clone());
                }
            }
        }
        if order == ColumnOrder::Unordered {
            columns.sort();
        }
        Table { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
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

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// One cell per row; `None` where the row lacks the field
    pub fn column(&self, name: &str) -> Vec<Option<&Cell>> {
        self.rows.iter().map(|row| row.get(name)).collect()
    }

    /// Array of row objects with keys in column order
    pub fn to_json(&self) -> Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut map = serde_json::Map::new();
                for column in &self.columns {
                    if let Some(cell) = row.get(column) {
                        map.insert(column.clone(), cell.to_json());
                    }
                }
                Value::Object(map)
            })
            .collect();
        Value::Array(rows)
    }
}

/// Point estimate of a sampled distribution
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionSummary {
    pub value: f64,
    pub error: f64,
    pub unit: Option<String>,
}

/// Mean and standard deviation of the samples, read as draws from a normal
/// distribution. `None` for an empty sample set.
pub fn summarize_distribution(samples: &[f64], unit: Option<&str>) -> Option<DistributionSummary> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some(DistributionSummary {
        value: mean,
        error: variance.sqrt(),
        unit: unit.map(str::to_string),
    })
}

/// Pick the entry that represents `field`.
///
/// A lone entry wins unconditionally. Otherwise a curated reference decides,
/// falling back to the `best == 1` flag.
pub fn select_entry<'a>(field: &str, entries: &'a [ValueEntry], overrides: &Curation) -> Option<&'a ValueEntry> {
    if let [only] = entries {
        return Some(only);
    }
    match overrides.get(field) {
        Some(reference) => entries
            .iter()
            .find(|e| e.reference.as_deref() == Some(reference)),
        None => entries.iter().find(|e| e.is_best()),
    }
}

pub struct Materializer<'u> {
    units: &'u UnitRegistry,
}

impl<'u> Materializer<'u> {
    pub fn new(units: &'u UnitRegistry) -> Self {
        Materializer { units }
    }

    pub fn materialize<'a, I>(&self, documents: I, overrides: &Curation, order: ColumnOrder) -> Table
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let rows = documents
            .into_iter()
            .map(|doc| self.materialize_row(doc, overrides))
            .collect();
        Table::from_rows(rows, order)
    }

    pub fn materialize_row(&self, document: &Document, overrides: &Curation) -> Row {
        let mut row = Row::with_capacity(document.len());
        for (field, value) in document.fields() {
            let cell = match value {
                FieldValue::Scalar(v) => Some(Cell::Scalar(v.clone())),
                FieldValue::Entries(entries) => {
                    select_entry(field, entries, overrides).and_then(|entry| self.entry_cell(field, entry))
                }
            };
            if let Some(cell) = cell {
                row.insert(field.clone(), cell);
            }
        }
        row
    }

    fn entry_cell(&self, field: &str, entry: &ValueEntry) -> Option<Cell> {
        let value = match (entry.value, entry.distribution.as_deref()) {
            (Some(v), _) => v,
            (None, Some(samples)) => summarize_distribution(samples, None)?.value,
            (None, None) => return None,
        };

        let Some(unit) = entry.unit.as_deref() else {
            return Some(Cell::Number(value));
        };
        match self.units.quantity(value, unit) {
            Some(q) => Some(Cell::Quantity(q)),
            None => {
                warn!(field, unit, "unrecognized unit, keeping bare value");
                Some(Cell::Number(value))
            }
        }
    }
}
