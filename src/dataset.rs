use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::extract::Record;

pub const CORE_COLUMNS: [&str; 12] = [
    "id",
    "title",
    "bedroom_count",
    "price_value",
    "price_raw",
    "area_value",
    "area_raw",
    "price_per_unit_area",
    "category",
    "locality",
    "address",
    "url",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn text(value: &Option<String>) -> Self {
        value.clone().map_or(Cell::Null, Cell::Text)
    }

    fn float(value: Option<f64>) -> Self {
        value.map_or(Cell::Null, Cell::Float)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Finalized dataset: fixed core columns, then facet columns in first-seen order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom. Empty if the column is unknown.
    pub fn column<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Cell> + 'a {
        let idx = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
    }
}

/// Column name for a facet key. Keys that shadow a core column, or a column
/// already claimed by another key, gain `extra_` prefixes until unique.
fn facet_column(key: &str, taken: &HashSet<String>) -> String {
    let mut column = key.to_string();
    while CORE_COLUMNS.contains(&column.as_str()) || taken.contains(&column) {
        column = format!("extra_{column}");
    }
    column
}

pub fn price_per_unit_area(price: Option<f64>, area: Option<f64>) -> Option<f64> {
    match (price, area) {
        (Some(p), Some(a)) if a != 0.0 => Some(p / a),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct Aggregator {
    records: Vec<Record>,
    /// Facet key → index into `facet_columns`.
    facet_index: HashMap<String, usize>,
    facet_columns: Vec<String>,
    taken: HashSet<String>,
}

impl Aggregator {
    pub fn accept(&mut self, record: Record) {
        for (key, _) in &record.extra_fields {
            if self.facet_index.contains_key(key) {
                continue;
            }
            let column = facet_column(key, &self.taken);
            self.taken.insert(column.clone());
            self.facet_index.insert(key.clone(), self.facet_columns.len());
            self.facet_columns.push(column);
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Snapshot the accumulated records as a table. Calling it again without
    /// new records yields an identical table.
    pub fn finalize(&self) -> Table {
        let columns = CORE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.facet_columns.iter().cloned())
            .collect();

        let rows = self.records.iter().map(|r| self.row(r)).collect();
        Table { columns, rows }
    }

    fn row(&self, r: &Record) -> Vec<Cell> {
        let mut row = vec![
            Cell::Text(r.id.clone()),
            Cell::text(&r.title),
            r.bedroom_count.map_or(Cell::Null, |n| Cell::Int(n.into())),
            Cell::float(r.price_value),
            Cell::text(&r.price_raw),
            Cell::float(r.area_value),
            Cell::text(&r.area_raw),
            Cell::float(price_per_unit_area(r.price_value, r.area_value)),
            Cell::text(&r.category),
            Cell::text(&r.locality),
            Cell::text(&r.address),
            Cell::text(&r.url),
        ];

        let mut facets = vec![Cell::Null; self.facet_columns.len()];
        for (key, value) in &r.extra_fields {
            if let Some(&i) = self.facet_index.get(key) {
                facets[i] = Cell::text(value);
            }
        }
        row.extend(facets);
        row
    }
}
