use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::dataset::{Cell, Table};

/// Where a finalized table ends up.
pub trait Sink {
    fn write(&mut self, table: &Table) -> Result<()>;
}

/// Hand a finalized table to every sink, in order. An empty table is written
/// nowhere; returns whether anything was written.
pub fn write_all(table: &Table, sinks: &mut [Box<dyn Sink>]) -> Result<bool> {
    if table.is_empty() {
        return Ok(false);
    }
    for sink in sinks.iter_mut() {
        sink.write(table)?;
    }
    Ok(true)
}

/// CSV with the table's column order as header; nulls are empty cells.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for CsvSink {
    fn write(&mut self, table: &Table) -> Result<()> {
        let mut wtr = csv::Writer::from_path(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        wtr.write_record(&table.columns)?;
        for row in &table.rows {
            wtr.write_record(row.iter().map(|c| c.to_string()))?;
        }
        wtr.flush()?;
        info!("Wrote {} rows to {}", table.len(), self.path.display());
        Ok(())
    }
}

const INT_COLUMNS: &[&str] = &["bedroom_count"];
const FLOAT_COLUMNS: &[&str] = &["price_value", "area_value", "price_per_unit_area"];

/// Load a CSV written by [`CsvSink`] back into a table, restoring numeric
/// core columns.
pub fn read_csv(path: &Path) -> Result<Table> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row = columns
            .iter()
            .zip(record.iter())
            .map(|(column, raw)| parse_cell(column, raw))
            .collect();
        rows.push(row);
    }
    Ok(Table { columns, rows })
}

fn parse_cell(column: &str, raw: &str) -> Cell {
    if raw.is_empty() {
        return Cell::Null;
    }
    if INT_COLUMNS.contains(&column) {
        if let Ok(i) = raw.parse() {
            return Cell::Int(i);
        }
    }
    if FLOAT_COLUMNS.contains(&column) {
        if let Ok(f) = raw.parse() {
            return Cell::Float(f);
        }
    }
    Cell::Text(raw.to_string())
}

/// Records the row count of every table it is handed.
#[cfg(test)]
pub(crate) struct RecordingSink(pub std::rc::Rc<std::cell::RefCell<Vec<usize>>>);

#[cfg(test)]
impl Sink for RecordingSink {
    fn write(&mut self, table: &Table) -> Result<()> {
        self.0.borrow_mut().push(table.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn table() -> Table {
        Table {
            columns: vec![
                "id".into(),
                "title".into(),
                "bedroom_count".into(),
                "price_value".into(),
                "Floor".into(),
            ],
            rows: vec![
                vec![
                    Cell::Text("1".into()),
                    Cell::Text("3 BHK, Dwarka".into()),
                    Cell::Int(3),
                    Cell::Float(12_500_000.0),
                    Cell::Null,
                ],
                vec![
                    Cell::Text("2".into()),
                    Cell::Null,
                    Cell::Null,
                    Cell::Float(8_500_000.5),
                    Cell::Text("3rd".into()),
                ],
            ],
        }
    }

    #[test]
    fn csv_preserves_columns_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        CsvSink::new(&path).write(&table()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,title,bedroom_count,price_value,Floor"));
        assert_eq!(lines.next(), Some("1,\"3 BHK, Dwarka\",3,12500000,"));

        assert_eq!(read_csv(&path).unwrap(), table());
    }

    #[test]
    fn empty_table_reaches_no_sink() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut sinks: Vec<Box<dyn Sink>> = vec![
            Box::new(RecordingSink(calls.clone())),
            Box::new(RecordingSink(calls.clone())),
        ];
        assert!(!write_all(&Table::default(), &mut sinks).unwrap());
        assert!(calls.borrow().is_empty());

        assert!(write_all(&table(), &mut sinks).unwrap());
        assert_eq!(*calls.borrow(), vec![2, 2]);
    }
}
