use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::Connection;
use tracing::info;

use crate::dataset::{Cell, Table};
use crate::sink::Sink;

const TABLE: &str = "listings";

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

fn column_type(column: &str) -> &'static str {
    match column {
        "id" => "TEXT PRIMARY KEY",
        "bedroom_count" => "INTEGER",
        "price_value" | "area_value" | "price_per_unit_area" => "REAL",
        _ => "TEXT",
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Create the listings table, or add any facet columns a previous run
/// did not have.
pub fn ensure_schema(conn: &Connection, columns: &[String]) -> Result<()> {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote(c), column_type(c)))
        .collect();
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (
            {},
            collected_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
        defs.join(",\n            ")
    ))?;

    let existing = existing_columns(conn)?;
    for column in columns.iter().filter(|c| !existing.contains(c)) {
        conn.execute_batch(&format!(
            "ALTER TABLE {TABLE} ADD COLUMN {} {}",
            quote(column),
            column_type(column)
        ))?;
    }
    Ok(())
}

fn existing_columns(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({TABLE})"))?;
    let rows = stmt
        .query_map([], |row| row.get(1))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(rows)
}

fn to_sql(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Text(s) => Value::Text(s.clone()),
        Cell::Int(i) => Value::Integer(*i),
        Cell::Float(f) => Value::Real(*f),
    }
}

pub fn save_table(conn: &Connection, table: &Table) -> Result<usize> {
    ensure_schema(conn, &table.columns)?;

    let names: Vec<String> = table.columns.iter().map(|c| quote(c)).collect();
    let params: Vec<String> = (1..=table.columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT OR REPLACE INTO {TABLE} ({}) VALUES ({})",
        names.join(", "),
        params.join(", ")
    );

    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(&sql)?;
        for row in &table.rows {
            let values: Vec<Value> = row.iter().map(to_sql).collect();
            count += stmt.execute(rusqlite::params_from_iter(values))?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for SqliteSink {
    fn write(&mut self, table: &Table) -> Result<()> {
        let conn = connect(&self.path)?;
        let n = save_table(&conn, table)?;
        info!("Saved {} rows to {}", n, self.path.display());
        Ok(())
    }
}
