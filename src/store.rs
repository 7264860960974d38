//! Append-only SQLite sink for enriched snapshots.

use crate::indicators::Snapshot;
use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use std::path::Path;
use tracing::{debug, info};

pub const TABLE_NAME: &str = "stock_prices";

/// Column layout of `stock_prices`, one entry per `PriceObservation` field.
const COLUMNS: &[(&str, &str)] = &[
    ("Ticker", "TEXT NOT NULL"),
    ("Datetime", "TEXT NOT NULL"),
    ("Open", "REAL"),
    ("High", "REAL"),
    ("Low", "REAL"),
    ("Close", "REAL NOT NULL"),
    ("Volume", "INTEGER"),
    ("MA20", "REAL NOT NULL"),
    ("MA50", "REAL NOT NULL"),
];

pub struct PriceStore {
    conn: Connection,
    table_ready: bool,
}

impl PriceStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        info!(path = %path.display(), "price store opened");
        Ok(Self {
            conn,
            table_ready: false,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            table_ready: false,
        })
    }

    fn ensure_table(&mut self) -> Result<()> {
        if self.table_ready {
            return Ok(());
        }
        let columns = COLUMNS
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {TABLE_NAME} ({columns});"
            ))
            .context("failed to create stock_prices table")?;
        self.table_ready = true;
        Ok(())
    }

    /// Appends every row of the snapshot in one transaction. Rows are never
    /// deduplicated; polling the same minute twice stores it twice.
    pub fn append(&mut self, snapshot: &Snapshot) -> Result<usize> {
        if snapshot.is_empty() {
            return Ok(0);
        }
        self.ensure_table()?;

        let names = COLUMNS.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", ");
        let placeholders = (1..=COLUMNS.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO {TABLE_NAME} ({names}) VALUES ({placeholders})");

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in snapshot.rows() {
                stmt.execute(params![
                    row.ticker,
                    row.datetime.to_rfc3339(),
                    row.open,
                    row.high,
                    row.low,
                    row.close,
                    row.volume,
                    row.ma20,
                    row.ma50,
                ])
                .with_context(|| format!("failed to insert row for {}", row.ticker))?;
            }
        }
        tx.commit()?;

        debug!(rows = snapshot.len(), "appended snapshot");
        Ok(snapshot.len())
    }

    /// Total rows stored so far; zero before the table exists.
    pub fn row_count(&self) -> Result<u64> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![TABLE_NAME],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(0);
        }
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {TABLE_NAME}"), [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
