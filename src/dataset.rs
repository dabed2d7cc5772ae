// src/dataset.rs

use rusqlite::{Connection, Result as SqliteResult, params};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One flat row of the Orders relation. Mirrors the order record plus the
/// enrichment columns; `order_number` is the join key for the other two
/// relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    pub order_number: Option<String>,
    pub total_price: Option<String>,
    pub order_date_time: Option<String>,
    pub payment_method: Option<String>,
    pub total_amount: Option<String>,
    pub vat_amount: Option<String>,
    pub change_due: Option<String>,
    pub vat_number: Option<String>,
    pub receipt_print_id: Option<String>,
    pub weather: String,
    pub game_day: String,
}

/// One flat row of the Items relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub order_number: Option<String>,
    pub quantity: String,
    pub name: String,
    pub price: String,
    pub vat_rate: String,
    pub vat_amount: String,
}

/// One flat row of the VAT Summary relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatRow {
    pub order_number: Option<String>,
    pub vat_rate: String,
    pub amount: String,
}

/// The three normalized relations produced by one batch run.
///
/// No referential integrity is enforced beyond carrying the join key: an
/// item or VAT row whose `order_number` has no matching orders row is
/// permitted and must not crash any rollup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateDataset {
    pub orders: Vec<OrderRow>,
    pub items: Vec<ItemRow>,
    pub vat_summary: Vec<VatRow>,
}

/// SQLite-backed store for the aggregate dataset artifact.
pub struct DatasetStore {
    conn: Connection,
    path: String,
}

impl DatasetStore {
    pub fn new(db_path: &str) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS orders (
                order_number TEXT,
                total_price TEXT,
                order_date_time TEXT,
                payment_method TEXT,
                total_amount TEXT,
                vat_amount TEXT,
                change_due TEXT,
                vat_number TEXT,
                receipt_print_id TEXT,
                weather TEXT NOT NULL DEFAULT '',
                game_day TEXT NOT NULL DEFAULT ''
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                order_number TEXT,
                quantity TEXT NOT NULL,
                name TEXT NOT NULL,
                price TEXT NOT NULL,
                vat_rate TEXT NOT NULL,
                vat_amount TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS vat_summary (
                order_number TEXT,
                vat_rate TEXT NOT NULL,
                amount TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_items_order_number ON items(order_number)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_vat_summary_order_number ON vat_summary(order_number)",
            [],
        )?;

        info!(path = %db_path, "Dataset store initialized");
        Ok(Self {
            conn,
            path: db_path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Replace the entire persisted dataset with the given one.
    ///
    /// All three relations are written in a single transaction: either the
    /// whole dataset is committed or the artifact keeps its previous
    /// contents. Last writer wins; the store provides no locking.
    pub fn replace_dataset(&mut self, dataset: &AggregateDataset) -> SqliteResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM orders", [])?;
        tx.execute("DELETE FROM items", [])?;
        tx.execute("DELETE FROM vat_summary", [])?;

        for row in &dataset.orders {
            tx.execute(
                "INSERT INTO orders
                    (order_number, total_price, order_date_time, payment_method,
                     total_amount, vat_amount, change_due, vat_number,
                     receipt_print_id, weather, game_day)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    row.order_number,
                    row.total_price,
                    row.order_date_time,
                    row.payment_method,
                    row.total_amount,
                    row.vat_amount,
                    row.change_due,
                    row.vat_number,
                    row.receipt_print_id,
                    row.weather,
                    row.game_day,
                ],
            )?;
        }

        for row in &dataset.items {
            tx.execute(
                "INSERT INTO items (order_number, quantity, name, price, vat_rate, vat_amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.order_number,
                    row.quantity,
                    row.name,
                    row.price,
                    row.vat_rate,
                    row.vat_amount,
                ],
            )?;
        }

        for row in &dataset.vat_summary {
            tx.execute(
                "INSERT INTO vat_summary (order_number, vat_rate, amount)
                 VALUES (?1, ?2, ?3)",
                params![row.order_number, row.vat_rate, row.amount],
            )?;
        }

        tx.commit()?;
        info!(
            orders = dataset.orders.len(),
            items = dataset.items.len(),
            vat_rows = dataset.vat_summary.len(),
            "Dataset replaced"
        );
        Ok(())
    }

    /// Load all three relations back, in insertion order.
    ///
    /// Rows that fail structural checks on read (a required column that
    /// cannot be decoded) are logged and skipped, matching the
    /// drop-and-continue behavior of the extraction stage.
    pub fn load_dataset(&self) -> SqliteResult<AggregateDataset> {
        Ok(AggregateDataset {
            orders: self.load_orders()?,
            items: self.load_items()?,
            vat_summary: self.load_vat_summary()?,
        })
    }

    fn load_orders(&self) -> SqliteResult<Vec<OrderRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT order_number, total_price, order_date_time, payment_method,
                    total_amount, vat_amount, change_due, vat_number,
                    receipt_print_id, weather, game_day
             FROM orders ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(OrderRow {
                order_number: row.get(0)?,
                total_price: row.get(1)?,
                order_date_time: row.get(2)?,
                payment_method: row.get(3)?,
                total_amount: row.get(4)?,
                vat_amount: row.get(5)?,
                change_due: row.get(6)?,
                vat_number: row.get(7)?,
                receipt_print_id: row.get(8)?,
                weather: row.get(9)?,
                game_day: row.get(10)?,
            })
        })?;
        Ok(Self::collect_valid(rows, "orders"))
    }

    fn load_items(&self) -> SqliteResult<Vec<ItemRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT order_number, quantity, name, price, vat_rate, vat_amount
             FROM items ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ItemRow {
                order_number: row.get(0)?,
                quantity: row.get(1)?,
                name: row.get(2)?,
                price: row.get(3)?,
                vat_rate: row.get(4)?,
                vat_amount: row.get(5)?,
            })
        })?;
        Ok(Self::collect_valid(rows, "items"))
    }

    fn load_vat_summary(&self) -> SqliteResult<Vec<VatRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT order_number, vat_rate, amount FROM vat_summary ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(VatRow {
                order_number: row.get(0)?,
                vat_rate: row.get(1)?,
                amount: row.get(2)?,
            })
        })?;
        Ok(Self::collect_valid(rows, "vat_summary"))
    }

    fn collect_valid<T>(
        rows: impl Iterator<Item = rusqlite::Result<T>>,
        relation: &str,
    ) -> Vec<T> {
        let mut out = Vec::new();
        for row in rows {
            match row {
                Ok(row) => out.push(row),
                Err(e) => warn!(relation = relation, error = %e, "Skipping malformed row"),
            }
        }
        out
    }

    /// Row counts per relation, for run summaries.
    pub fn counts(&self) -> SqliteResult<(usize, usize, usize)> {
        let orders: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
        let items: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        let vat_rows: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM vat_summary", [], |row| row.get(0))?;
        Ok((orders, items, vat_rows))
    }
}
