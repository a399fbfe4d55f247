// SQLite warehouse for weekly grosses rows.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use grosses_core::{GrossRow, WeekKey};
use regex::Regex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

static SQL_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern should compile")
});

/// Whether `name` can be spliced into SQL as a table name.
pub fn is_sql_identifier(name: &str) -> bool {
    SQL_IDENTIFIER.is_match(name)
}

// ---------------------------------------------------------------------------
// Loader seam
// ---------------------------------------------------------------------------

/// Row counts from one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub purged: usize,
    pub appended: usize,
}

/// Destination for reconciled rows.
///
/// `replace_weeks` is the operation the pipeline uses: it removes every row of
/// the given weeks and appends the new batch as one unit, so a failed load
/// leaves the store as it was.
pub trait Loader {
    /// Delete all rows whose `(season, week_num)` is in `weeks`.
    fn purge_weeks(&self, weeks: &BTreeSet<WeekKey>) -> Result<usize>;

    /// Append `rows` without touching existing data.
    fn append(&self, rows: &[GrossRow]) -> Result<usize>;

    /// Purge `weeks` and append `rows` atomically.
    fn replace_weeks(&self, weeks: &BTreeSet<WeekKey>, rows: &[GrossRow]) -> Result<LoadSummary>;
}

// ---------------------------------------------------------------------------
// Warehouse
// ---------------------------------------------------------------------------

/// SQLite-backed [`Loader`] writing to a single grosses table.
pub struct Warehouse {
    conn: Mutex<Connection>,
    table: String,
}

impl Warehouse {
    /// Open (or create) a SQLite database at `path` and ensure `table`
    /// exists. Pass `":memory:"` for an ephemeral database.
    pub fn open(path: &str, table: &str) -> Result<Self> {
        if !is_sql_identifier(table) {
            bail!("`{table}` is not a valid table name");
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS {table} (
                show_name               TEXT NOT NULL,
                venue_name              TEXT NOT NULL,
                season                  TEXT,
                week_num                INTEGER CHECK (week_num IS NULL OR week_num BETWEEN 1 AND 53),
                week_start_date         TEXT,
                week_end_date           TEXT NOT NULL,
                tw_gross                TEXT,
                potential_gross         TEXT,
                diff_tw_lw_gross        TEXT,
                avg_ticket_price        TEXT,
                max_ticket_price        TEXT,
                seats_sold              INTEGER,
                seats_in_theater        INTEGER,
                performances            INTEGER,
                preview_performances    INTEGER,
                pct_capacity            REAL,
                diff_tw_lw_pct_capacity REAL
            );

            CREATE INDEX IF NOT EXISTS {table}_season_week ON {table} (season, week_num);
            "
        ))
        .with_context(|| format!("failed to create table {table}"))?;

        debug!(path, table, "warehouse opened");

        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    /// Acquire the connection lock.
    ///
    /// Panics if the mutex is poisoned.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// All rows in insertion order.
    pub fn load_rows(&self) -> Result<Vec<GrossRow>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM {} ORDER BY rowid",
                GrossRow::COLUMNS.join(", "),
                self.table
            ))
            .context("failed to prepare load_rows query")?;

        let rows = stmt
            .query_map([], read_row)
            .context("failed to query grosses rows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map grosses rows")?;

        Ok(rows)
    }

    /// Number of stored rows for one week.
    pub fn count_week(&self, key: &WeekKey) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE season = ?1 AND week_num = ?2",
                    self.table
                ),
                params![key.season, key.week_num],
                |row| row.get(0),
            )
            .context("failed to count week rows")?;
        Ok(count as usize)
    }
}

impl Loader for Warehouse {
    fn purge_weeks(&self, weeks: &BTreeSet<WeekKey>) -> Result<usize> {
        let conn = self.conn();
        delete_weeks(&conn, &self.table, weeks).context("failed to purge weeks")
    }

    fn append(&self, rows: &[GrossRow]) -> Result<usize> {
        let conn = self.conn();
        insert_rows(&conn, &self.table, rows).context("failed to append rows")
    }

    fn replace_weeks(&self, weeks: &BTreeSet<WeekKey>, rows: &[GrossRow]) -> Result<LoadSummary> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin load transaction")?;

        let purged = delete_weeks(&tx, &self.table, weeks).context("failed to purge weeks")?;
        let appended = insert_rows(&tx, &self.table, rows).context("failed to append rows")?;

        tx.commit().context("failed to commit load")?;

        info!(
            table = %self.table,
            weeks = weeks.len(),
            purged,
            appended,
            "weeks replaced"
        );
        Ok(LoadSummary { purged, appended })
    }
}

// ---------------------------------------------------------------------------
// Statement helpers (shared by plain connections and transactions)
// ---------------------------------------------------------------------------

fn delete_weeks(
    conn: &Connection,
    table: &str,
    weeks: &BTreeSet<WeekKey>,
) -> rusqlite::Result<usize> {
    let mut stmt =
        conn.prepare(&format!("DELETE FROM {table} WHERE season = ?1 AND week_num = ?2"))?;
    let mut purged = 0;
    for key in weeks {
        purged += stmt.execute(params![key.season, key.week_num])?;
    }
    Ok(purged)
}

fn insert_rows(conn: &Connection, table: &str, rows: &[GrossRow]) -> rusqlite::Result<usize> {
    let placeholders = (1..=GrossRow::COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        GrossRow::COLUMNS.join(", ")
    ))?;

    for row in rows {
        stmt.execute(params![
            row.show_name,
            row.venue_name,
            row.season,
            row.week_num,
            row.week_start_date.map(|d| d.format(DATE_FORMAT).to_string()),
            row.week_end_date.format(DATE_FORMAT).to_string(),
            row.tw_gross.map(|d| d.to_string()),
            row.potential_gross.map(|d| d.to_string()),
            row.diff_tw_lw_gross.map(|d| d.to_string()),
            row.avg_ticket_price.map(|d| d.to_string()),
            row.max_ticket_price.map(|d| d.to_string()),
            row.seats_sold,
            row.seats_in_theater,
            row.performances,
            row.preview_performances,
            row.pct_capacity,
            row.diff_tw_lw_pct_capacity,
        ])?;
    }
    Ok(rows.len())
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<GrossRow> {
    Ok(GrossRow {
        show_name: row.get(0)?,
        venue_name: row.get(1)?,
        season: row.get(2)?,
        week_num: row.get(3)?,
        week_start_date: read_date(row, 4)?,
        week_end_date: read_date(row, 5)?.ok_or(rusqlite::Error::InvalidColumnType(
            5,
            "week_end_date".into(),
            Type::Null,
        ))?,
        tw_gross: read_decimal(row, 6)?,
        potential_gross: read_decimal(row, 7)?,
        diff_tw_lw_gross: read_decimal(row, 8)?,
        avg_ticket_price: read_decimal(row, 9)?,
        max_ticket_price: read_decimal(row, 10)?,
        seats_sold: row.get(11)?,
        seats_in_theater: row.get(12)?,
        performances: row.get(13)?,
        preview_performances: row.get(14)?,
        pct_capacity: row.get(15)?,
        diff_tw_lw_pct_capacity: row.get(16)?,
    })
}

fn read_decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        Decimal::from_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn read_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        NaiveDate::parse_from_str(&t, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
