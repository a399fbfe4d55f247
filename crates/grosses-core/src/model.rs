// Shared data types: calendar weeks, raw scraped tables, and the row shapes
// produced by normalization and reconciliation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;

// ---------------------------------------------------------------------------
// Calendar types
// ---------------------------------------------------------------------------

/// One reporting week of a Broadway season.
///
/// `week_start_date` is always `week_end_date - 6 days`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekRecord {
    pub season: String,
    pub week_num: u32,
    pub week_start_date: NaiveDate,
    pub week_end_date: NaiveDate,
}

impl WeekRecord {
    pub fn key(&self) -> WeekKey {
        WeekKey::new(&self.season, self.week_num)
    }

    /// Whether this record is the given `(season, week_num)` pair.
    pub fn is(&self, season: &str, week_num: u32) -> bool {
        self.season == season && self.week_num == week_num
    }
}

/// A `(season, week_num)` pair. Ordered by season label, then week.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey {
    pub season: String,
    pub week_num: u32,
}

impl WeekKey {
    pub fn new(season: &str, week_num: u32) -> Self {
        Self {
            season: season.to_string(),
            week_num,
        }
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} week {}", self.season, self.week_num)
    }
}

// ---------------------------------------------------------------------------
// Scraped table
// ---------------------------------------------------------------------------

/// A report table as scraped: optional header cells and rows of optional
/// string cells. Rows may be shorter than the header; missing trailing cells
/// read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<Option<String>>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(headers: Vec<Option<String>>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { headers, rows }
    }

    /// Cell at (`row`, `col`), or `None` when the cell is absent or null.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }
}

// ---------------------------------------------------------------------------
// Row shapes
// ---------------------------------------------------------------------------

/// A cleaned report row for one show, before calendar metadata is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub show_name: String,
    pub venue_name: String,
    pub week_end_date: NaiveDate,
    pub tw_gross: Option<Decimal>,
    pub potential_gross: Option<Decimal>,
    pub diff_tw_lw_gross: Option<Decimal>,
    pub avg_ticket_price: Option<Decimal>,
    pub max_ticket_price: Option<Decimal>,
    pub seats_sold: Option<i64>,
    pub seats_in_theater: Option<i64>,
    pub performances: Option<i64>,
    pub preview_performances: Option<i64>,
    pub pct_capacity: Option<f64>,
    pub diff_tw_lw_pct_capacity: Option<f64>,
}

/// A loadable warehouse row. Field order is the destination column order.
///
/// `season`, `week_num` and `week_start_date` are `None` when the report's
/// week-ending date is not in the calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct GrossRow {
    pub show_name: String,
    pub venue_name: String,
    pub season: Option<String>,
    pub week_num: Option<u32>,
    pub week_start_date: Option<NaiveDate>,
    pub week_end_date: NaiveDate,
    pub tw_gross: Option<Decimal>,
    pub potential_gross: Option<Decimal>,
    pub diff_tw_lw_gross: Option<Decimal>,
    pub avg_ticket_price: Option<Decimal>,
    pub max_ticket_price: Option<Decimal>,
    pub seats_sold: Option<i64>,
    pub seats_in_theater: Option<i64>,
    pub performances: Option<i64>,
    pub preview_performances: Option<i64>,
    pub pct_capacity: Option<f64>,
    pub diff_tw_lw_pct_capacity: Option<f64>,
}

impl GrossRow {
    /// Destination column names, in load order.
    pub const COLUMNS: [&'static str; 17] = [
        "show_name",
        "venue_name",
        "season",
        "week_num",
        "week_start_date",
        "week_end_date",
        "tw_gross",
        "potential_gross",
        "diff_tw_lw_gross",
        "avg_ticket_price",
        "max_ticket_price",
        "seats_sold",
        "seats_in_theater",
        "performances",
        "preview_performances",
        "pct_capacity",
        "diff_tw_lw_pct_capacity",
    ];

    /// The week this row belongs to, if it matched the calendar.
    pub fn key(&self) -> Option<WeekKey> {
        match (&self.season, self.week_num) {
            (Some(season), Some(week_num)) => Some(WeekKey::new(season, week_num)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_keys_order_by_season_then_week() {
        let mut keys = vec![
            WeekKey::new("2023-24", 1),
            WeekKey::new("2022-23", 52),
            WeekKey::new("2022-23", 3),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                WeekKey::new("2022-23", 3),
                WeekKey::new("2022-23", 52),
                WeekKey::new("2023-24", 1),
            ]
        );
    }

    #[test]
    fn raw_table_cell_handles_short_rows() {
        let table = RawTable::new(
            vec![Some("Show".into()), None],
            vec![vec![Some("Hamilton".into())]],
        );
        assert_eq!(table.cell(0, 0), Some("Hamilton"));
        assert_eq!(table.cell(0, 1), None);
        assert_eq!(table.cell(5, 0), None);
    }
}
