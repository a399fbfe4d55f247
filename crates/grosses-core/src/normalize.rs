// Report table normalization.
//
// Turns the scraped string table into typed rows: drops empty columns, maps
// the report's headers onto destination field names, and parses currency,
// count and percentage cells. A cell that does not parse becomes `None`; it
// never aborts the row and is never read as zero.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::model::{NormalizedRow, RawTable};

// ---------------------------------------------------------------------------
// Field mapping
// ---------------------------------------------------------------------------

/// Destination fields that come from report columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ShowName,
    VenueName,
    TwGross,
    PotentialGross,
    DiffTwLwGross,
    AvgTicketPrice,
    MaxTicketPrice,
    SeatsSold,
    SeatsInTheater,
    Performances,
    PreviewPerformances,
    PctCapacity,
    DiffTwLwPctCapacity,
}

const FIELD_COUNT: usize = 13;

impl Field {
    fn from_header(header: &str) -> Option<Self> {
        match header.trim() {
            "Show" => Some(Field::ShowName),
            "This Week Gross" => Some(Field::TwGross),
            "Potential Gross" => Some(Field::PotentialGross),
            "Diff $" => Some(Field::DiffTwLwGross),
            "Avg Ticket" => Some(Field::AvgTicketPrice),
            "Top Ticket" => Some(Field::MaxTicketPrice),
            "Seats Sold" => Some(Field::SeatsSold),
            "Seats in Theatre" => Some(Field::SeatsInTheater),
            "Perfs" => Some(Field::Performances),
            "Previews" => Some(Field::PreviewPerformances),
            "% Cap" => Some(Field::PctCapacity),
            "Diff % cap" => Some(Field::DiffTwLwPctCapacity),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Table column backing each field, if the report has one.
#[derive(Debug, Default)]
struct ColumnMap {
    columns: [Option<usize>; FIELD_COUNT],
}

impl ColumnMap {
    fn build(table: &RawTable) -> Self {
        let mut map = ColumnMap::default();

        let kept = (0..table.width()).filter(|&col| {
            (0..table.rows.len())
                .any(|row| table.cell(row, col).is_some_and(|c| !c.trim().is_empty()))
        });

        for (position, col) in kept.enumerate() {
            // The theatre name sits under the show name without a header of
            // its own, so it is always the second surviving column.
            let field = if position == 1 {
                Some(Field::VenueName)
            } else {
                table.headers[col].as_deref().and_then(Field::from_header)
            };
            if let Some(field) = field {
                let slot = &mut map.columns[field.index()];
                if slot.is_none() {
                    *slot = Some(col);
                }
            }
        }

        map
    }

    fn get(&self, field: Field) -> Option<usize> {
        self.columns[field.index()]
    }
}

// ---------------------------------------------------------------------------
// Cell parsers
// ---------------------------------------------------------------------------

/// `"$1,234.56"` → `1234.56`. Cells without a `$` are not money.
pub fn parse_currency(cell: &str) -> Option<Decimal> {
    if !cell.contains('$') {
        return None;
    }
    let cleaned: String = cell
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    Decimal::from_str(&cleaned).ok()
}

/// `"1,234"` → `1234`.
pub fn parse_count(cell: &str) -> Option<i64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    cleaned.parse().ok()
}

/// `"87.5%"` → `0.875`. Cells without a `%` are not percentages.
pub fn parse_percent(cell: &str) -> Option<f64> {
    if !cell.contains('%') {
        return None;
    }
    let cleaned: String = cell
        .chars()
        .filter(|c| *c != '%' && !c.is_whitespace())
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v / 100.0)
}

fn parse_cell<T>(
    row: usize,
    field: Field,
    raw: Option<&str>,
    parse: fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = raw?;
    let value = parse(raw);
    if value.is_none() && !raw.trim().is_empty() {
        debug!(row, ?field, raw, "unparseable cell left empty");
    }
    value
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a scraped report table. One output row per input row, in order,
/// each stamped with `week_end_date`.
pub fn normalize(table: &RawTable, week_end_date: NaiveDate) -> Vec<NormalizedRow> {
    let columns = ColumnMap::build(table);

    (0..table.rows.len())
        .map(|row| {
            let cell = |field: Field| columns.get(field).and_then(|col| table.cell(row, col));

            let text = |field: Field| match cell(field) {
                Some(value) => value.trim().to_string(),
                None => {
                    warn!(row, ?field, "report row is missing a text cell");
                    String::new()
                }
            };

            let money = |field: Field| parse_cell(row, field, cell(field), parse_currency);
            let count = |field: Field| parse_cell(row, field, cell(field), parse_count);
            let percent = |field: Field| parse_cell(row, field, cell(field), parse_percent);

            NormalizedRow {
                show_name: text(Field::ShowName),
                venue_name: text(Field::VenueName),
                week_end_date,
                tw_gross: money(Field::TwGross),
                potential_gross: money(Field::PotentialGross),
                diff_tw_lw_gross: money(Field::DiffTwLwGross),
                avg_ticket_price: money(Field::AvgTicketPrice),
                max_ticket_price: money(Field::MaxTicketPrice),
                seats_sold: count(Field::SeatsSold),
                seats_in_theater: count(Field::SeatsInTheater),
                performances: count(Field::Performances),
                preview_performances: count(Field::PreviewPerformances),
                pct_capacity: percent(Field::PctCapacity),
                diff_tw_lw_pct_capacity: percent(Field::DiffTwLwPctCapacity),
            }
        })
        .collect()
}
