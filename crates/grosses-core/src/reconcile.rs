// Week reconciliation: attach calendar metadata to normalized rows and work
// out which (season, week) pairs a load will replace.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use crate::model::{GrossRow, NormalizedRow, WeekKey, WeekRecord};

/// Loadable rows plus the weeks they belong to. The loader purges every week
/// in `weeks_touched` before appending `rows`, so reloading a week replaces
/// it instead of duplicating it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub rows: Vec<GrossRow>,
    pub weeks_touched: BTreeSet<WeekKey>,
}

impl Reconciled {
    /// Fold another week's result into this one.
    pub fn merge(&mut self, other: Reconciled) {
        self.rows.extend(other.rows);
        self.weeks_touched.extend(other.weeks_touched);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose report date had no calendar week.
    pub fn unmatched(&self) -> usize {
        self.rows.iter().filter(|r| r.season.is_none()).count()
    }
}

/// Left-join `rows` to `calendar` on the week-ending date.
///
/// Rows whose date is not in the calendar are kept with no season, week
/// number or start date, and do not contribute to `weeks_touched`.
pub fn reconcile<I>(rows: Vec<NormalizedRow>, calendar: I) -> Reconciled
where
    I: IntoIterator<Item = WeekRecord>,
{
    let mut by_end_date: HashMap<NaiveDate, WeekRecord> = HashMap::new();
    for week in calendar {
        by_end_date.entry(week.week_end_date).or_insert(week);
    }

    let mut result = Reconciled::default();
    let mut unmatched_dates = BTreeSet::new();

    for row in rows {
        let week = by_end_date.get(&row.week_end_date);
        match week {
            Some(week) => {
                result.weeks_touched.insert(week.key());
            }
            None => {
                unmatched_dates.insert(row.week_end_date);
            }
        }

        result.rows.push(GrossRow {
            show_name: row.show_name,
            venue_name: row.venue_name,
            season: week.map(|w| w.season.clone()),
            week_num: week.map(|w| w.week_num),
            week_start_date: week.map(|w| w.week_start_date),
            week_end_date: row.week_end_date,
            tw_gross: row.tw_gross,
            potential_gross: row.potential_gross,
            diff_tw_lw_gross: row.diff_tw_lw_gross,
            avg_ticket_price: row.avg_ticket_price,
            max_ticket_price: row.max_ticket_price,
            seats_sold: row.seats_sold,
            seats_in_theater: row.seats_in_theater,
            performances: row.performances,
            preview_performances: row.preview_performances,
            pct_capacity: row.pct_capacity,
            diff_tw_lw_pct_capacity: row.diff_tw_lw_pct_capacity,
        });
    }

    for date in unmatched_dates {
        warn!(%date, "report week-ending date is not in the season calendar");
    }

    result
}
