// Broadway week calendar.
//
// Expands the season table into (season, week_num, start, end) records and
// answers the two selection queries the loader needs: the most recently
// completed week, and an inclusive range between two (season, week) points.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::model::{WeekKey, WeekRecord};
use crate::season::{SeasonAnchor, SeasonTable};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("{season} week {week_num} is not in the calendar")]
    UnknownWeek { season: String, week_num: u32 },

    #[error("range start {start} comes after range end {end}")]
    ReversedRange { start: WeekKey, end: WeekKey },
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Lazy iterator over every tracked week, in season-table order. Cloning it
/// restarts from the clone point.
#[derive(Debug, Clone)]
pub struct CalendarIter<'a> {
    anchors: std::slice::Iter<'a, SeasonAnchor>,
    current: Option<SeasonCursor<'a>>,
}

#[derive(Debug, Clone)]
struct SeasonCursor<'a> {
    anchor: &'a SeasonAnchor,
    week_num: u32,
    week_end: NaiveDate,
}

impl<'a> Iterator for CalendarIter<'a> {
    type Item = WeekRecord;

    fn next(&mut self) -> Option<WeekRecord> {
        loop {
            if let Some(cursor) = &mut self.current {
                if cursor.week_num <= cursor.anchor.total_weeks {
                    let record = WeekRecord {
                        season: cursor.anchor.season.clone(),
                        week_num: cursor.week_num,
                        week_start_date: cursor.week_end - Duration::days(6),
                        week_end_date: cursor.week_end,
                    };
                    cursor.week_num += 1;
                    cursor.week_end += Duration::days(7);
                    return Some(record);
                }
            }

            let anchor = self.anchors.by_ref().find(|a| !a.excluded)?;
            self.current = Some(SeasonCursor {
                anchor,
                week_num: anchor.first_week_num(),
                week_end: anchor.first_tracked_week_end(),
            });
        }
    }
}

/// Every tracked week of every non-excluded season.
pub fn generate_calendar(table: &SeasonTable) -> CalendarIter<'_> {
    CalendarIter {
        anchors: table.anchors().iter(),
        current: None,
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// The week that ended most recently, at least one full day before `now`.
///
/// Week-ending dates are taken at midnight, so a week ending Sunday counts as
/// complete from Monday midnight onward. Returns `None` when no week in the
/// calendar qualifies (clock before the first season, for instance).
pub fn most_recent_completed_week(table: &SeasonTable, now: NaiveDateTime) -> Option<WeekRecord> {
    generate_calendar(table)
        .filter_map(|week| {
            let age = now - week.week_end_date.and_time(NaiveTime::MIN);
            (age >= Duration::days(1)).then_some((age, week))
        })
        .min_by_key(|(age, _)| *age)
        .map(|(_, week)| week)
}

/// All weeks from `(season_start, week_start)` through `(season_end,
/// week_end)` inclusive, in calendar order.
pub fn weeks_in_range(
    table: &SeasonTable,
    season_start: &str,
    week_start: u32,
    season_end: &str,
    week_end: u32,
) -> Result<Vec<WeekRecord>, CalendarError> {
    let weeks: Vec<WeekRecord> = generate_calendar(table).collect();

    let position = |season: &str, week_num: u32| {
        weeks
            .iter()
            .position(|w| w.is(season, week_num))
            .ok_or_else(|| CalendarError::UnknownWeek {
                season: season.to_string(),
                week_num,
            })
    };

    let start = position(season_start, week_start)?;
    let end = position(season_end, week_end)?;

    if start > end {
        return Err(CalendarError::ReversedRange {
            start: WeekKey::new(season_start, week_start),
            end: WeekKey::new(season_end, week_end),
        });
    }

    Ok(weeks.into_iter().skip(start).take(end - start + 1).collect())
}
