// Broadway grosses core: season table, week calendar, row normalization and
// week reconciliation. Nothing in this crate performs I/O.

pub mod calendar;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod season;

pub use calendar::{
    generate_calendar, most_recent_completed_week, weeks_in_range, CalendarError, CalendarIter,
};
pub use model::{GrossRow, NormalizedRow, RawTable, WeekKey, WeekRecord};
pub use normalize::normalize;
pub use reconcile::{reconcile, Reconciled};
pub use season::{SeasonAnchor, SeasonTable, SeasonTableError, SEASON_LABEL};
