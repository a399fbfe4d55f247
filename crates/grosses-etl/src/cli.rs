// Command-line arguments and week selection.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use clap::Parser;
use grosses_core::{
    most_recent_completed_week, weeks_in_range, CalendarError, SeasonTable, WeekRecord,
    SEASON_LABEL,
};
use regex::Regex;
use thiserror::Error;

/// Load weekly Broadway grosses into the warehouse.
///
/// With no positional arguments the most recently completed week is loaded.
/// With four, every week from the first (season, week) through the second is
/// loaded, inclusive.
#[derive(Debug, Parser)]
#[command(name = "bway-grosses", version)]
pub struct Cli {
    /// First season of the range, e.g. 2022-23
    #[arg(
        value_parser = parse_season,
        requires_all = ["week_num_start", "season_end", "week_num_end"]
    )]
    pub season_start: Option<String>,

    /// First week number (1-53)
    #[arg(value_parser = parse_week_num)]
    pub week_num_start: Option<u32>,

    /// Last season of the range
    #[arg(value_parser = parse_season)]
    pub season_end: Option<String>,

    /// Last week number (1-53)
    #[arg(value_parser = parse_week_num)]
    pub week_num_end: Option<u32>,

    /// Directory holding config/ (and defaults/ to seed it from).
    ///
    /// Defaults to the working directory when it has config/ or defaults/,
    /// otherwise to the bway-grosses crate directory this binary was built from.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Extract and print a summary without writing to the database
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Base directory for configuration, given the process working directory.
    pub fn config_base(&self, cwd: &Path) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }
        if cwd.join("config").is_dir() || cwd.join("defaults").is_dir() {
            return cwd.to_path_buf();
        }
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    }

    pub fn selection(&self) -> WeekSelection {
        match (
            &self.season_start,
            self.week_num_start,
            &self.season_end,
            self.week_num_end,
        ) {
            (Some(season_start), Some(week_start), Some(season_end), Some(week_end)) => {
                WeekSelection::Range {
                    season_start: season_start.clone(),
                    week_start,
                    season_end: season_end.clone(),
                    week_end,
                }
            }
            _ => WeekSelection::MostRecent,
        }
    }
}

static WEEK_NUM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[1-9]|[1-4][0-9]|5[0-3])$").expect("week number pattern should compile")
});

fn parse_season(s: &str) -> Result<String, String> {
    if SEASON_LABEL.is_match(s) {
        Ok(s.to_string())
    } else {
        Err(format!("`{s}` is not a season; expected YYYY-YY, e.g. 2022-23"))
    }
}

fn parse_week_num(s: &str) -> Result<u32, String> {
    if WEEK_NUM.is_match(s) {
        s.parse().map_err(|e| format!("`{s}`: {e}"))
    } else {
        Err(format!("`{s}` is not a week number; expected 1 through 53"))
    }
}

// ---------------------------------------------------------------------------
// Week selection
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no completed week found in the season calendar; the season table may need the current season added")]
    NoCompletedWeek,

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Which weeks a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeekSelection {
    MostRecent,
    Range {
        season_start: String,
        week_start: u32,
        season_end: String,
        week_end: u32,
    },
}

impl WeekSelection {
    /// Resolve against the calendar. `now` is local wall-clock time.
    pub fn resolve(
        &self,
        seasons: &SeasonTable,
        now: NaiveDateTime,
    ) -> Result<Vec<WeekRecord>, SelectionError> {
        match self {
            WeekSelection::MostRecent => most_recent_completed_week(seasons, now)
                .map(|week| vec![week])
                .ok_or(SelectionError::NoCompletedWeek),
            WeekSelection::Range {
                season_start,
                week_start,
                season_end,
                week_end,
            } => Ok(weeks_in_range(
                seasons,
                season_start,
                *week_start,
                season_end,
                *week_end,
            )?),
        }
    }
}
