// Season anchor table: the configuration data the week calendar is derived
// from. Loaded from TOML (`[[season]]` entries) and validated so that the
// generated calendar is chronological.

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

/// The anchor table shipped with the crate.
const BUNDLED_SEASONS: &str = include_str!("../seasons.toml");

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SeasonTableError {
    #[error("failed to parse season table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("season label `{season}` is not of the form YYYY-YY")]
    BadLabel { season: String },

    #[error("season `{season}` appears more than once")]
    Duplicate { season: String },

    #[error("season `{season}` has {total_weeks} weeks; expected 1..=53")]
    BadWeekCount { season: String, total_weeks: u32 },

    #[error("season `{season}` has week_offset {week_offset}, leaving no weeks out of {total_weeks}")]
    BadOffset {
        season: String,
        week_offset: i32,
        total_weeks: u32,
    },

    #[error("season `{season}` starts on or before the last week of `{previous}`")]
    OutOfOrder { season: String, previous: String },
}

// ---------------------------------------------------------------------------
// Anchor
// ---------------------------------------------------------------------------

/// Static description of one season.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeasonAnchor {
    pub season: String,
    /// End date of week 1 of the season.
    pub first_week_end: NaiveDate,
    #[serde(default)]
    pub week_offset: i32,
    pub total_weeks: u32,
    #[serde(default)]
    pub excluded: bool,
}

impl SeasonAnchor {
    /// Week number of the first tracked week.
    pub fn first_week_num(&self) -> u32 {
        (self.week_offset + 1).max(1) as u32
    }

    /// End date of the first tracked week.
    pub fn first_tracked_week_end(&self) -> NaiveDate {
        self.first_week_end + Duration::weeks(i64::from(self.week_offset))
    }

    /// End date of the final week of the season.
    pub fn last_week_end(&self) -> NaiveDate {
        self.first_week_end + Duration::weeks(i64::from(self.total_weeks) - 1)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SeasonFile {
    #[serde(default)]
    season: Vec<SeasonAnchor>,
}

/// Ordered, validated list of season anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonTable {
    anchors: Vec<SeasonAnchor>,
}

impl SeasonTable {
    /// Validate and wrap a list of anchors.
    pub fn new(anchors: Vec<SeasonAnchor>) -> Result<Self, SeasonTableError> {
        validate(&anchors)?;
        Ok(Self { anchors })
    }

    /// Parse a TOML document of `[[season]]` entries.
    pub fn from_toml(text: &str) -> Result<Self, SeasonTableError> {
        let file: SeasonFile = toml::from_str(text)?;
        Self::new(file.season)
    }

    /// The table bundled with this crate.
    pub fn bundled() -> Result<Self, SeasonTableError> {
        Self::from_toml(BUNDLED_SEASONS)
    }

    pub fn anchors(&self) -> &[SeasonAnchor] {
        &self.anchors
    }

    /// Anchors that contribute weeks to the calendar.
    pub fn tracked(&self) -> impl Iterator<Item = &SeasonAnchor> + Clone + '_ {
        self.anchors.iter().filter(|a| !a.excluded)
    }

    pub fn get(&self, season: &str) -> Option<&SeasonAnchor> {
        self.anchors.iter().find(|a| a.season == season)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// `YYYY-YY` shape of a season label, capturing both years.
pub static SEASON_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})$").expect("season label pattern should compile")
});

/// `YYYY-YY` where the short year follows the long one.
pub fn is_valid_season_label(label: &str) -> bool {
    let Some(years) = SEASON_LABEL.captures(label) else {
        return false;
    };
    match (years[1].parse::<u32>(), years[2].parse::<u32>()) {
        (Ok(start), Ok(end)) => (start + 1) % 100 == end,
        _ => false,
    }
}

fn validate(anchors: &[SeasonAnchor]) -> Result<(), SeasonTableError> {
    let mut seen = HashSet::new();
    let mut previous: Option<&SeasonAnchor> = None;

    for anchor in anchors {
        if !is_valid_season_label(&anchor.season) {
            return Err(SeasonTableError::BadLabel {
                season: anchor.season.clone(),
            });
        }
        if !seen.insert(anchor.season.as_str()) {
            return Err(SeasonTableError::Duplicate {
                season: anchor.season.clone(),
            });
        }

        // Excluded seasons only need a well-formed, unique label.
        if anchor.excluded {
            continue;
        }

        if anchor.total_weeks == 0 || anchor.total_weeks > 53 {
            return Err(SeasonTableError::BadWeekCount {
                season: anchor.season.clone(),
                total_weeks: anchor.total_weeks,
            });
        }
        if anchor.week_offset < 0 || anchor.week_offset as u32 >= anchor.total_weeks {
            return Err(SeasonTableError::BadOffset {
                season: anchor.season.clone(),
                week_offset: anchor.week_offset,
                total_weeks: anchor.total_weeks,
            });
        }

        if let Some(prev) = previous {
            if anchor.first_tracked_week_end() <= prev.last_week_end() {
                return Err(SeasonTableError::OutOfOrder {
                    season: anchor.season.clone(),
                    previous: prev.season.clone(),
                });
            }
        }
        previous = Some(anchor);
    }

    Ok(())
}
