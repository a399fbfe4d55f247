// Extract → transform → load driver for a list of report weeks.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use grosses_core::{generate_calendar, normalize, reconcile, Reconciled, SeasonTable, WeekRecord};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ThrottleConfig;
use crate::db::{LoadSummary, Loader};
use crate::fetch::Fetcher;
use crate::parse::parse_report;

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

/// Random pause between consecutive report fetches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throttle {
    min_secs: f64,
    max_secs: f64,
}

impl Throttle {
    pub fn new(config: &ThrottleConfig) -> Self {
        Self {
            min_secs: config.min_secs,
            max_secs: config.max_secs,
        }
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self {
            min_secs: 0.0,
            max_secs: 0.0,
        }
    }

    /// A duration drawn uniformly from `[min_secs, max_secs]`.
    pub fn jitter(&self) -> Duration {
        let secs = if self.max_secs > self.min_secs {
            rand::thread_rng().gen_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };
        Duration::from_secs_f64(secs.max(0.0))
    }

    async fn pause(&self) {
        let delay = self.jitter();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// What a run extracted and (unless it was a dry run) loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub weeks_requested: usize,
    pub rows: usize,
    pub unmatched_rows: usize,
    /// `"<season> week <n>"` for every week that was (or would be) replaced.
    pub weeks_touched: Vec<String>,
    /// `None` when nothing was loaded.
    pub load: Option<LoadSummary>,
}

impl RunSummary {
    /// Summary of an extracted batch that has not been loaded.
    pub fn from_batch(weeks_requested: usize, batch: &Reconciled) -> Self {
        Self {
            weeks_requested,
            rows: batch.rows.len(),
            unmatched_rows: batch.unmatched(),
            weeks_touched: batch.weeks_touched.iter().map(ToString::to_string).collect(),
            load: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Fetch, parse, normalize and reconcile every week in `weeks`, in order.
///
/// Any failure aborts the whole batch; nothing is returned for a partial run.
/// A page whose report date was already extracted in this batch is skipped,
/// so a week is never appended twice.
pub async fn extract<F>(
    fetcher: &F,
    seasons: &SeasonTable,
    weeks: &[WeekRecord],
    throttle: &Throttle,
) -> Result<Reconciled>
where
    F: Fetcher + ?Sized,
{
    let mut batch = Reconciled::default();
    let mut seen_dates = HashSet::new();

    for (i, week) in weeks.iter().enumerate() {
        if i > 0 {
            throttle.pause().await;
        }

        info!(
            season = %week.season,
            week_num = week.week_num,
            week_end = %week.week_end_date,
            "extracting week"
        );

        let html = fetcher
            .fetch(week.week_end_date)
            .await
            .with_context(|| format!("failed to fetch report for {}", week.key()))?;
        let report = parse_report(&html)
            .with_context(|| format!("failed to parse report for {}", week.key()))?;

        if report.week_end_date != week.week_end_date {
            warn!(
                requested = %week.week_end_date,
                reported = %report.week_end_date,
                "report date differs from requested week"
            );
        }
        if let Some(printed) = report.week_num.filter(|n| *n != week.week_num) {
            warn!(
                requested = week.week_num,
                reported = printed,
                "report week number differs from calendar"
            );
        }

        if !seen_dates.insert(report.week_end_date) {
            warn!(
                requested = %week.week_end_date,
                reported = %report.week_end_date,
                "report date already extracted in this run; skipping page"
            );
            continue;
        }

        let rows = normalize(&report.table, report.week_end_date);
        info!(rows = rows.len(), "report normalized");

        batch.merge(reconcile(rows, generate_calendar(seasons)));
    }

    Ok(batch)
}

/// Replace the touched weeks in `loader` with `batch`. Writes nothing when
/// the batch is empty.
pub fn load<L>(loader: &L, batch: &Reconciled) -> Result<Option<LoadSummary>>
where
    L: Loader + ?Sized,
{
    if batch.is_empty() {
        warn!("no rows extracted; nothing to load");
        return Ok(None);
    }

    let summary = loader
        .replace_weeks(&batch.weeks_touched, &batch.rows)
        .context("failed to load rows")?;
    Ok(Some(summary))
}

/// Extract `weeks` and load them.
pub async fn run<F, L>(
    fetcher: &F,
    loader: &L,
    seasons: &SeasonTable,
    weeks: &[WeekRecord],
    throttle: &Throttle,
) -> Result<RunSummary>
where
    F: Fetcher + ?Sized,
    L: Loader + ?Sized,
{
    let batch = extract(fetcher, seasons, weeks, throttle).await?;
    let mut summary = RunSummary::from_batch(weeks.len(), &batch);
    summary.load = load(loader, &batch)?;
    Ok(summary)
}
