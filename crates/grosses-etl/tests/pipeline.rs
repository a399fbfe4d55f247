// End-to-end runs of the pipeline against canned report pages and an
// in-memory warehouse.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bway_grosses::db::{LoadSummary, Loader, Warehouse};
use bway_grosses::fetch::{FetchError, Fetcher};
use bway_grosses::parse::ParseError;
use bway_grosses::pipeline::{self, Throttle};
use chrono::NaiveDate;
use grosses_core::{weeks_in_range, SeasonTable, WeekKey};
use rust_decimal::Decimal;

const REPORT: &str = include_str!("fixtures/grosses_2023-03-12.html");
const UNAVAILABLE: &str = include_str!("fixtures/grosses_unavailable.html");

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Serves fixed pages by week-ending date and records what was requested.
#[derive(Default)]
struct CannedFetcher {
    pages: HashMap<NaiveDate, String>,
    requested: Mutex<Vec<NaiveDate>>,
}

impl CannedFetcher {
    fn with_page(mut self, date: NaiveDate, html: impl Into<String>) -> Self {
        self.pages.insert(date, html.into());
        self
    }

    fn requested(&self) -> Vec<NaiveDate> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for CannedFetcher {
    async fn fetch(&self, week_end_date: NaiveDate) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(week_end_date);
        self.pages
            .get(&week_end_date)
            .cloned()
            .ok_or(FetchError::Status {
                status: 404,
                url: format!("canned://{week_end_date}"),
            })
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seasons() -> SeasonTable {
    SeasonTable::bundled().unwrap()
}

/// The fixture page re-dated to `week_end` (a YYYY-MM-DD string).
fn report_for(week_end: &str) -> String {
    REPORT.replace("2023-03-12", week_end)
}

fn warehouse() -> Warehouse {
    Warehouse::open(":memory:", "weekly_grosses").unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_week_is_loaded_with_calendar_metadata() {
    let seasons = seasons();
    let weeks = weeks_in_range(&seasons, "2022-23", 42, "2022-23", 42).unwrap();
    let fetcher = CannedFetcher::default().with_page(date(2023, 3, 12), REPORT);
    let wh = warehouse();

    let summary = pipeline::run(&fetcher, &wh, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap();

    assert_eq!(summary.weeks_requested, 1);
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.unmatched_rows, 0);
    assert_eq!(summary.weeks_touched, vec!["2022-23 week 42".to_string()]);
    assert_eq!(summary.load, Some(LoadSummary { purged: 0, appended: 2 }));

    let rows = wh.load_rows().unwrap();
    let hadestown = rows.iter().find(|r| r.show_name == "Hadestown").unwrap();
    assert_eq!(hadestown.venue_name, "Walter Kerr");
    assert_eq!(hadestown.season.as_deref(), Some("2022-23"));
    assert_eq!(hadestown.week_num, Some(42));
    assert_eq!(hadestown.week_start_date, Some(date(2023, 3, 6)));
    assert_eq!(hadestown.week_end_date, date(2023, 3, 12));
    assert_eq!(hadestown.tw_gross, Some(Decimal::new(95_012_300, 2)));
    assert_eq!(hadestown.seats_sold, Some(7_583));
    assert_eq!(hadestown.max_ticket_price, Some(Decimal::new(29_900, 2)));
    assert!((hadestown.pct_capacity.unwrap() - 0.972).abs() < 1e-9);

    let six = rows.iter().find(|r| r.show_name == "Six").unwrap();
    assert_eq!(six.diff_tw_lw_gross, Some(Decimal::new(-820_000, 2)));
    assert_eq!(six.seats_in_theater, Some(1_250));
}

#[tokio::test]
async fn reloading_a_week_does_not_duplicate_rows() {
    let seasons = seasons();
    let weeks = weeks_in_range(&seasons, "2022-23", 42, "2022-23", 42).unwrap();
    let wh = warehouse();

    let first = CannedFetcher::default().with_page(date(2023, 3, 12), REPORT);
    pipeline::run(&first, &wh, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap();

    let revised = REPORT.replace("$950,123.00", "$960,000.00");
    let second = CannedFetcher::default().with_page(date(2023, 3, 12), revised);
    let summary = pipeline::run(&second, &wh, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap();

    assert_eq!(summary.load, Some(LoadSummary { purged: 2, appended: 2 }));
    assert_eq!(wh.count_week(&WeekKey::new("2022-23", 42)).unwrap(), 2);

    let rows = wh.load_rows().unwrap();
    let hadestown = rows.iter().find(|r| r.show_name == "Hadestown").unwrap();
    assert_eq!(hadestown.tw_gross, Some(Decimal::new(960_000, 0)));
}

#[tokio::test]
async fn range_fetches_every_week_in_order() {
    let seasons = seasons();
    let weeks = weeks_in_range(&seasons, "2022-23", 41, "2022-23", 43).unwrap();
    let fetcher = CannedFetcher::default()
        .with_page(date(2023, 3, 5), report_for("2023-03-05"))
        .with_page(date(2023, 3, 12), report_for("2023-03-12"))
        .with_page(date(2023, 3, 19), report_for("2023-03-19"));
    let wh = warehouse();

    let summary = pipeline::run(&fetcher, &wh, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap();

    assert_eq!(
        fetcher.requested(),
        vec![date(2023, 3, 5), date(2023, 3, 12), date(2023, 3, 19)]
    );
    assert_eq!(summary.rows, 6);
    assert_eq!(
        summary.weeks_touched,
        vec!["2022-23 week 41", "2022-23 week 42", "2022-23 week 43"]
    );
    for week_num in 41..=43 {
        assert_eq!(wh.count_week(&WeekKey::new("2022-23", week_num)).unwrap(), 2);
    }
}

#[tokio::test]
async fn failure_mid_range_loads_nothing() {
    let seasons = seasons();
    let weeks = weeks_in_range(&seasons, "2022-23", 41, "2022-23", 43).unwrap();
    // Week 43 is missing.
    let fetcher = CannedFetcher::default()
        .with_page(date(2023, 3, 5), report_for("2023-03-05"))
        .with_page(date(2023, 3, 12), report_for("2023-03-12"));
    let wh = warehouse();

    let err = pipeline::run(&fetcher, &wh, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("2022-23 week 43"), "{err:#}");
    assert!(wh.load_rows().unwrap().is_empty());
}

#[tokio::test]
async fn unavailable_report_stops_the_run() {
    let seasons = seasons();
    let weeks = weeks_in_range(&seasons, "2022-23", 42, "2022-23", 42).unwrap();
    let fetcher = CannedFetcher::default().with_page(date(2023, 3, 12), UNAVAILABLE);
    let wh = warehouse();

    let err = pipeline::run(&fetcher, &wh, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap_err();

    assert_eq!(
        err.root_cause().downcast_ref::<ParseError>(),
        Some(&ParseError::ReportUnavailable)
    );
    assert!(wh.load_rows().unwrap().is_empty());
}

#[tokio::test]
async fn pages_sharing_a_report_date_load_that_week_once() {
    let seasons = seasons();
    let weeks = weeks_in_range(&seasons, "2022-23", 41, "2022-23", 42).unwrap();
    // The site answers the week 41 request with the week 42 page as well.
    let fetcher = CannedFetcher::default()
        .with_page(date(2023, 3, 5), report_for("2023-03-12"))
        .with_page(date(2023, 3, 12), report_for("2023-03-12"));
    let wh = warehouse();

    let summary = pipeline::run(&fetcher, &wh, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap();

    assert_eq!(fetcher.requested(), vec![date(2023, 3, 5), date(2023, 3, 12)]);
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.weeks_touched, vec!["2022-23 week 42"]);
    assert_eq!(summary.load, Some(LoadSummary { purged: 0, appended: 2 }));
    assert_eq!(wh.count_week(&WeekKey::new("2022-23", 42)).unwrap(), 2);
    assert_eq!(wh.count_week(&WeekKey::new("2022-23", 41)).unwrap(), 0);

    // Reloading the same pair of pages still leaves a single copy.
    pipeline::run(&fetcher, &wh, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap();
    assert_eq!(wh.count_week(&WeekKey::new("2022-23", 42)).unwrap(), 2);
}

#[tokio::test]
async fn report_for_uncalendared_date_is_kept_without_purge() {
    let seasons = seasons();
    let weeks = weeks_in_range(&seasons, "2022-23", 42, "2022-23", 42).unwrap();
    // The site answers with a page dated a Wednesday, which is no calendar week.
    let fetcher =
        CannedFetcher::default().with_page(date(2023, 3, 12), report_for("2023-03-15"));
    let wh = warehouse();

    let summary = pipeline::run(&fetcher, &wh, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap();

    assert_eq!(summary.unmatched_rows, 2);
    assert!(summary.weeks_touched.is_empty());
    assert_eq!(summary.load, Some(LoadSummary { purged: 0, appended: 2 }));

    let rows = wh.load_rows().unwrap();
    assert!(rows.iter().all(|r| r.season.is_none() && r.week_num.is_none()));
    assert!(rows.iter().all(|r| r.week_end_date == date(2023, 3, 15)));
}

#[tokio::test]
async fn empty_report_writes_nothing() {
    let seasons = seasons();
    let weeks = weeks_in_range(&seasons, "2022-23", 42, "2022-23", 42).unwrap();
    let empty = r#"<select id="vault-search-results-sort-select">
        <option selected>2023-03-12</option></select>
        <div class="vault-grosses-result"><table><tr><th><a>Show</a></th></tr></table></div>"#;
    let fetcher = CannedFetcher::default().with_page(date(2023, 3, 12), empty);
    let wh = warehouse();

    let summary = pipeline::run(&fetcher, &wh, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap();

    assert_eq!(summary.rows, 0);
    assert_eq!(summary.load, None);
}

#[tokio::test]
async fn extract_alone_leaves_the_loader_untouched() {
    let seasons = seasons();
    let weeks = weeks_in_range(&seasons, "2022-23", 42, "2022-23", 42).unwrap();
    let fetcher = CannedFetcher::default().with_page(date(2023, 3, 12), REPORT);
    let wh = warehouse();

    let batch = pipeline::extract(&fetcher, &seasons, &weeks, &Throttle::none())
        .await
        .unwrap();

    assert_eq!(batch.rows.len(), 2);
    assert!(wh.load_rows().unwrap().is_empty());

    // The batch can still be loaded afterwards.
    let summary = pipeline::load(&wh, &batch).unwrap();
    assert_eq!(summary, Some(LoadSummary { purged: 0, appended: 2 }));
    assert_eq!(wh.purge_weeks(&batch.weeks_touched).unwrap(), 2);
}
