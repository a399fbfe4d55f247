// HTML report parsing: pulls the report date, week number and grosses table
// out of a weekly report page.

use chrono::NaiveDate;
use grosses_core::RawTable;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The site serves a different week when the requested one is not
    /// published yet; that page has no selected report date.
    #[error(
        "the requested week's report is not available yet; \
         try again later, or pass a season/week range to load earlier weeks"
    )]
    ReportUnavailable,

    #[error("report date `{0}` is not a YYYY-MM-DD date")]
    BadReportDate(String),

    #[error("report page has no grosses table")]
    MissingTable,
}

/// One parsed report page.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReport {
    /// Week-ending date the page reports on.
    pub week_end_date: NaiveDate,
    /// Week number printed on the page, when present and numeric.
    pub week_num: Option<u32>,
    pub table: RawTable,
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector should parse")
}

/// Parse a report page.
///
/// The first table row becomes the header. A `th` cell contributes its link
/// text and its sub-label; a `td` cell contributes its value and its
/// sub-label. Either half is `None` when the page omits it.
pub fn parse_report(html: &str) -> Result<RawReport, ParseError> {
    let document = Html::parse_document(html);

    let date_text = document
        .select(&selector("#vault-search-results-sort-select option[selected]"))
        .next()
        .map(text_of)
        .ok_or(ParseError::ReportUnavailable)?;
    let week_end_date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
        .map_err(|_| ParseError::BadReportDate(date_text.clone()))?;

    let week_num = document
        .select(&selector("div.week-count span"))
        .next()
        .and_then(|span| {
            let digits: String = text_of(span).chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        });

    let table = document
        .select(&selector("div.vault-grosses-result table"))
        .next()
        .ok_or(ParseError::MissingTable)?;

    Ok(RawReport {
        week_end_date,
        week_num,
        table: read_table(table),
    })
}

fn read_table(table: ElementRef<'_>) -> RawTable {
    let row_sel = selector("tr");
    let cell_sel = selector("th, td");
    let link_sel = selector("a");
    let value_sel = selector("span.data-value");
    let subtext_sel = selector("span.subtext");

    let first_text = |el: ElementRef<'_>, sel: &Selector| el.select(sel).next().map(text_of);

    let mut rows = table.select(&row_sel).map(|tr| {
        tr.select(&cell_sel)
            .flat_map(|cell| {
                let main = if cell.value().name() == "th" {
                    first_text(cell, &link_sel)
                } else {
                    first_text(cell, &value_sel)
                };
                [main, first_text(cell, &subtext_sel)]
            })
            .collect::<Vec<_>>()
    });

    match rows.next() {
        Some(headers) => RawTable::new(headers, rows.collect()),
        None => RawTable::default(),
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
