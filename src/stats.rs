//! Win/draw/loss statistics over a results sheet.
//!
//! Rows are counted by the value of their status column and bucketed by
//! the month of their match date. A row with a valid status but an
//! unreadable date still counts towards the total; it is only left out of
//! the monthly buckets.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::StatsError;

lazy_static! {
    static ref DOTTED_DATE: Regex = Regex::new(r"^\d{2}\.\d{2}\.\d{4}$").unwrap();
}

/// Header searched for the result of each match (case-insensitive)
pub const STATUS_HEADER: &str = "status";

/// Substrings identifying the match date header (case-insensitive)
pub const DEFAULT_DATE_PATTERNS: &[&str] = &["mac", "date"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Outcome {
    W,
    D,
    L,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::W, Outcome::D, Outcome::L];

    /// Exact match after trimming; anything else is not a result
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "W" => Some(Outcome::W),
            "D" => Some(Outcome::D),
            "L" => Some(Outcome::L),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::W => "W",
            Outcome::D => "D",
            Outcome::L => "L",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    #[serde(rename = "W")]
    pub w: u32,
    #[serde(rename = "D")]
    pub d: u32,
    #[serde(rename = "L")]
    pub l: u32,
}

impl Counts {
    pub fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::W => self.w += 1,
            Outcome::D => self.d += 1,
            Outcome::L => self.l += 1,
        }
    }

    pub fn get(&self, outcome: Outcome) -> u32 {
        match outcome {
            Outcome::W => self.w,
            Outcome::D => self.d,
            Outcome::L => self.l,
        }
    }

    pub fn sum(&self) -> u32 {
        self.w + self.d + self.l
    }

    /// Share of `outcome` in percent; an empty bucket yields 0.0
    pub fn percent(&self, outcome: Outcome) -> f64 {
        let sum = self.sum();
        if sum == 0 {
            return 0.0;
        }
        self.get(outcome) as f64 / sum as f64 * 100.0
    }

    /// Percentage with one decimal place, e.g. `"33.3%"`
    ///
    /// Ties round away from zero, so 1 of 16 reads `6.3%`.
    pub fn percent_label(&self, outcome: Outcome) -> String {
        let tenths = (self.percent(outcome) * 10.0).round() / 10.0;
        format!("{:.1}%", tenths)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total: Counts,
    /// Keyed by `YYYY-MM`, ascending
    pub monthly: BTreeMap<String, Counts>,
    /// Rows counted in `total` whose date could not be read
    pub undated: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub status: Outcome,
    pub count: u32,
    pub percent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthRow {
    pub month: String,
    #[serde(rename = "W")]
    pub w: u32,
    #[serde(rename = "D")]
    pub d: u32,
    #[serde(rename = "L")]
    pub l: u32,
    pub total: u32,
}

/// Monthly W/D/L percentages, one point per month
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    #[serde(rename = "W")]
    pub w: Vec<f64>,
    #[serde(rename = "D")]
    pub d: Vec<f64>,
    #[serde(rename = "L")]
    pub l: Vec<f64>,
}

/// Everything the dashboard shows for one sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub total: Counts,
    pub monthly: BTreeMap<String, Counts>,
    pub undated: u32,
    pub summary: Vec<SummaryRow>,
    pub months: Vec<MonthRow>,
    pub series: ChartSeries,
}

impl Stats {
    pub fn summary(&self) -> Vec<SummaryRow> {
        Outcome::ALL
            .iter()
            .map(|&status| SummaryRow {
                status,
                count: self.total.get(status),
                percent: self.total.percent_label(status),
            })
            .collect()
    }

    pub fn month_rows(&self) -> Vec<MonthRow> {
        self.monthly
            .iter()
            .map(|(month, c)| MonthRow {
                month: month.clone(),
                w: c.w,
                d: c.d,
                l: c.l,
                total: c.sum(),
            })
            .collect()
    }

    pub fn series(&self) -> ChartSeries {
        let mut series = ChartSeries::default();
        for (month, c) in &self.monthly {
            series.labels.push(month.replace('-', "_"));
            series.w.push(c.percent(Outcome::W));
            series.d.push(c.percent(Outcome::D));
            series.l.push(c.percent(Outcome::L));
        }
        series
    }

    pub fn report(&self) -> StatsReport {
        StatsReport {
            total: self.total,
            monthly: self.monthly.clone(),
            undated: self.undated,
            summary: self.summary(),
            months: self.month_rows(),
            series: self.series(),
        }
    }
}

pub fn find_status_column<S: AsRef<str>>(headers: &[S], status_header: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.as_ref().eq_ignore_ascii_case(status_header))
}

/// First header, in column order, containing any of `patterns`
pub fn find_date_column<S: AsRef<str>>(headers: &[S], patterns: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let lower = h.as_ref().to_lowercase();
        patterns.iter().any(|p| lower.contains(&p.to_lowercase()))
    })
}

/// Count results in `rows` overall and per month
///
/// Fails before looking at any row if either column is missing.
pub fn aggregate<S: AsRef<str>>(
    headers: &[S],
    rows: &[Vec<String>],
    status_header: &str,
    date_patterns: &[&str],
) -> Result<Stats, StatsError> {
    let status_idx =
        find_status_column(headers, status_header).ok_or(StatsError::StatusColumnNotFound)?;
    let date_idx =
        find_date_column(headers, date_patterns).ok_or(StatsError::DateColumnNotFound)?;

    let mut stats = Stats::default();

    for row in rows {
        let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");

        let Some(outcome) = Outcome::parse(cell(status_idx)) else {
            continue;
        };
        stats.total.add(outcome);

        match normalize_date(cell(date_idx)).and_then(|d| month_key(&d)) {
            Some(key) => stats.monthly.entry(key).or_default().add(outcome),
            None => stats.undated += 1,
        }
    }

    Ok(stats)
}

/// Bring a date into `DD.MM.YYYY` form
///
/// Values already in that shape are returned as they are. Other common
/// spellings are parsed and reformatted. Returns `None` for blanks and
/// anything unreadable.
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if DOTTED_DATE.is_match(value) {
        return Some(value.to_string());
    }

    let date = parse_date(value)?;
    Some(date.format("%d.%m.%Y").to_string())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let date = DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
        })?;

    // Five-digit years would not survive a second pass through the
    // DD.MM.YYYY check.
    (0..=9999).contains(&date.year()).then_some(date)
}

/// `YYYY-MM` bucket for a normalized `DD.MM.YYYY` date
pub fn month_key(normalized: &str) -> Option<String> {
    let mut parts = normalized.split('.');
    let (_day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    Some(format!("{}-{:0>2}", year, month))
}
