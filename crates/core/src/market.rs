//! Market-session classification
//!
//! Journeys are stamped with the US-equity trading-calendar phase they were
//! recorded in, derived from wall-clock time against the Eastern trading
//! table: Mon-Fri 09:30-16:00 is regular hours, 04:00-09:30 pre-market,
//! 16:00-20:00 after-market, anything outside 04:00-20:00 closed, and
//! weekends are weekends regardless of hour.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Trading-calendar phase of a wall-clock instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSession {
    Weekend,
    PreMarket,
    MarketHours,
    AfterMarket,
    Closed,
}

impl MarketSession {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekend => "weekend",
            Self::PreMarket => "pre_market",
            Self::MarketHours => "market_hours",
            Self::AfterMarket => "after_market",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for MarketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a UTC instant against the Eastern trading table
pub fn classify_utc(at: DateTime<Utc>) -> MarketSession {
    classify_eastern(to_eastern(at))
}

/// Classify the current instant
pub fn classify_now() -> MarketSession {
    classify_utc(Utc::now())
}

/// Classify an Eastern local wall-clock time
pub fn classify_eastern(local: NaiveDateTime) -> MarketSession {
    match local.weekday() {
        Weekday::Sat | Weekday::Sun => return MarketSession::Weekend,
        _ => {}
    }

    let minute_of_day = local.hour() * 60 + local.minute();
    match minute_of_day {
        m if !(4 * 60..20 * 60).contains(&m) => MarketSession::Closed,
        m if m < 9 * 60 + 30 => MarketSession::PreMarket,
        m if m < 16 * 60 => MarketSession::MarketHours,
        _ => MarketSession::AfterMarket,
    }
}

/// Convert a UTC instant to Eastern local time
///
/// The offset follows the US daylight-saving rule: EDT (UTC-4) from the
/// second Sunday of March 07:00 UTC until the first Sunday of November
/// 06:00 UTC, EST (UTC-5) otherwise.
fn to_eastern(at: DateTime<Utc>) -> NaiveDateTime {
    at.naive_utc() - chrono::Duration::hours(eastern_offset_hours(at))
}

fn eastern_offset_hours(at: DateTime<Utc>) -> i64 {
    let year = at.year();
    let dst_start = nth_sunday(year, 3, 2)
        .and_hms_opt(7, 0, 0)
        .expect("valid DST start");
    let dst_end = nth_sunday(year, 11, 1)
        .and_hms_opt(6, 0, 0)
        .expect("valid DST end");

    let naive = at.naive_utc();
    if naive >= dst_start && naive < dst_end { 4 } else { 5 }
}

fn nth_sunday(year: i32, month: u32, nth: u64) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month start");
    let until_sunday = u64::from((7 - first.weekday().num_days_from_sunday()) % 7);
    first + Days::new(until_sunday + (nth - 1) * 7)
}
