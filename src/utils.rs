pub(crate) mod cache;
pub(crate) mod table;
pub(crate) mod user_cache;

use crate::error::Error;
use crate::models::Task;
use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use log::LevelFilter;
use std::mem;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive iterator over calendar days.
pub(crate) struct DateRange(pub(crate) NaiveDate, pub(crate) NaiveDate);

impl Iterator for DateRange {
    type Item = NaiveDate;
    fn next(&mut self) -> Option<Self::Item> {
        if self.0 <= self.1 {
            let next = self.0 + Duration::days(1);
            Some(mem::replace(&mut self.0, next))
        } else {
            None
        }
    }
}

pub(crate) fn is_weekday(date: &NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| Error::InvalidDate(value.to_owned()))
}

/// Inclusive `YYYY-MM-DD` range; the end may not precede the start.
pub(crate) fn parse_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), Error> {
    let (start, end) = (parse_date(start)?, parse_date(end)?);
    if end < start {
        return Err(Error::InvalidRange { start, end });
    }
    Ok((start, end))
}

pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// First and last day of a month.
pub(crate) fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), Error> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(Error::InvalidMonth(month))?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or(Error::InvalidMonth(month))?;
    Ok((first, last))
}

pub(crate) fn minutes_to_hours_and_minutes(minutes: i64) -> (i64, i64) {
    (minutes / 60, (minutes % 60).abs())
}

pub(crate) fn format_minutes(minutes: i64) -> String {
    let (hours, minutes) = minutes_to_hours_and_minutes(minutes);
    format!("{hours}h {minutes:02}m")
}

pub(crate) fn calculate_total_minutes(tasks: &[Task]) -> i64 {
    tasks.iter().map(Task::total_minutes).sum()
}

/// `RUST_LOG` wins over the level given on the command line.
pub(crate) fn setup_log(level: LevelFilter) -> Result<(), anyhow::Error> {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init()?;
    Ok(())
}
