use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::Error;
use crate::holidays::HolidayTable;
use crate::models::Holiday;
use crate::utils::{self, DateRange};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum NonWorkingReason {
    Weekend(Weekday),
    Holiday(Holiday),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct NonWorkingDay {
    pub date: NaiveDate,
    pub reason: NonWorkingReason,
}

/// Business-day arithmetic over a fixed set of holidays. Knows only the years it was built from.
#[derive(Clone, Debug, Default)]
pub(crate) struct WorkCalendar {
    holidays: BTreeMap<NaiveDate, Holiday>,
}

impl WorkCalendar {
    pub(crate) fn new<'a>(tables: impl IntoIterator<Item = &'a HolidayTable>) -> Self {
        Self {
            holidays: tables
                .into_iter()
                .flat_map(HolidayTable::iter)
                .map(|h| (h.date, h.clone()))
                .collect(),
        }
    }

    pub(crate) fn is_work_day(&self, date: &NaiveDate) -> bool {
        utils::is_weekday(date) && !self.holidays.contains_key(date)
    }

    /// Business days in `[start, end]`, ascending.
    pub(crate) fn working_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, Error> {
        if end < start {
            return Err(Error::InvalidRange { start, end });
        }
        let days: Vec<NaiveDate> = DateRange(start, end)
            .filter(|d| self.is_work_day(d))
            .collect();
        if days.is_empty() {
            return Err(Error::NoWorkingDays { start, end });
        }
        Ok(days)
    }

    /// Weekends of the month plus holidays that fall on a weekday, by date.
    pub(crate) fn non_working_days(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<NonWorkingDay>, Error> {
        let (first, last) = utils::month_bounds(year, month)?;
        let weekends = DateRange(first, last)
            .filter(|d| !utils::is_weekday(d))
            .map(|date| NonWorkingDay {
                date,
                reason: NonWorkingReason::Weekend(date.weekday()),
            });
        let holidays = self
            .holidays
            .range(first..=last)
            .filter(|(date, _)| utils::is_weekday(date))
            .map(|(date, holiday)| NonWorkingDay {
                date: *date,
                reason: NonWorkingReason::Holiday(holiday.clone()),
            });
        let mut days: Vec<NonWorkingDay> = weekends.chain(holidays).collect();
        days.sort_by_key(|d| d.date);
        Ok(days)
    }
}
