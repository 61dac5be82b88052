use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use tokio::sync::Mutex;

use crate::models::Holiday;
use crate::observer::Observer;
use crate::remote::HolidaySource;
use crate::utils::cache::TtlCache;

const SOURCE: &str = "public holidays";

/// Built-in national holidays, used whenever the external source has nothing better.
const FIXED_HOLIDAYS: [(u32, u32, &str); 8] = [
    (1, 1, "New Year's Day"),
    (4, 21, "Tiradentes"),
    (5, 1, "Labour Day"),
    (9, 7, "Independence Day"),
    (10, 12, "Our Lady of Aparecida"),
    (11, 2, "All Souls' Day"),
    (11, 15, "Republic Proclamation Day"),
    (12, 25, "Christmas Day"),
];

/// Holidays of one year, ordered by date.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct HolidayTable {
    by_date: BTreeMap<NaiveDate, Holiday>,
}

impl HolidayTable {
    pub(crate) fn fixed(year: i32) -> Self {
        FIXED_HOLIDAYS
            .iter()
            .filter_map(|&(month, day, name)| {
                NaiveDate::from_ymd_opt(year, month, day).map(|date| Holiday::national(date, name))
            })
            .collect()
    }

    pub(crate) fn get(&self, date: &NaiveDate) -> Option<&Holiday> {
        self.by_date.get(date)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, date: &NaiveDate) -> bool {
        self.by_date.contains_key(date)
    }

    pub(crate) fn for_month(&self, month: u32) -> Vec<Holiday> {
        self.by_date
            .values()
            .filter(|h| h.date.month() == month)
            .cloned()
            .collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Holiday> {
        self.by_date.values()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.by_date.len()
    }
}

impl FromIterator<Holiday> for HolidayTable {
    fn from_iter<T: IntoIterator<Item = Holiday>>(iter: T) -> Self {
        Self {
            by_date: iter.into_iter().map(|h| (h.date, h)).collect(),
        }
    }
}

/// Per-year holiday calendars. A year is built once: the external source replaces the
/// built-in table wholesale when it returns anything, otherwise the built-in table stays.
pub(crate) struct HolidayProvider {
    source: Option<Arc<dyn HolidaySource>>,
    cache: TtlCache<i32, Arc<HolidayTable>>,
    ttl: Duration,
    fetch_lock: Mutex<()>,
    observer: Arc<dyn Observer>,
}

impl HolidayProvider {
    pub(crate) fn new(
        source: Option<Arc<dyn HolidaySource>>,
        ttl: Duration,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            source,
            cache: TtlCache::new(),
            ttl,
            fetch_lock: Mutex::new(()),
            observer,
        }
    }

    pub(crate) async fn holidays(&self, year: i32) -> Arc<HolidayTable> {
        if let Some(table) = self.cache.get(&year) {
            return table;
        }

        // Writers are serialised so concurrent misses fetch the year only once.
        let _guard = self.fetch_lock.lock().await;
        if let Some(table) = self.cache.get(&year) {
            return table;
        }

        let table = Arc::new(self.build(year).await);
        self.cache.insert(year, Arc::clone(&table), self.ttl);
        table
    }

    async fn build(&self, year: i32) -> HolidayTable {
        let fixed = HolidayTable::fixed(year);
        let Some(source) = &self.source else {
            return fixed;
        };

        self.observer.fetch_started(SOURCE);
        match source.fetch_holidays(year).await {
            Ok(holidays) if !holidays.is_empty() => {
                self.observer.fetch_finished(SOURCE, holidays.len());
                holidays.into_iter().collect()
            }
            Ok(_) => {
                self.observer
                    .fallback_taken(SOURCE, "external source returned no holidays");
                fixed
            }
            Err(err) => {
                self.observer.fallback_taken(SOURCE, &err.to_string());
                fixed
            }
        }
    }

    pub(crate) async fn is_holiday(&self, date: NaiveDate) -> Option<Holiday> {
        self.holidays(date.year()).await.get(&date).cloned()
    }

    pub(crate) async fn holidays_for_month(&self, year: i32, month: u32) -> Vec<Holiday> {
        self.holidays(year).await.for_month(month)
    }
}
