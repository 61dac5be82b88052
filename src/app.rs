use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::calendar::{NonWorkingDay, WorkCalendar};
use crate::error::Error;
use crate::holidays::{HolidayProvider, HolidayTable};
use crate::models::{DeletionResult, Holiday, SubmissionResult, Task, WorkDay};
use crate::observer::Observer;
use crate::planner::Planner;
use crate::remote::{HolidaySource, RemoteError, TimeLogService};
use crate::submit::{SubmitOptions, Submitter};
use crate::utils::{self, parse_range};

/// Working-day arithmetic, planning and submission over one set of collaborators.
pub(crate) struct App {
    holidays: HolidayProvider,
    planner: Planner,
    service: Option<Arc<dyn TimeLogService>>,
    submitter: Option<Submitter>,
}

impl App {
    pub(crate) fn new(
        holiday_source: Option<Arc<dyn HolidaySource>>,
        service: Option<Arc<dyn TimeLogService>>,
        holiday_ttl: Duration,
        submit_options: SubmitOptions,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let submitter = service
            .clone()
            .map(|service| Submitter::new(service, submit_options, Arc::clone(&observer)));
        Self {
            holidays: HolidayProvider::new(holiday_source, holiday_ttl, Arc::clone(&observer)),
            planner: Planner::new(observer),
            service,
            submitter,
        }
    }

    fn service(&self) -> Result<&Arc<dyn TimeLogService>, Error> {
        self.service
            .as_ref()
            .ok_or(Error::Remote(RemoteError::NotConfigured("Teamwork credentials")))
    }

    fn submitter(&self) -> Result<&Submitter, Error> {
        self.submitter
            .as_ref()
            .ok_or(Error::Remote(RemoteError::NotConfigured("Teamwork credentials")))
    }

    pub(crate) async fn holidays(&self, year: i32) -> Arc<HolidayTable> {
        self.holidays.holidays(year).await
    }

    pub(crate) async fn holidays_for_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<Holiday>, Error> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidMonth(month));
        }
        Ok(self.holidays.holidays_for_month(year, month).await)
    }

    pub(crate) async fn is_holiday(&self, date: NaiveDate) -> Option<Holiday> {
        self.holidays.is_holiday(date).await
    }

    pub(crate) async fn is_work_day(&self, date: NaiveDate) -> bool {
        self.calendar(date, date).await.is_work_day(&date)
    }

    /// Calendar covering every year touched by `[start, end]`.
    async fn calendar(&self, start: NaiveDate, end: NaiveDate) -> WorkCalendar {
        let tables = join_all((start.year()..=end.year()).map(|y| self.holidays.holidays(y))).await;
        WorkCalendar::new(tables.iter().map(|table| table.as_ref()))
    }

    /// Business days in the inclusive range given as `YYYY-MM-DD` strings.
    pub(crate) async fn get_working_days(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<NaiveDate>, Error> {
        let (start, end) = parse_range(start, end)?;
        self.calendar(start, end).await.working_days(start, end)
    }

    pub(crate) async fn non_working_days(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<NonWorkingDay>, Error> {
        let (first, last) = utils::month_bounds(year, month)?;
        self.calendar(first, last)
            .await
            .non_working_days(year, month)
    }

    pub(crate) fn create_distribution_plan(
        &self,
        working_days: &[NaiveDate],
        tasks: &[Task],
    ) -> Vec<WorkDay> {
        self.planner.replicate(working_days, tasks)
    }

    /// Redistributes what the user already logged in a month across `tasks`.
    pub(crate) async fn create_distribution_plan_from_logged_time(
        &self,
        month: u32,
        year: i32,
        tasks: &[Task],
    ) -> Result<Vec<WorkDay>, Error> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidMonth(month));
        }
        let logged = self.service()?.fetch_logged_time(month, year).await?;
        if logged.is_empty() {
            return Err(Error::NoLoggedTime { month, year });
        }
        log::debug!("{} logged rows for {month:02}/{year}", logged.len());
        Ok(self.planner.redistribute(&logged, tasks))
    }

    pub(crate) async fn log_multiple_times(
        &self,
        work_days: &[WorkDay],
        cancel: &CancellationToken,
    ) -> Result<Vec<SubmissionResult>, Error> {
        self.submitter()?.log_multiple_times(work_days, cancel).await
    }

    pub(crate) async fn delete_multiple(
        &self,
        entry_ids: &[i64],
        cancel: &CancellationToken,
    ) -> Result<Vec<DeletionResult>, Error> {
        Ok(self.submitter()?.delete_multiple(entry_ids, cancel).await)
    }

    pub(crate) fn calculate_total_minutes(&self, tasks: &[Task]) -> i64 {
        utils::calculate_total_minutes(tasks)
    }
}
