//! Test doubles for the remote service and the observer.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{Holiday, LoggedTime, SubmissionResult, TaskId, TimeAllocation};
use crate::observer::Observer;
use crate::remote::{HolidaySource, RemoteError, TimeLogService};

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) struct StubService {
    pub holidays: Vec<Holiday>,
    pub holiday_error: bool,
    pub logged: Vec<LoggedTime>,
    /// Share of submissions that fail, drawn from a seeded generator.
    pub failure_rate: f64,
    pub delay: Duration,
    pub failing_deletes: Vec<i64>,
    pub rng: Mutex<StdRng>,
    pub holiday_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub next_id: AtomicI64,
}

impl Default for StubService {
    fn default() -> Self {
        Self {
            holidays: Vec::new(),
            holiday_error: false,
            logged: Vec::new(),
            failure_rate: 0.0,
            delay: Duration::ZERO,
            failing_deletes: Vec::new(),
            rng: Mutex::new(StdRng::seed_from_u64(7)),
            holiday_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            next_id: AtomicI64::new(1000),
        }
    }
}

impl StubService {
    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn holiday_calls(&self) -> usize {
        self.holiday_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HolidaySource for StubService {
    async fn fetch_holidays(&self, _year: i32) -> Result<Vec<Holiday>, RemoteError> {
        self.holiday_calls.fetch_add(1, Ordering::SeqCst);
        if self.holiday_error {
            return Err(RemoteError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(self.holidays.clone())
    }
}

#[async_trait]
impl TimeLogService for StubService {
    async fn fetch_logged_time(
        &self,
        _month: u32,
        _year: i32,
    ) -> Result<Vec<LoggedTime>, RemoteError> {
        Ok(self.logged.clone())
    }

    async fn submit_time_entry(
        &self,
        task_id: TaskId,
        entry: &TimeAllocation,
    ) -> Result<Option<i64>, RemoteError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        entry.validate(task_id)?;
        let fail = self.rng.lock().unwrap().gen_bool(self.failure_rate);
        if fail {
            return Err(RemoteError::Rejected {
                status: 422,
                errors: vec!["simulated failure".into()],
            });
        }
        Ok(Some(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn delete_time_entry(&self, entry_id: i64) -> Result<(), RemoteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_deletes.contains(&entry_id) {
            return Err(RemoteError::Status {
                status: 404,
                body: "not found".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Observer for RecordingObserver {
    fn fetch_started(&self, source: &str) {
        self.record(format!("fetch_started:{source}"));
    }

    fn fetch_finished(&self, source: &str, items: usize) {
        self.record(format!("fetch_finished:{source}:{items}"));
    }

    fn fallback_taken(&self, source: &str, _reason: &str) {
        self.record(format!("fallback:{source}"));
    }

    fn item_skipped(&self, subject: &str, _reason: &str) {
        self.record(format!("skipped:{subject}"));
    }

    fn batch_started(&self, items: usize, days: usize) {
        self.record(format!("batch_started:{items}:{days}"));
    }

    fn submission_finished(&self, result: &SubmissionResult) {
        self.record(format!("submitted:{}:{}", result.task_id, result.success));
    }

    fn batch_finished(&self, succeeded: usize, failed: usize) {
        self.record(format!("batch:{succeeded}:{failed}"));
    }
}
