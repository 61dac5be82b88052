use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::models::{DeletionResult, EntryTask, SubmissionResult, WorkDay};
use crate::observer::Observer;
use crate::remote::{RemoteError, TimeLogService};

const CANCELLED: &str = "Cancelled before submission";

#[derive(Clone, Debug)]
pub(crate) struct SubmitOptions {
    /// Submissions in flight at once.
    pub concurrency: usize,
    /// Pause after each submission before the worker picks up the next item.
    pub throttle: Duration,
    pub delete_throttle: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            throttle: Duration::from_millis(500),
            delete_throttle: Duration::from_millis(200),
        }
    }
}

fn failure_message(err: &RemoteError) -> String {
    format!("Error submitting entry: {err}")
}

/// Sends planned entries to the service through a small worker pool.
/// Every queued item yields exactly one result, in completion order.
pub(crate) struct Submitter {
    service: Arc<dyn TimeLogService>,
    options: SubmitOptions,
    observer: Arc<dyn Observer>,
}

impl Submitter {
    pub(crate) fn new(
        service: Arc<dyn TimeLogService>,
        options: SubmitOptions,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            service,
            options,
            observer,
        }
    }

    pub(crate) async fn log_multiple_times(
        &self,
        work_days: &[WorkDay],
        cancel: &CancellationToken,
    ) -> Result<Vec<SubmissionResult>, Error> {
        if work_days.is_empty() {
            return Err(Error::NoWorkDays);
        }

        let queue = work_days
            .iter()
            .flat_map(|day| day.entries().iter().map(move |entry| (day.date(), entry)))
            .collect_vec();
        self.observer.batch_started(queue.len(), work_days.len());

        let results: Vec<SubmissionResult> = stream::iter(queue)
            .map(|(date, entry)| self.submit_one(date, entry, cancel))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        if results.is_empty() {
            return Err(Error::NoResults);
        }
        let succeeded = results.iter().filter(|r| r.success).count();
        self.observer
            .batch_finished(succeeded, results.len() - succeeded);
        Ok(results)
    }

    async fn submit_one(
        &self,
        date: NaiveDate,
        item: &EntryTask,
        cancel: &CancellationToken,
    ) -> SubmissionResult {
        if item.task_id <= 0 {
            let message = format!("Invalid task ID: {}", item.task_id);
            self.observer
                .item_skipped(&format!("entry on {date}"), &message);
            return SubmissionResult::failed(item.task_id, date, message);
        }
        if cancel.is_cancelled() {
            return SubmissionResult::failed(item.task_id, date, CANCELLED.to_owned());
        }

        let entry = item.entry.clone().on(date);
        let result = match self.service.submit_time_entry(item.task_id, &entry).await {
            Ok(entry_id) => {
                let mut message = format!(
                    "Time entry submitted: {} {}",
                    date,
                    entry.time.format("%H:%M")
                );
                if let Some(id) = entry_id {
                    message.push_str(&format!(" (ID: {id})"));
                }
                SubmissionResult {
                    task_id: item.task_id,
                    date,
                    success: true,
                    message,
                    entry_id,
                }
            }
            Err(err) => SubmissionResult::failed(item.task_id, date, failure_message(&err)),
        };
        self.observer.submission_finished(&result);

        tokio::select! {
            _ = tokio::time::sleep(self.options.throttle) => {}
            _ = cancel.cancelled() => {}
        }
        result
    }

    /// Deletes entries with the same pool shape; one result per id.
    pub(crate) async fn delete_multiple(
        &self,
        entry_ids: &[i64],
        cancel: &CancellationToken,
    ) -> Vec<DeletionResult> {
        stream::iter(entry_ids.iter().copied())
            .map(|entry_id| async move {
                if cancel.is_cancelled() {
                    return DeletionResult {
                        entry_id,
                        success: false,
                        message: CANCELLED.to_owned(),
                    };
                }
                let result = match self.service.delete_time_entry(entry_id).await {
                    Ok(()) => DeletionResult {
                        entry_id,
                        success: true,
                        message: "Entry deleted".to_owned(),
                    },
                    Err(err) => DeletionResult {
                        entry_id,
                        success: false,
                        message: err.to_string(),
                    },
                };
                tokio::select! {
                    _ = tokio::time::sleep(self.options.delete_throttle) => {}
                    _ = cancel.cancelled() => {}
                }
                result
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TimeAllocation, UNASSIGNED_TASK};
    use crate::observer::LogObserver;
    use crate::testing::{date, RecordingObserver, StubService};
    use std::sync::atomic::Ordering;

    fn fast() -> SubmitOptions {
        SubmitOptions {
            throttle: Duration::ZERO,
            delete_throttle: Duration::ZERO,
            ..Default::default()
        }
    }

    fn submitter(stub: &Arc<StubService>, options: SubmitOptions) -> Submitter {
        let service: Arc<dyn TimeLogService> = stub.clone();
        Submitter::new(service, options, Arc::new(LogObserver))
    }

    fn plan(days: u32, entries_per_day: usize, task_id: i64) -> Vec<WorkDay> {
        (1..=days)
            .map(|d| {
                let mut day = WorkDay::new(date(2024, 4, d));
                for i in 0..entries_per_day {
                    day.push(task_id, TimeAllocation::new(30 + i as i64, "work"));
                }
                day
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let stub = StubService::default().shared();
        let err = submitter(&stub, fast())
            .log_multiple_times(&[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoWorkDays));
    }

    #[tokio::test]
    async fn days_without_entries_produce_no_results() {
        let stub = StubService::default().shared();
        let days = vec![WorkDay::new(date(2024, 4, 1))];
        let err = submitter(&stub, fast())
            .log_multiple_times(&days, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoResults));
    }

    #[tokio::test]
    async fn every_entry_gets_exactly_one_result() {
        let stub = StubService {
            failure_rate: 0.3,
            ..Default::default()
        }
        .shared();
        let days = plan(10, 4, 55);
        let results = submitter(&stub, fast())
            .log_multiple_times(&days, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 40);
        assert_eq!(stub.submit_calls(), 40);
        let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
        assert!(!failed.is_empty());
        assert!(failed.len() < results.len());
        assert!(failed.iter().all(|r| !r.message.is_empty()));
        for day in &days {
            let count = results.iter().filter(|r| r.date == day.date()).count();
            assert_eq!(count, day.entries().len());
        }
    }

    #[tokio::test]
    async fn successful_results_carry_remote_id() {
        let stub = StubService::default().shared();
        let results = submitter(&stub, fast())
            .log_multiple_times(&plan(1, 1, 9), &CancellationToken::new())
            .await
            .unwrap();
        assert!(results[0].success);
        assert_eq!(results[0].entry_id, Some(1000));
        assert!(results[0].message.contains("2024-04-01 09:00"));
        assert!(results[0].message.contains("(ID: 1000)"));
    }

    #[tokio::test]
    async fn invalid_task_ids_never_reach_the_service() {
        let stub = StubService::default().shared();
        let mut days = plan(2, 1, UNASSIGNED_TASK);
        days[1].push(-4, TimeAllocation::new(30, "x"));
        let results = submitter(&stub, fast())
            .log_multiple_times(&days, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.success));
        assert!(results.iter().any(|r| r.message.contains("-4")));
        assert_eq!(stub.submit_calls(), 0);
    }

    #[tokio::test]
    async fn non_positive_minutes_fail_per_item() {
        let stub = StubService::default().shared();
        let mut day = WorkDay::new(date(2024, 4, 2));
        day.push(3, TimeAllocation::new(0, "empty"));
        day.push(3, TimeAllocation::new(15, "ok"));
        let results = submitter(&stub, fast())
            .log_multiple_times(&[day], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        let failed = results.iter().find(|r| !r.success).unwrap();
        assert!(failed.message.contains("greater than zero"));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let stub = StubService {
            delay: Duration::from_millis(20),
            ..Default::default()
        }
        .shared();
        submitter(&stub, fast())
            .log_multiple_times(&plan(4, 3, 1), &CancellationToken::new())
            .await
            .unwrap();
        let max = stub.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "max in flight was {max}");
        assert!(max >= 2);
    }

    #[tokio::test]
    async fn cancelled_batch_still_reports_every_item() {
        let stub = StubService::default().shared();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let results = submitter(&stub, SubmitOptions::default())
            .log_multiple_times(&plan(3, 2, 1), &cancel)
            .await
            .unwrap();
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.message == CANCELLED));
        assert_eq!(stub.submit_calls(), 0);
    }

    fn paced(throttle: Duration) -> SubmitOptions {
        SubmitOptions {
            concurrency: 1,
            throttle,
            delete_throttle: throttle,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn each_submission_is_followed_by_a_pause() {
        let stub = StubService::default().shared();
        let started = tokio::time::Instant::now();
        let results = submitter(&stub, paced(Duration::from_millis(50)))
            .log_multiple_times(&plan(3, 1, 1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn default_pacing_is_half_a_second_per_worker() {
        let stub = StubService::default().shared();
        let started = tokio::time::Instant::now();
        // Six entries over three workers: two rounds of pauses.
        submitter(&stub, SubmitOptions::default())
            .log_multiple_times(&plan(3, 2, 1), &CancellationToken::new())
            .await
            .unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_during_a_pause_ends_it_early() {
        let stub = StubService::default().shared();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let results = submitter(&stub, paced(Duration::from_secs(10)))
            .log_multiple_times(&plan(2, 1, 1), &cancel)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert_eq!(results[1].message, CANCELLED);
        assert_eq!(stub.submit_calls(), 1);
    }

    #[tokio::test]
    async fn batch_summary_is_observed() {
        let stub = StubService::default().shared();
        let observer = Arc::new(RecordingObserver::default());
        let service: Arc<dyn TimeLogService> = stub.clone();
        let submitter = Submitter::new(service, fast(), observer.clone());
        let mut days = plan(1, 2, 5);
        days[0].push(0, TimeAllocation::new(10, "unassigned"));
        submitter
            .log_multiple_times(&days, &CancellationToken::new())
            .await
            .unwrap();
        let events = observer.events();
        assert_eq!(events.first().map(String::as_str), Some("batch_started:3:1"));
        assert_eq!(events.last().map(String::as_str), Some("batch:2:1"));
        assert!(events.iter().any(|e| e.starts_with("skipped:")));
    }

    #[tokio::test]
    async fn deletes_report_each_id() {
        let stub = StubService {
            failing_deletes: vec![2],
            ..Default::default()
        }
        .shared();
        let mut results = submitter(&stub, fast())
            .delete_multiple(&[1, 2, 3], &CancellationToken::new())
            .await;
        results.sort_by_key(|r| r.entry_id);
        let flags: Vec<_> = results.iter().map(|r| r.success).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert!(results[1].message.contains("404"));

        let empty = submitter(&stub, fast())
            .delete_multiple(&[], &CancellationToken::new())
            .await;
        assert!(empty.is_empty());
    }
}
