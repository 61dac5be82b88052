use std::sync::Arc;

use chrono::NaiveDate;
use itertools::Itertools;

use crate::models::{LoggedTime, Task, TimeAllocation, WorkDay, UNASSIGNED_TASK};
use crate::observer::{LogObserver, Observer};

const IMPORTED_DESCRIPTION: &str = "Time imported from calendar";

/// Splits `total` into `parts` integer shares; the first `total % parts` shares get one extra minute.
pub(crate) fn split_evenly(total: i64, parts: usize) -> Vec<i64> {
    if parts == 0 {
        return Vec::new();
    }
    let count = parts as i64;
    let (share, remainder) = (total / count, total % count);
    (0..count)
        .map(|i| if i < remainder { share + 1 } else { share })
        .collect()
}

/// Builds distribution plans. Inputs are only read; every plan is a fresh value.
pub(crate) struct Planner {
    observer: Arc<dyn Observer>,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(Arc::new(LogObserver))
    }
}

impl Planner {
    pub(crate) fn new(observer: Arc<dyn Observer>) -> Self {
        Self { observer }
    }

    /// Copies every task's allocations onto each working day the task allows.
    /// Days that end up without entries are left out of the plan.
    pub(crate) fn replicate(&self, working_days: &[NaiveDate], tasks: &[Task]) -> Vec<WorkDay> {
        let mut plan = Vec::with_capacity(working_days.len());

        for &day in working_days {
            let mut work_day = WorkDay::new(day);
            for task in tasks {
                if !task.allows(day) {
                    self.observer.item_skipped(
                        &format!("task #{} on {day}", task.task_id),
                        "weekday not allowed for task",
                    );
                    continue;
                }
                for entry in &task.entries {
                    work_day.push(task.task_id, entry.clone().on(day));
                }
            }

            if work_day.is_empty() {
                self.observer
                    .item_skipped(&format!("day {day}"), "no task qualifies");
            } else {
                plan.push(work_day);
            }
        }
        plan
    }

    /// Spreads the minutes already logged on each day evenly over `tasks`.
    /// Every logged day yields a work day, even when nothing could be allocated to it.
    /// Without tasks the whole day goes to a single unassigned allocation.
    pub(crate) fn redistribute(&self, logged: &[LoggedTime], tasks: &[Task]) -> Vec<WorkDay> {
        logged
            .iter()
            .into_group_map_by(|entry| entry.date)
            .into_iter()
            .sorted_by_key(|(date, _)| *date)
            .map(|(date, entries)| {
                let total: i64 = entries.iter().map(|e| e.minutes).sum();
                self.distribute_day(date, total, tasks)
            })
            .collect()
    }

    fn distribute_day(&self, date: NaiveDate, total: i64, tasks: &[Task]) -> WorkDay {
        let mut work_day = WorkDay::new(date);

        if tasks.is_empty() {
            work_day.push(
                UNASSIGNED_TASK,
                TimeAllocation::new(total, IMPORTED_DESCRIPTION).on(date),
            );
            return work_day;
        }

        for (task, minutes) in tasks.iter().zip(split_evenly(total, tasks.len())) {
            if minutes <= 0 {
                self.observer.item_skipped(
                    &format!("task #{} on {date}", task.task_id),
                    "no minutes left to allocate",
                );
                continue;
            }
            work_day.push(
                task.task_id,
                TimeAllocation::new(minutes, task.task_name.clone()).on(date),
            );
        }
        work_day
    }
}
