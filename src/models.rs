use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::EntryValidationError;

/// Remote task identifier. `0` marks an allocation whose task still has to be chosen.
pub(crate) type TaskId = i64;

pub(crate) const UNASSIGNED_TASK: TaskId = 0;

pub(crate) fn default_clock_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub(super) fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(d)?;
        NaiveTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum HolidayCategory {
    National,
    Regional,
    Other,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub category: HolidayCategory,
    #[serde(default)]
    pub is_optional: bool,
}

impl Holiday {
    pub(crate) fn national(date: NaiveDate, name: &str) -> Self {
        Self {
            date,
            name: name.to_owned(),
            description: None,
            category: HolidayCategory::National,
            is_optional: false,
        }
    }
}

/// A single unit of loggable time.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TimeAllocation {
    pub minutes: i64,
    #[serde(with = "clock_time", default = "default_clock_time")]
    pub time: NaiveTime,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_billable: bool,
    /// Stamped while planning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Logs the entry for another user than the client's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

impl TimeAllocation {
    /// Billable allocation starting at 09:00.
    pub(crate) fn new(minutes: i64, description: impl Into<String>) -> Self {
        Self {
            minutes,
            time: default_clock_time(),
            description: description.into(),
            is_billable: true,
            date: None,
            user_id: None,
        }
    }

    pub(crate) fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Checks everything the remote side would reject for this allocation.
    pub(crate) fn validate(&self, task_id: TaskId) -> Result<NaiveDate, EntryValidationError> {
        if task_id <= 0 {
            return Err(EntryValidationError::TaskId(task_id));
        }
        if self.minutes <= 0 {
            return Err(EntryValidationError::Minutes(self.minutes));
        }
        self.date.ok_or(EntryValidationError::MissingDate)
    }
}

/// Planning input: a task with the allocations to replicate on every eligible day.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Task {
    pub task_id: TaskId,
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub project_id: i64,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub entries: Vec<TimeAllocation>,
    /// Weekday numbers, 0 = Sunday .. 6 = Saturday. Empty means every day.
    #[serde(default, rename = "workingDays", skip_serializing_if = "Vec::is_empty")]
    pub allowed_weekdays: Vec<u32>,
}

impl Task {
    #[cfg(test)]
    pub(crate) fn new(task_id: TaskId, task_name: &str, entries: Vec<TimeAllocation>) -> Self {
        Self {
            task_id,
            task_name: task_name.to_owned(),
            project_id: 0,
            project_name: String::new(),
            entries,
            allowed_weekdays: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn on_weekdays(mut self, weekdays: &[u32]) -> Self {
        self.allowed_weekdays = weekdays.to_vec();
        self
    }

    pub(crate) fn allows(&self, date: NaiveDate) -> bool {
        self.allowed_weekdays.is_empty()
            || self
                .allowed_weekdays
                .contains(&date.weekday().num_days_from_sunday())
    }

    pub(crate) fn total_minutes(&self) -> i64 {
        self.entries.iter().map(|e| e.minutes).sum()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EntryTask {
    pub task_id: TaskId,
    pub entry: TimeAllocation,
}

/// One day of a distribution plan. `total_minutes` always equals the sum of the entries.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkDay {
    date: NaiveDate,
    entries: Vec<EntryTask>,
    #[serde(rename = "totalMin")]
    total_minutes: i64,
}

impl WorkDay {
    pub(crate) fn new(date: NaiveDate) -> Self {
        Self {
            date,
            entries: Vec::new(),
            total_minutes: 0,
        }
    }

    pub(crate) fn push(&mut self, task_id: TaskId, entry: TimeAllocation) {
        self.total_minutes += entry.minutes;
        self.entries.push(EntryTask { task_id, entry });
    }

    pub(crate) fn date(&self) -> NaiveDate {
        self.date
    }

    pub(crate) fn entries(&self) -> &[EntryTask] {
        &self.entries
    }

    pub(crate) fn total_minutes(&self) -> i64 {
        self.total_minutes
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionResult {
    pub task_id: TaskId,
    pub date: NaiveDate,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<i64>,
}

impl SubmissionResult {
    pub(crate) fn failed(task_id: TaskId, date: NaiveDate, message: String) -> Self {
        Self {
            task_id,
            date,
            success: false,
            message,
            entry_id: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeletionResult {
    pub entry_id: i64,
    pub success: bool,
    pub message: String,
}

/// Time already logged on a day, as reported by the monthly calendar summary.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LoggedTime {
    pub date: NaiveDate,
    pub minutes: i64,
    pub is_billable: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Template {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub total_min: i64,
}
