use crate::calendar::{NonWorkingDay, NonWorkingReason};
use crate::models::{DeletionResult, Holiday, SubmissionResult, WorkDay};
use crate::teamwork::{Project, RemoteTask, TimeEntry};
use crate::utils;
use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use tabled::builder::Builder;
use tabled::settings::themes::ColumnNames;
use tabled::settings::{Color, Style};
use tabled::Table;

fn finish(builder: Builder) -> Table {
    let mut table = builder.build();
    table
        .with(Style::modern_rounded())
        .with(ColumnNames::default().color(Color::FG_GREEN));
    table
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub(crate) fn plan_table(plan: &[WorkDay]) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Date", "Task", "Time", "Duration", "Billable", "Description"]);

    for day in plan {
        let date = utils::format_date(&day.date());
        for item in day.entries() {
            builder.push_record([
                date.clone(),
                item.task_id.to_string(),
                item.entry.time.format("%H:%M").to_string(),
                utils::format_minutes(item.entry.minutes),
                yes_no(item.entry.is_billable).to_owned(),
                item.entry.description.clone(),
            ]);
        }
    }

    let total = plan.iter().map(WorkDay::total_minutes).sum::<i64>();
    builder.push_record([
        format!("{} days", plan.len()),
        String::new(),
        String::new(),
        utils::format_minutes(total),
        String::new(),
        String::new(),
    ]);
    finish(builder)
}

pub(crate) fn results_table(results: &[SubmissionResult]) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Date", "Task", "Status", "Entry", "Message"]);

    for result in results.iter().sorted_by_key(|r| (r.date, r.task_id)) {
        builder.push_record([
            utils::format_date(&result.date),
            result.task_id.to_string(),
            if result.success { "ok" } else { "failed" }.to_owned(),
            result.entry_id.map(|id| id.to_string()).unwrap_or_default(),
            result.message.clone(),
        ]);
    }
    finish(builder)
}

pub(crate) fn results_summary(results: &[SubmissionResult]) -> String {
    let succeeded = results.iter().filter(|r| r.success).count();
    format!(
        "{} of {} entries submitted, {} failed",
        succeeded,
        results.len(),
        results.len() - succeeded
    )
}

pub(crate) fn entries_table(entries: &[TimeEntry]) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["ID", "Date", "Task", "Project", "Duration", "Billable", "Description"]);
    for entry in entries.iter().sorted_by_key(|e| (e.date, e.id)) {
        let task = if entry.task_name.is_empty() {
            entry.task_id.to_string()
        } else {
            format!("{} (#{})", entry.task_name, entry.task_id)
        };
        builder.push_record([
            entry.id.to_string(),
            utils::format_date(&entry.date),
            task,
            entry.project_name.clone(),
            utils::format_minutes(entry.minutes),
            yes_no(entry.is_billable).to_owned(),
            entry.description.clone(),
        ]);
    }

    let total = entries.iter().map(|e| e.minutes).sum::<i64>();
    builder.push_record([
        format!("{} entries", entries.len()),
        String::new(),
        String::new(),
        String::new(),
        utils::format_minutes(total),
        String::new(),
        String::new(),
    ]);
    finish(builder)
}

pub(crate) fn deletions_table(results: &[DeletionResult]) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Entry", "Status", "Message"]);
    for result in results.iter().sorted_by_key(|r| r.entry_id) {
        builder.push_record([
            result.entry_id.to_string(),
            if result.success { "deleted" } else { "failed" }.to_owned(),
            result.message.clone(),
        ]);
    }
    finish(builder)
}

pub(crate) fn holidays_table<'a>(holidays: impl IntoIterator<Item = &'a Holiday>) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Date", "Weekday", "Name", "Type"]);
    for holiday in holidays {
        builder.push_record([
            utils::format_date(&holiday.date),
            holiday.date.weekday().to_string(),
            holiday.name.clone(),
            format!("{:?}", holiday.category),
        ]);
    }
    finish(builder)
}

pub(crate) fn days_table(days: &[NaiveDate]) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["#", "Date", "Weekday"]);
    for (i, day) in days.iter().enumerate() {
        builder.push_record([
            (i + 1).to_string(),
            utils::format_date(day),
            day.weekday().to_string(),
        ]);
    }
    finish(builder)
}

pub(crate) fn non_working_table(days: &[NonWorkingDay]) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Date", "Reason"]);
    for day in days {
        let reason = match &day.reason {
            NonWorkingReason::Weekend(weekday) => format!("Weekend ({weekday})"),
            NonWorkingReason::Holiday(holiday) => holiday.name.clone(),
        };
        builder.push_record([utils::format_date(&day.date), reason]);
    }
    finish(builder)
}

pub(crate) fn projects_table(projects: &[Project]) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["ID", "Name", "Status"]);
    for project in projects {
        builder.push_record([
            project.id.to_string(),
            project.name.clone(),
            project.status.clone().unwrap_or_default(),
        ]);
    }
    finish(builder)
}

pub(crate) fn tasks_table(tasks: &[RemoteTask]) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["ID", "Name", "Project", "Status"]);
    for task in tasks {
        builder.push_record([
            task.id.to_string(),
            task.name.clone(),
            task.project_id.to_string(),
            task.status.clone().unwrap_or_default(),
        ]);
    }
    finish(builder)
}
