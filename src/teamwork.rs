use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use lazy_static::lazy_static;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::models::{Holiday, LoggedTime, TaskId, TimeAllocation};
use crate::remote::{HolidaySource, RemoteError, TimeLogService};
use crate::utils::cache::TtlCache;

lazy_static! {
    pub(crate) static ref HOLIDAY_API_URL: Url =
        Url::parse("https://brasilapi.com.br/api/feriados/v1/").expect("Cannot parse holiday API url!");
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const LOGGED_TIME_PATH: &str = "/projects/api/v2/calendar/loggedtime.json";
const TIME_ENTRIES_PATH: &str = "/projects/api/v2/time.json";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct Token(String);

impl Token {
    pub(crate) fn new(token: &str) -> Self {
        Token(token.to_owned())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accepts bare host names as well as full URLs.
pub(crate) fn normalize_host(host: &str) -> Result<Url, RemoteError> {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        Ok(Url::parse(&format!("{host}/"))?)
    } else {
        Ok(Url::parse(&format!("https://{host}/"))?)
    }
}

fn get_string_field<E: serde::de::Error>(obj: &Value, field: &'static str) -> Result<String, E> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| E::missing_field(field))
}

fn get_id_field<E: serde::de::Error>(obj: &Value, field: &'static str) -> Result<i64, E> {
    obj.get(field)
        .and_then(value_as_i64)
        .ok_or_else(|| E::missing_field(field))
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug)]
pub(crate) struct RemoteTask {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    pub status: Option<String>,
}

impl<'de> Deserialize<'de> for RemoteTask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v: Value = Deserialize::deserialize(deserializer)?;

        let id = get_id_field::<D::Error>(&v, "id")?;
        // Older payloads call the title "content".
        let name = get_string_field::<D::Error>(&v, "name")
            .or_else(|_| get_string_field::<D::Error>(&v, "content"))?;
        let project_id = get_id_field::<D::Error>(&v, "projectId").unwrap_or_default();
        let status = get_string_field::<D::Error>(&v, "status").ok();

        Ok(RemoteTask {
            id,
            name,
            project_id,
            status,
        })
    }
}

/// A time entry already stored on the service.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TimeEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub minutes: i64,
    pub task_id: TaskId,
    pub task_name: String,
    pub project_name: String,
    pub description: String,
    pub is_billable: bool,
}

impl<'de> Deserialize<'de> for TimeEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v: Value = Deserialize::deserialize(deserializer)?;

        let id = get_id_field::<D::Error>(&v, "id")?;
        let raw_date = get_string_field::<D::Error>(&v, "date")?;
        let date = raw_date
            .get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
            .ok_or_else(|| {
                <D::Error as serde::de::Error>::custom(format!("invalid entry date '{raw_date}'"))
            })?;

        // `minutes` is the part below the whole `hours`; when it is zero only the decimal total is reliable.
        let field = |name: &str| v.get(name).and_then(value_as_f64).unwrap_or_default();
        let remainder = v.get("minutes").and_then(value_as_i64).unwrap_or_default();
        let minutes = if remainder > 0 {
            field("hours").trunc() as i64 * 60 + remainder
        } else {
            (field("hoursDecimal") * 60.0).round() as i64
        };

        Ok(TimeEntry {
            id,
            date,
            minutes,
            task_id: get_id_field::<D::Error>(&v, "taskId").unwrap_or_default(),
            task_name: get_string_field::<D::Error>(&v, "taskName").unwrap_or_default(),
            project_name: get_string_field::<D::Error>(&v, "projectName").unwrap_or_default(),
            description: get_string_field::<D::Error>(&v, "description").unwrap_or_default(),
            is_billable: v.get("isBillable").and_then(Value::as_bool).unwrap_or(false),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimelogBody<'a> {
    minutes: i64,
    user_id: i64,
    time: String,
    description: &'a str,
    is_billable: bool,
    date: String,
}

#[derive(Serialize)]
struct TimelogRequest<'a> {
    timelog: TimelogBody<'a>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    Number(i64),
    Text(String),
}

impl IdValue {
    fn get(&self) -> Option<i64> {
        let id = match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        };
        id.filter(|id| *id > 0)
    }
}

#[derive(Deserialize)]
struct IdHolder {
    id: IdValue,
}

/// Shapes a "time entry created" response comes in, tried in declaration order.
#[derive(Deserialize)]
#[serde(untagged)]
enum CreatedEntry {
    /// `{"timelog": {"id": ..}}`
    Current { timelog: IdHolder },
    /// `{"id": ..}` or `{"timelogId": ..}`
    Legacy {
        #[serde(alias = "timelogId", alias = "timeLogId")]
        id: IdValue,
    },
    /// Any top-level object that carries an `id`.
    Other(serde_json::Map<String, Value>),
}

impl CreatedEntry {
    fn entry_id(&self) -> Option<i64> {
        match self {
            Self::Current { timelog } => timelog.id.get(),
            Self::Legacy { id } => id.get(),
            Self::Other(map) => map
                .values()
                .filter_map(|v| v.get("id"))
                .find_map(|id| value_as_i64(id).filter(|id| *id > 0)),
        }
    }
}

fn list_field<T: serde::de::DeserializeOwned>(
    mut value: Value,
    field: &str,
) -> Result<Vec<T>, RemoteError> {
    let list = value.get_mut(field).map(Value::take).unwrap_or_default();
    Ok(serde_json::from_value(list)?)
}

fn created_entry_id(body: &str) -> Option<i64> {
    serde_json::from_str::<CreatedEntry>(body)
        .ok()
        .and_then(|created| created.entry_id())
}

fn rejection(status: StatusCode, body: String) -> RemoteError {
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody { errors }) if !errors.is_empty() => RemoteError::Rejected {
            status: status.as_u16(),
            errors,
        },
        _ => RemoteError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

#[derive(Deserialize)]
struct CalendarSummary {
    #[serde(rename = "STATUS", default)]
    status: String,
    #[serde(default)]
    user: CalendarUser,
}

#[derive(Default, Deserialize)]
struct CalendarUser {
    #[serde(default)]
    billable: Vec<Vec<Value>>,
    #[serde(default)]
    nonbillable: Vec<Vec<Value>>,
}

/// Rows are `[timestamp_ms, hours, minutes]`. Malformed rows are dropped; non-billable rows
/// only count when they carry minutes.
fn parse_logged_rows(rows: &[Vec<Value>], is_billable: bool) -> Vec<LoggedTime> {
    rows.iter()
        .filter(|row| row.len() >= 3)
        .filter_map(|row| {
            let timestamp = value_as_i64(&row[0])?;
            let date = DateTime::from_timestamp_millis(timestamp)?.date_naive();
            let minutes = value_as_i64(&row[2]).unwrap_or_default();
            Some(LoggedTime {
                date,
                minutes,
                is_billable,
            })
        })
        .filter(|entry| is_billable || entry.minutes > 0)
        .collect()
}

fn parse_calendar_summary(summary: CalendarSummary) -> Vec<LoggedTime> {
    if summary.status != "OK" {
        log::warn!("Calendar summary returned status '{}'", summary.status);
        return Vec::new();
    }
    let mut entries = parse_logged_rows(&summary.user.billable, true);
    entries.extend(parse_logged_rows(&summary.user.nonbillable, false));
    entries
}

#[derive(Deserialize)]
struct ExternalHoliday {
    date: String,
    name: String,
}

fn parse_holiday_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
}

/// Public holiday calendar, queried as `{base_url}{year}`.
pub(crate) struct HolidayApi {
    base_url: Url,
    client: Client,
}

impl HolidayApi {
    pub(crate) fn new(base_url: Url) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(HolidayApi { base_url, client })
    }
}

pub(crate) struct TeamworkClient {
    base_url: Url,
    token: Token,
    user_id: i64,
    client: Client,
    cache: TtlCache<String, Value>,
    cache_ttl: Duration,
}

impl TeamworkClient {
    pub(crate) fn new(
        host: &str,
        token: Token,
        cache_ttl: Duration,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(TeamworkClient {
            base_url: normalize_host(host)?,
            token,
            user_id: 0,
            client,
            cache: TtlCache::new(),
            cache_ttl,
        })
    }

    pub(crate) fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RemoteError> {
        let url = self.base_url.join(path)?;
        Ok(self
            .client
            .request(method, url)
            .basic_auth(&self.token.0, Some("X"))
            .header(ACCEPT, "application/json"))
    }

    async fn get_json(&self, path: &str) -> Result<Value, RemoteError> {
        let response = self.request(Method::GET, path)?.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn get_json_cached(&self, path: &str) -> Result<Value, RemoteError> {
        let key = path.to_owned();
        if let Some(value) = self.cache.get(&key) {
            log::debug!("Cache hit for {path}");
            return Ok(value);
        }
        let value = self.get_json(path).await?;
        self.cache.insert(key, value.clone(), self.cache_ttl);
        Ok(value)
    }

    pub(crate) async fn current_user_id(&self) -> Result<i64, RemoteError> {
        let me = self.get_json("/projects/api/v3/me.json").await?;
        me.get("person")
            .and_then(|person| person.get("id"))
            .and_then(value_as_i64)
            .ok_or_else(|| {
                RemoteError::Decode(serde::de::Error::missing_field("person.id"))
            })
    }

    pub(crate) async fn projects(&self) -> Result<Vec<Project>, RemoteError> {
        let value = self
            .get_json_cached("/projects/api/v3/projects.json")
            .await?;
        list_field(value, "projects")
    }

    /// Entries of the configured user between `start` and `end` inclusive, newest first.
    pub(crate) async fn time_entries(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TimeEntry>, RemoteError> {
        if self.user_id <= 0 {
            return Err(RemoteError::NotConfigured("user id"));
        }
        let path = format!(
            "{TIME_ENTRIES_PATH}?page=1&pageSize=500&userId={}&fromDate={}&toDate={}\
             &sortBy=date&sortOrder=desc&includeArchivedProjects=true",
            self.user_id,
            start.format("%Y%m%d"),
            end.format("%Y%m%d")
        );
        let value = self.get_json(&path).await?;
        list_field(value, "timeEntries")
    }

    pub(crate) async fn tasks_by_project(
        &self,
        project_id: i64,
    ) -> Result<Vec<RemoteTask>, RemoteError> {
        let path = format!("/projects/api/v3/projects/{project_id}/tasks.json");
        let value = self.get_json_cached(&path).await?;
        list_field(value, "tasks")
    }
}

#[async_trait]
impl HolidaySource for HolidayApi {
    async fn fetch_holidays(&self, year: i32) -> Result<Vec<Holiday>, RemoteError> {
        let url = self.base_url.join(&year.to_string())?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let holidays = response.json::<Vec<ExternalHoliday>>().await?;
        Ok(holidays
            .into_iter()
            .filter_map(|h| parse_holiday_date(&h.date).map(|date| Holiday::national(date, &h.name)))
            .collect())
    }
}

#[async_trait]
impl TimeLogService for TeamworkClient {
    async fn fetch_logged_time(
        &self,
        month: u32,
        year: i32,
    ) -> Result<Vec<LoggedTime>, RemoteError> {
        let path = format!("{LOGGED_TIME_PATH}?m={month}&y={year}");
        let value = self.get_json(&path).await?;
        let summary: CalendarSummary = serde_json::from_value(value)?;
        Ok(parse_calendar_summary(summary))
    }

    async fn submit_time_entry(
        &self,
        task_id: TaskId,
        entry: &TimeAllocation,
    ) -> Result<Option<i64>, RemoteError> {
        let date = entry.validate(task_id)?;
        let user_id = entry.user_id.filter(|id| *id > 0).unwrap_or(self.user_id);
        if user_id <= 0 {
            return Err(RemoteError::NotConfigured("user id"));
        }

        let body = TimelogRequest {
            timelog: TimelogBody {
                minutes: entry.minutes,
                user_id,
                time: entry.time.format("%H:%M").to_string(),
                description: &entry.description,
                is_billable: entry.is_billable,
                date: date.format("%Y-%m-%d").to_string(),
            },
        };
        log::debug!(
            "Logging time for task #{task_id}: {date} {} - {} minutes - {}",
            body.timelog.time,
            entry.minutes,
            entry.description
        );

        let path = format!("/projects/api/v3/tasks/{task_id}/time.json");
        let response = self.request(Method::POST, &path)?.json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        log::debug!("Server response ({status}): {text}");

        if status == StatusCode::CREATED {
            Ok(created_entry_id(&text))
        } else {
            Err(rejection(status, text))
        }
    }

    async fn delete_time_entry(&self, entry_id: i64) -> Result<(), RemoteError> {
        let path = format!("/projects/api/v3/time/{entry_id}.json");
        log::debug!("Deleting time entry #{entry_id}");
        let response = self.request(Method::DELETE, &path)?.send().await?;
        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        Err(RemoteError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::date;
    use serde_json::json;

    #[test]
    fn host_normalisation() {
        assert_eq!(
            normalize_host("acme.teamwork.com").unwrap().as_str(),
            "https://acme.teamwork.com/"
        );
        assert_eq!(
            normalize_host("http://localhost:8080/").unwrap().as_str(),
            "http://localhost:8080/"
        );
    }

    #[test]
    fn created_entry_id_follows_shape_precedence() {
        assert_eq!(created_entry_id(r#"{"timelog": {"id": 11}, "id": 99}"#), Some(11));
        assert_eq!(created_entry_id(r#"{"id": 12, "status": "OK"}"#), Some(12));
        assert_eq!(created_entry_id(r#"{"timelogId": "13"}"#), Some(13));
        assert_eq!(created_entry_id(r#"{"entry": {"id": 14}}"#), Some(14));
        assert_eq!(created_entry_id(r#"{"id": 0}"#), None);
        assert_eq!(created_entry_id(r#"{"status": "OK"}"#), None);
        assert_eq!(created_entry_id("not json"), None);
    }

    #[test]
    fn rejection_prefers_structured_errors() {
        let err = rejection(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"errors": ["date is required", "minutes must be positive"]}"#.into(),
        );
        assert!(matches!(&err, RemoteError::Rejected { status: 422, errors } if errors.len() == 2));
        assert_eq!(
            err.to_string(),
            "rejected with status 422: date is required, minutes must be positive"
        );

        let err = rejection(StatusCode::BAD_GATEWAY, "<html>".into());
        assert!(matches!(err, RemoteError::Status { status: 502, .. }));
    }

    #[test]
    fn calendar_summary_rows() {
        // 2024-03-04T12:00:00Z
        let ts = 1_709_553_600_000_i64;
        let summary: CalendarSummary = serde_json::from_value(json!({
            "STATUS": "OK",
            "user": {
                "billable": [[ts.to_string(), "1.5", "90"], ["bad", "0", "10"], [ts.to_string(), "0"]],
                "nonbillable": [[ts, 0, 0], [ts, 0.5, 30]]
            }
        }))
        .unwrap();
        let rows = parse_calendar_summary(summary);
        assert_eq!(
            rows,
            vec![
                LoggedTime { date: date(2024, 3, 4), minutes: 90, is_billable: true },
                LoggedTime { date: date(2024, 3, 4), minutes: 30, is_billable: false },
            ]
        );

        let failed: CalendarSummary = serde_json::from_value(json!({"STATUS": "ERROR"})).unwrap();
        assert!(parse_calendar_summary(failed).is_empty());
    }

    #[test]
    fn holiday_dates_in_both_formats() {
        assert_eq!(parse_holiday_date("2024-11-20"), Some(date(2024, 11, 20)));
        assert_eq!(parse_holiday_date("20/11/2024"), Some(date(2024, 11, 20)));
        assert_eq!(parse_holiday_date("Nov 20"), None);
    }

    #[test]
    fn time_entries_from_listing() {
        let value = json!({
            "timeEntries": [
                {
                    "id": 501,
                    "date": "2024-03-04T00:00:00Z",
                    "hours": 1,
                    "minutes": 30,
                    "hoursDecimal": 1.5,
                    "taskId": 12,
                    "taskName": "Support",
                    "projectName": "Acme",
                    "description": "tickets",
                    "isBillable": true
                },
                {"id": "502", "date": "2024-03-05", "minutes": 0, "hoursDecimal": 0.75}
            ]
        });
        let entries: Vec<TimeEntry> = list_field(value, "timeEntries").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].date, date(2024, 3, 4));
        assert_eq!(entries[0].minutes, 90);
        assert_eq!(entries[0].task_name, "Support");
        assert!(entries[0].is_billable);
        assert_eq!((entries[1].id, entries[1].minutes), (502, 45));
        assert_eq!(entries[1].task_id, 0);
        assert!(!entries[1].is_billable);

        let missing: Vec<TimeEntry> = list_field(json!({}), "timeEntries").unwrap();
        assert!(missing.is_empty());
        let bad = serde_json::from_value::<TimeEntry>(json!({"id": 1, "date": "yesterday"}));
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn listing_needs_a_user() {
        let client = TeamworkClient::new("localhost:1", Token::new("t"), Duration::from_secs(60))
            .unwrap();
        let err = client
            .time_entries(date(2024, 3, 1), date(2024, 3, 31))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotConfigured("user id")));
    }

    #[test]
    fn remote_task_accepts_legacy_names() {
        let task: RemoteTask =
            serde_json::from_value(json!({"id": "42", "content": "Old task"})).unwrap();
        assert_eq!(task.id, 42);
        assert_eq!(task.name, "Old task");
        assert_eq!(task.project_id, 0);

        let task: RemoteTask =
            serde_json::from_value(json!({"id": 7, "name": "New", "projectId": 3})).unwrap();
        assert_eq!((task.id, task.project_id), (7, 3));
    }

    #[tokio::test]
    async fn submission_is_validated_before_any_request() {
        let client = TeamworkClient::new(
            "localhost:1",
            Token::new("t"),
            Duration::from_secs(60),
        )
        .unwrap()
        .with_user_id(5);
        let entry = TimeAllocation::new(0, "x").on(date(2024, 3, 4));
        let err = client.submit_time_entry(3, &entry).await.unwrap_err();
        assert!(matches!(err, RemoteError::Invalid(_)));

        let entry = TimeAllocation::new(30, "x");
        let err = client.submit_time_entry(3, &entry).await.unwrap_err();
        assert!(matches!(err, RemoteError::Invalid(_)));
    }
}
