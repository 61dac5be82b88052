use crate::settings::schema::Settings;
use crate::teamwork::{Token, HOLIDAY_API_URL};
use anyhow::Error;
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::LevelFilter;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_HOLIDAY_CACHE_HOURS: u64 = 24;
const DEFAULT_RESPONSE_CACHE_MINUTES: u64 = 5;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Plan and log working time in Teamwork")]
pub(crate) struct Args {
    /// Teamwork API token, falls back to TEAMWORK_TOKEN
    #[arg(short, long, global = true)]
    pub token: Option<String>,
    /// Teamwork site, e.g. yourcompany.teamwork.com
    #[arg(long, global = true)]
    pub host: Option<String>,
    #[arg(long, global = true)]
    pub user_id: Option<i64>,
    #[arg(long, global = true, default_value = ".settings.json")]
    pub settings: PathBuf,
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: LevelFilter,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// List the holidays of a year or a single month
    Holidays {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: Option<u32>,
    },
    /// List working days in an inclusive date range
    WorkingDays {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Tell whether a single date is a working day
    IsWorkDay { date: String },
    /// Weekends and weekday holidays of a month
    NonWorkingDays {
        #[arg(long)]
        month: u32,
        #[arg(long)]
        year: i32,
    },
    /// Show a distribution plan without submitting it
    Plan(PlanArgs),
    /// Build a plan and submit every entry to Teamwork
    Submit {
        #[command(flatten)]
        plan: PlanArgs,
        /// Print the plan only
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete time entries by id
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// List time entries already logged in an inclusive date range
    Entries {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    Projects,
    Tasks {
        #[arg(long)]
        project: i64,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub(crate) struct PlanArgs {
    /// First day of the plan, YYYY-MM-DD
    #[arg(long, requires = "end", conflicts_with = "month")]
    pub start: Option<String>,
    /// Last day of the plan, YYYY-MM-DD
    #[arg(long, requires = "start")]
    pub end: Option<String>,
    /// Redistribute the time already logged in this month
    #[arg(long, requires = "year")]
    pub month: Option<u32>,
    #[arg(long, requires = "month")]
    pub year: Option<i32>,
    /// Named template from the settings file instead of the saved tasks
    #[arg(long)]
    pub template: Option<String>,
}

/// Where the days of a plan come from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PlanSource {
    Range { start: String, end: String },
    Logged { month: u32, year: i32 },
}

impl PlanArgs {
    pub(crate) fn source(&self) -> Result<PlanSource, Error> {
        match (&self.start, &self.end, self.month, self.year) {
            (Some(start), Some(end), None, None) => Ok(PlanSource::Range {
                start: start.clone(),
                end: end.clone(),
            }),
            (None, None, Some(month), Some(year)) => Ok(PlanSource::Logged { month, year }),
            _ => Err(Error::msg(
                "Give either --start and --end, or --month and --year",
            )),
        }
    }
}

impl Command {
    pub(crate) fn needs_teamwork(&self) -> bool {
        match self {
            Command::Holidays { .. }
            | Command::WorkingDays { .. }
            | Command::IsWorkDay { .. }
            | Command::NonWorkingDays { .. } => false,
            Command::Plan(plan) => matches!(plan.source(), Ok(PlanSource::Logged { .. })),
            Command::Submit { plan, dry_run } => {
                !dry_run || matches!(plan.source(), Ok(PlanSource::Logged { .. }))
            }
            Command::Delete { .. }
            | Command::Entries { .. }
            | Command::Projects
            | Command::Tasks { .. } => true,
        }
    }
}

/// Effective configuration: command line, then environment, then settings file.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub token: Option<Token>,
    pub host: Option<String>,
    pub user_id: Option<i64>,
    pub holiday_api_url: Url,
    pub holiday_ttl: Duration,
    pub response_ttl: Duration,
}

fn from_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    pub(crate) fn resolve(args: &Args, settings: &Settings) -> Result<Self, Error> {
        let token = args
            .token
            .clone()
            .or_else(|| from_env("TEAMWORK_TOKEN"))
            .map(|token| Token::new(&token));
        let host = args
            .host
            .clone()
            .or_else(|| from_env("TEAMWORK_HOST"))
            .or_else(|| settings.api_host.clone());
        let user_id = match args.user_id {
            Some(id) => Some(id),
            None => match from_env("TEAMWORK_USER_ID") {
                Some(id) => Some(
                    id.trim()
                        .parse()
                        .map_err(|e| Error::msg(format!("TEAMWORK_USER_ID '{id}': {e}")))?,
                ),
                None => settings.user_id,
            },
        };
        let holiday_api_url = match from_env("HOLIDAY_API_URL") {
            Some(url) => Url::parse(&url)?,
            None => settings
                .holiday_api_url
                .clone()
                .unwrap_or_else(|| HOLIDAY_API_URL.clone()),
        };

        let hours = settings
            .holiday_cache_hours
            .unwrap_or(DEFAULT_HOLIDAY_CACHE_HOURS);
        let minutes = settings
            .response_cache_minutes
            .unwrap_or(DEFAULT_RESPONSE_CACHE_MINUTES);

        Ok(Self {
            token,
            host,
            user_id,
            holiday_api_url,
            holiday_ttl: Duration::from_secs(hours.saturating_mul(3600)),
            response_ttl: Duration::from_secs(minutes.saturating_mul(60)),
        })
    }

    pub(crate) fn credentials(&self) -> Result<(&str, &Token), Error> {
        let token = self.token.as_ref().ok_or(Error::msg(
            "Teamwork API token is missing! Please add it to the .env file as 'TEAMWORK_TOKEN=your_token_here' or pass it using the -t argument.",
        ))?;
        let host = self.host.as_deref().ok_or(Error::msg(
            "Teamwork host is missing! Set TEAMWORK_HOST, 'apiHost' in the settings file or pass --host.",
        ))?;
        Ok((host, token))
    }
}
