mod app;
mod args;
mod calendar;
mod error;
mod holidays;
mod models;
mod observer;
mod planner;
mod remote;
mod settings;
mod submit;
mod teamwork;
#[cfg(test)]
mod testing;
mod utils;

use anyhow::Error;
use app::App;
use args::{Args, Command, Config, PlanArgs, PlanSource};
use clap::Parser;
use error::ErrorKind;
use models::WorkDay;
use observer::{LogObserver, Observer};
use remote::{HolidaySource, TimeLogService};
use settings::load_settings;
use settings::schema::Settings;
use spinners::{Spinner, Spinners};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Instant;
use submit::SubmitOptions;
use teamwork::{HolidayApi, TeamworkClient, Token};
use tokio_util::sync::CancellationToken;
use utils::table;
use utils::user_cache::{get_cached_user_id, set_cached_user_id, USER_CACHE_FILE};
use utils::{format_minutes, parse_date, parse_range, setup_log};

async fn resolve_user_id(
    client: &TeamworkClient,
    configured: Option<i64>,
    token: &Token,
) -> Result<i64, Error> {
    if let Some(user_id) = configured {
        return Ok(user_id);
    }
    let cache = Path::new(USER_CACHE_FILE);
    if let Some(user_id) = get_cached_user_id(cache, token)? {
        log::debug!("Using cached user id {user_id}");
        return Ok(user_id);
    }

    let mut spinner = Spinner::new(Spinners::Moon, "Fetching user...".into());
    let time = Instant::now();
    let user_id = client.current_user_id().await?;
    spinner.stop_with_message(format!(
        "User fetched from Teamwork API! ({:.2} s)",
        time.elapsed().as_secs_f32()
    ));

    if let Err(err) = set_cached_user_id(cache, token, user_id) {
        log::warn!("Could not cache user id: {err}");
    }
    Ok(user_id)
}

async fn connect(config: &Config) -> Result<TeamworkClient, Error> {
    let (host, token) = config.credentials()?;
    let client = TeamworkClient::new(host, token.clone(), config.response_ttl)?;
    let user_id = resolve_user_id(&client, config.user_id, token).await?;
    Ok(client.with_user_id(user_id))
}

fn require(client: &Option<Arc<TeamworkClient>>) -> Result<&TeamworkClient, Error> {
    client
        .as_deref()
        .ok_or(Error::msg("This command needs Teamwork credentials"))
}

async fn build_plan(app: &App, plan: &PlanArgs, settings: &Settings) -> Result<Vec<WorkDay>, Error> {
    let tasks = settings.tasks_for(plan.template.as_deref())?;
    if tasks.is_empty() {
        log::warn!("No tasks configured, add some to the settings file");
    } else {
        println!(
            "{} tasks, {} per day",
            tasks.len(),
            format_minutes(app.calculate_total_minutes(&tasks))
        );
    }

    let work_days = match plan.source()? {
        PlanSource::Range { start, end } => {
            let days = app.get_working_days(&start, &end).await?;
            app.create_distribution_plan(&days, &tasks)
        }
        PlanSource::Logged { month, year } => {
            let mut spinner = Spinner::new(Spinners::Moon, "Fetching logged time...".into());
            let time = Instant::now();
            let plan = app
                .create_distribution_plan_from_logged_time(month, year, &tasks)
                .await;
            spinner.stop_with_message(format!(
                "Logged time fetched! ({:.2} s)",
                time.elapsed().as_secs_f32()
            ));
            plan?
        }
    };
    Ok(work_days)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, remaining entries will be reported as cancelled");
            token.cancel();
        }
    });
    cancel
}

async fn run(args: Args) -> Result<(), Error> {
    let settings = load_settings(&args.settings).await;
    let config = Config::resolve(&args, &settings)?;
    let observer: Arc<dyn Observer> = Arc::new(LogObserver);

    let holiday_source: Arc<dyn HolidaySource> =
        Arc::new(HolidayApi::new(config.holiday_api_url.clone())?);
    let client = if args.command.needs_teamwork() {
        Some(Arc::new(connect(&config).await?))
    } else {
        None
    };
    let service = client
        .clone()
        .map(|client| -> Arc<dyn TimeLogService> { client });
    let app = App::new(
        Some(holiday_source),
        service,
        config.holiday_ttl,
        SubmitOptions::default(),
        observer,
    );

    match args.command {
        Command::Holidays { year, month } => {
            let holidays = match month {
                Some(month) => app.holidays_for_month(year, month).await?,
                None => app.holidays(year).await.iter().cloned().collect(),
            };
            println!("{}", table::holidays_table(&holidays));
        }
        Command::WorkingDays { start, end } => {
            let days = app.get_working_days(&start, &end).await?;
            println!("{}", table::days_table(&days));
            println!("{} working days", days.len());
        }
        Command::IsWorkDay { date } => {
            let date = parse_date(&date)?;
            if app.is_work_day(date).await {
                println!("{date} is a working day");
            } else if let Some(holiday) = app.is_holiday(date).await {
                println!("{date} is not a working day ({})", holiday.name);
            } else {
                println!("{date} is not a working day ({})", date.format("%A"));
            }
        }
        Command::NonWorkingDays { month, year } => {
            let days = app.non_working_days(year, month).await?;
            println!("{}", table::non_working_table(&days));
        }
        Command::Plan(plan) => {
            let work_days = build_plan(&app, &plan, &settings).await?;
            println!("{}", table::plan_table(&work_days));
        }
        Command::Submit { plan, dry_run } => {
            let work_days = build_plan(&app, &plan, &settings).await?;
            println!("{}", table::plan_table(&work_days));
            if dry_run {
                println!("Dry run, nothing was submitted");
                return Ok(());
            }

            let cancel = cancel_on_ctrl_c();
            let count = work_days.iter().map(|d| d.entries().len()).sum::<usize>();
            let mut spinner = Spinner::new(Spinners::Moon, format!("Submitting {count} entries..."));
            let time = Instant::now();
            let results = app.log_multiple_times(&work_days, &cancel).await;
            spinner.stop_with_message(format!(
                "Submission finished! ({:.2} s)\n",
                time.elapsed().as_secs_f32()
            ));
            let results = results?;
            println!("{}", table::results_table(&results));
            println!("{}", table::results_summary(&results));
        }
        Command::Delete { ids } => {
            let cancel = cancel_on_ctrl_c();
            let results = app.delete_multiple(&ids, &cancel).await?;
            println!("{}", table::deletions_table(&results));
        }
        Command::Entries { start, end } => {
            let (start, end) = parse_range(&start, &end)?;
            let mut spinner = Spinner::new(Spinners::Moon, "Fetching time entries...".into());
            let time = Instant::now();
            let entries = require(&client)?.time_entries(start, end).await;
            spinner.stop_with_message(format!(
                "Time entries fetched! ({:.2} s)\n",
                time.elapsed().as_secs_f32()
            ));
            println!("{}", table::entries_table(&entries?));
        }
        Command::Projects => {
            let projects = require(&client)?.projects().await?;
            println!("{}", table::projects_table(&projects));
        }
        Command::Tasks { project } => {
            let tasks = require(&client)?.tasks_by_project(project).await?;
            println!("{}", table::tasks_table(&tasks));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    setup_log(args.log_level)?;

    if let Err(err) = run(args).await {
        match err.downcast_ref::<error::Error>().map(error::Error::kind) {
            Some(ErrorKind::Validation) | Some(ErrorKind::EmptyResult) => eprintln!("{err}"),
            _ => eprintln!("Error: {err:?}"),
        }
        process::exit(1);
    }
    Ok(())
}
