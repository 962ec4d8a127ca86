pub mod status;
pub mod watch;

use std::{env, io::Write, path::PathBuf};

use anyhow::Result;
use chrono::{Local, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, Subcommand};
use tokio::io;
use tracing::level_filters::LevelFilter;

use crate::{
    engine::{ConfirmGate, WorkTracker},
    storage::store::JsonFileStore,
    utils::{
        clock::DefaultClock,
        logging::{enable_logging, CLI_PREFIX},
        time::day_key,
    },
};

#[derive(Parser, Debug)]
#[command(name = "Daytally", version, long_about = None)]
#[command(about = "Work timer splitting today's time across projects", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start the day timer")]
    Start,
    #[command(about = "Pause the day timer")]
    Pause,
    #[command(about = "Start the timer if paused, pause it otherwise")]
    Toggle,
    #[command(about = "Clear today's counters, adjustments and sessions")]
    Reset {
        #[arg(long, help = "Skip the confirmation prompt")]
        yes: bool,
    },
    #[command(about = "Add or subtract minutes, e.g. 10 or -10. Mirrored onto the active project")]
    Adjust {
        #[arg(allow_hyphen_values = true)]
        minutes: i64,
    },
    #[command(about = "Show the current counters and drift status")]
    Status,
    #[command(about = "Reconcile the project totals with the master timer now")]
    Sync,
    #[command(subcommand, about = "Manage projects")]
    Project(ProjectCommands),
    #[command(about = "List recorded sessions of a day")]
    Sessions {
        #[arg(
            long,
            help = "Day to list. Examples are \"yesterday\", \"15/03/2025\". Defaults to today"
        )]
        day: Option<String>,
    },
    #[command(about = "Show work totals of the past days")]
    History {
        #[arg(long, default_value_t = 7, help = "How many days back to show")]
        days: u32,
    },
    #[command(about = "Run in the foreground, updating every second until ctrl-c")]
    Watch,
}

#[derive(Subcommand, Debug)]
enum ProjectCommands {
    #[command(about = "Create a project")]
    Add { name: String },
    #[command(about = "Delete a project, moving its time to the default project")]
    Remove { id: String },
    #[command(about = "Make a project the active one")]
    Select { id: String },
    #[command(about = "List projects with their time today")]
    List,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match &args.dir {
        Some(v) => v.clone(),
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;

    let store = JsonFileStore::new(dir.join("state"))?;
    let mut tracker = WorkTracker::load(store, Box::new(DefaultClock));

    match args.commands {
        Commands::Start => {
            tracker.start();
            status::print_status(&tracker.snapshot());
        }
        Commands::Pause => {
            tracker.pause();
            status::print_status(&tracker.snapshot());
        }
        Commands::Toggle => {
            tracker.toggle();
            status::print_status(&tracker.snapshot());
        }
        Commands::Reset { yes } => {
            if yes {
                tracker.reset(&AlwaysConfirm);
            } else {
                tracker.reset(&StdinConfirmGate);
            }
            status::print_status(&tracker.snapshot());
        }
        Commands::Adjust { minutes } => {
            tracker.adjust(minutes * 60);
            status::print_status(&tracker.snapshot());
        }
        Commands::Status => status::print_status(&tracker.snapshot()),
        Commands::Sync => {
            tracker.force_sync();
            status::print_status(&tracker.snapshot());
        }
        Commands::Project(command) => match command {
            ProjectCommands::Add { name } => {
                tracker.add_project(&name);
                status::print_projects(&tracker.snapshot());
            }
            ProjectCommands::Remove { id } => {
                tracker.delete_project(&id);
                status::print_projects(&tracker.snapshot());
            }
            ProjectCommands::Select { id } => {
                tracker.select_project(&id);
                status::print_projects(&tracker.snapshot());
            }
            ProjectCommands::List => status::print_projects(&tracker.snapshot()),
        },
        Commands::Sessions { day } => {
            let day = parse_day(day)?;
            status::print_sessions(&day, &tracker.sessions_on(&day));
        }
        Commands::History { days } => {
            status::print_history(&tracker.work_time_history(days));
        }
        Commands::Watch => watch::run_watch(tracker).await?,
    }
    Ok(())
}

fn parse_day(day: Option<String>) -> Result<String> {
    let Some(expr) = day else {
        return Ok(day_key(Utc::now()));
    };
    match parse_date_string(&expr, Local::now(), chrono_english::Dialect::Uk) {
        Ok(v) => Ok(day_key(v.with_timezone(&Utc))),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to parse day {e}"),
            )
            .into()),
    }
}

/// Asks on stdin before a destructive operation goes through.
struct StdinConfirmGate;

impl ConfirmGate for StdinConfirmGate {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

struct AlwaysConfirm;

impl ConfirmGate for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

pub fn create_application_default_path() -> Result<PathBuf> {
    let path = {
        #[cfg(windows)]
        {
            let mut path =
                PathBuf::from(env::var("APPDATA").expect("APPDATA should be present on Windows"));
            path.push("daytally");
            path
        }
        #[cfg(target_os = "linux")]
        {
            let mut path = env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/state");
                        path
                    })
                })
                .expect("Couldn't find neither XDG_STATE_HOME nor HOME");
            path.push("daytally");
            path
        }
    };

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}
