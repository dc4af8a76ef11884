//! CLI wrapper:
//!   DKB_USER=... DKB_PIN=... cargo run -- --dispatch job.json --income 2500 > report.csv
//!   cargo run -- --dispatch job.json --dry-run --user alice --pin 12345

use anyhow::{Context, Result, bail};
use bank_dispatch::config::{DEFAULT_BASE_URL, DEFAULT_DISPATCH_FILE};
use bank_dispatch::{Config, Dispatcher, DkbSite, JobList, Session, StagedTransfer, write_report};
use clap::{Arg, ArgAction, Command, value_parser};
use std::{
    fs::File,
    io::{self, BufRead, Write},
    path::PathBuf,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // ---------------------------------------------------------------- logging
    // logs go to STDERR, STDOUT carries the CSV report
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));
    let subscriber = FmtSubscriber::builder()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    // ---------------------------------------------------------------- flags
    let matches = Command::new("bank-dispatch")
        .about("Dispatches transfer jobs through DKB online banking")
        .arg(
            Arg::new("dispatch")
                .long("dispatch")
                .value_name("FILE")
                .default_value(DEFAULT_DISPATCH_FILE)
                .help("Job config file with a 'dispatch' list"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Stage every transfer but never submit it"),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .env("DKB_USER")
                .required(true)
                .help("Online-banking user id"),
        )
        .arg(
            Arg::new("pin")
                .long("pin")
                .env("DKB_PIN")
                .hide_env_values(true)
                .required(true)
                .help("Online-banking PIN"),
        )
        .arg(
            Arg::new("income")
                .long("income")
                .value_name("EUR")
                .value_parser(value_parser!(u64))
                .help("Income in whole EUR that relative shares are taken from"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .default_value(DEFAULT_BASE_URL)
                .hide(true),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .value_name("FILE")
                .help("Dispatch report CSV (defaults to stdout)"),
        )
        .get_matches();

    let config = Config {
        dispatch_file: matches
            .get_one::<String>("dispatch")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DISPATCH_FILE)),
        dry_run: matches.get_flag("dry-run"),
        base_url: matches
            .get_one::<String>("base-url")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
    };
    let user = matches.get_one::<String>("user").context("missing --user")?;
    let pin = matches.get_one::<String>("pin").context("missing --pin")?;

    // ---------------------------------------------------------------- jobs
    let mut jobs = JobList::load(&config.dispatch_file)?;
    if !jobs.is_valid() {
        bail!(
            "job config file '{}' is invalid: {:?}",
            config.dispatch_file.display(),
            jobs.validation().issues
        );
    }
    if jobs.has_relative_share() {
        let income = matches
            .get_one::<u64>("income")
            .copied()
            .context("jobs use relative shares, --income is required")?;
        jobs.calculate_share_value(income)?;
    }
    info!(jobs = jobs.jobs().len(), dry_run = config.dry_run, "job list loaded");

    // ---------------------------------------------------------------- dispatch
    let mut session = Session::new(DkbSite::new(&config)?, &config);
    if !session.login(user, pin)? {
        error!("login failed, nothing dispatched");
        bail!("login failed");
    }
    let run = Dispatcher::new(prompt_tan).run(&mut session, &jobs);
    let logout = session.logout();

    // ---------------------------------------------------------------- emit
    // the report goes out even when the run stopped early
    let sink: Box<dyn Write> = match matches.get_one::<String>("output") {
        Some(p) => Box::new(File::create(p)?),
        None => Box::new(io::stdout()),
    };
    write_report(&run.outcomes, sink)?;
    info!("Finished dispatch: {} jobs", run.outcomes.len());
    if let Some(e) = run.error {
        return Err(e).context("dispatch stopped early");
    }
    logout?;
    Ok(())
}

/// Asks for a TAN on stderr, reads it from stdin. Empty input means none.
fn prompt_tan(staged: &StagedTransfer) -> Option<String> {
    eprint!(
        "TAN for {} => {} ({} EUR): ",
        staged.source, staged.target, staged.amount
    );
    io::stderr().flush().ok()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok()?;
    let tan = line.trim();
    (!tan.is_empty()).then(|| tan.to_owned())
}
