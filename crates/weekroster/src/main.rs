//! `weekroster` - CLI for weekly signups
//!
//! This binary signs players up, removes them, and shows rosters, using the
//! store and notifier selected by configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Local;
use clap::Parser;

use weekroster::cli::{
    Cli, Command, ConfigCommand, ListCommand, PruneCommand, RemoveCommand, ResetCommand,
    SignupCommand, StatusCommand, WeeksCommand,
};
use weekroster::notify::{notifier_from_config, Notifier};
use weekroster::service::{NoticeOutcome, RemovalReport, SignupService, WeekView};
use weekroster::store::{open_store, RosterStore};
use weekroster::{init_logging, Config, Placement, WeekKey};

type Service = SignupService<Box<dyn RosterStore>, Box<dyn Notifier>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<weekroster::Error>() {
                Some(e) if e.is_user_facing() => eprintln!("{e}"),
                _ => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        config: config_path,
        secrets,
        command,
        ..
    } = cli;
    let command = match command {
        Command::Config(cmd) => return handle_config(config_path, secrets, cmd),
        command => command,
    };

    let config = Config::load_from(config_path, secrets).context("loading configuration")?;
    let store = open_store(&config).context("opening the roster store")?;
    let notifier = notifier_from_config(&config).context("configuring email")?;
    let service = SignupService::from_config(store, notifier, &config);
    let today = Local::now().date_naive();

    match command {
        Command::Weeks(cmd) => handle_weeks(&service, today, &cmd),
        Command::List(cmd) => handle_list(&service, today, &cmd).await,
        Command::Signup(cmd) => handle_signup(&service, today, &cmd).await,
        Command::Remove(cmd) => handle_remove(&service, today, &cmd).await,
        Command::Status(cmd) => handle_status(&service, today, &cmd).await,
        Command::Reset(cmd) => handle_reset(&service, &cmd).await,
        Command::Prune(cmd) => handle_prune(&service, today, &cmd).await,
        Command::Config(_) => Ok(()),
    }
}

fn current_week(week: Option<WeekKey>, today: chrono::NaiveDate) -> WeekKey {
    week.unwrap_or_else(|| WeekKey::containing(today))
}

fn handle_weeks(
    service: &Service,
    today: chrono::NaiveDate,
    cmd: &WeeksCommand,
) -> anyhow::Result<()> {
    let weeks = service.offered_weeks(today);
    if cmd.json {
        let listing: Vec<_> = weeks
            .iter()
            .map(|w| serde_json::json!({ "week": w, "label": w.label() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        for week in weeks {
            println!("{week}  {}", week.label());
        }
    }
    Ok(())
}

async fn handle_list(
    service: &Service,
    today: chrono::NaiveDate,
    cmd: &ListCommand,
) -> anyhow::Result<()> {
    let weeks = match cmd.week {
        Some(week) => vec![week],
        None => service.offered_weeks(today),
    };
    let views = service.rosters(&weeks).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        for (i, view) in views.iter().enumerate() {
            if i > 0 {
                println!();
            }
            print_week(view);
        }
    }
    Ok(())
}

fn print_week(view: &WeekView) {
    println!("{} ({})", view.label, view.week);
    println!("{}", "=".repeat(view.label.len() + view.week.to_string().len() + 3));
    for category in &view.categories {
        println!(
            "{}: {}/{} confirmed, {} waiting",
            category.category,
            category.confirmed.len(),
            view.capacity,
            category.waitlist.len()
        );
        for (i, name) in category.confirmed.iter().enumerate() {
            println!("  {:>2}. {name}", i + 1);
        }
        if !category.waitlist.is_empty() {
            println!("  Waitlist:");
            for (i, name) in category.waitlist.iter().enumerate() {
                println!("  {:>2}. {name}", i + 1);
            }
        }
    }
    println!(
        "Totals: MMP {}, WMP {} (XMP counted as {})",
        view.effective.mmp, view.effective.wmp, view.effective.no_preference_leans
    );
}

async fn handle_signup(
    service: &Service,
    today: chrono::NaiveDate,
    cmd: &SignupCommand,
) -> anyhow::Result<()> {
    let week = current_week(cmd.week, today);
    service.check_offered(week, today)?;

    let receipt = service
        .sign_up(&cmd.name, &cmd.email, week, cmd.category.into())
        .await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
    } else if receipt.status.is_confirmed() {
        println!(
            "{} is signed up as {} for {} (slot {} of {}).",
            cmd.name.trim(),
            receipt.category,
            week.label(),
            receipt.status.position,
            service.capacity()
        );
    } else {
        println!(
            "{} is full for {}; {} is #{} on the waitlist.",
            receipt.category,
            week.label(),
            cmd.name.trim(),
            receipt.status.position
        );
    }
    Ok(())
}

async fn handle_remove(
    service: &Service,
    today: chrono::NaiveDate,
    cmd: &RemoveCommand,
) -> anyhow::Result<()> {
    let week = current_week(cmd.week, today);
    let report = service
        .remove(&cmd.name, week, cmd.category.map(Into::into))
        .await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_removal(&cmd.name, &report);
    }
    Ok(())
}

fn print_removal(name: &str, report: &RemovalReport) {
    let from = match report.removed_from {
        Placement::Confirmed => "the roster",
        Placement::Waitlisted => "the waitlist",
    };
    println!(
        "Removed {} from {from} for {} ({}).",
        name.trim(),
        report.category,
        report.week.label()
    );

    if let Some(promotion) = &report.promotion {
        let who = &promotion.notice.name;
        match &promotion.outcome {
            NoticeOutcome::Sent => println!("{who} was promoted from the waitlist and notified."),
            NoticeOutcome::Skipped => println!("{who} was promoted from the waitlist."),
            NoticeOutcome::Failed(reason) => println!(
                "{who} was promoted from the waitlist, but the notice could not be sent: {reason}"
            ),
        }
    }
}

async fn handle_status(
    service: &Service,
    today: chrono::NaiveDate,
    cmd: &StatusCommand,
) -> anyhow::Result<()> {
    let week = current_week(cmd.week, today);
    let location = service.status(&cmd.name, week).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&location)?);
        return Ok(());
    }
    match location {
        Some(at) if at.placement == Placement::Confirmed => println!(
            "{} is confirmed as {} for {} (slot {}).",
            cmd.name.trim(),
            at.category,
            week.label(),
            at.position
        ),
        Some(at) => println!(
            "{} is #{} on the {} waitlist for {}.",
            cmd.name.trim(),
            at.position,
            at.category,
            week.label()
        ),
        None => println!("{} is not signed up for {}.", cmd.name.trim(), week.label()),
    }
    Ok(())
}

async fn handle_reset(service: &Service, cmd: &ResetCommand) -> anyhow::Result<()> {
    if !cmd.yes {
        println!(
            "This will remove every signup and waitlist entry for {}.",
            cmd.week.label()
        );
        println!("Use --yes to confirm.");
        return Ok(());
    }

    if service.clear_week(cmd.week).await? {
        println!("Cleared {}.", cmd.week.label());
    } else {
        println!("Nothing to clear for {}.", cmd.week.label());
    }
    Ok(())
}

async fn handle_prune(
    service: &Service,
    today: chrono::NaiveDate,
    cmd: &PruneCommand,
) -> anyhow::Result<()> {
    let before = current_week(cmd.before, today);
    let pruned = service.prune_before(before).await?;
    println!("Removed {pruned} week(s) before {before}.");
    Ok(())
}

fn handle_config(
    config_path: Option<PathBuf>,
    secrets_path: Option<PathBuf>,
    cmd: ConfigCommand,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path, secrets_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print_config(&config);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            let secrets = secrets_path.unwrap_or_else(|| Config::secrets_path_for(&path));
            println!("Config:  {}", path.display());
            println!("Secrets: {}", secrets.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path), secrets_path)?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}

fn print_config(config: &Config) {
    let set = |present: bool| if present { "(set)" } else { "(not set)" };

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Roster]");
    println!("  Capacity:          {}", config.roster.capacity);
    println!("  Weeks ahead:       {}", config.roster.weeks_ahead);
    println!();
    println!("[Storage]");
    println!("  Backend:           {:?}", config.storage.backend);
    println!("  Data file:         {}", config.data_file().display());
    println!("  Database path:     {}", config.database_path().display());
    println!();
    println!("[Hosted]");
    println!("  Enabled:           {}", config.hosted.enabled);
    println!(
        "  URL:               {}",
        config.hosted.url.as_deref().unwrap_or("(not set)")
    );
    println!("  Key:               {}", set(config.hosted.key.is_some()));
    println!("  Table:             {}", config.hosted.table);
    println!("  Timeout (secs):    {}", config.hosted.timeout_secs);
    println!();
    println!("[Email]");
    println!("  Enabled:           {}", config.email.enabled);
    println!("  SMTP server:       {}:{}", config.email.smtp_server, config.email.smtp_port);
    println!("  Sender:            {}", config.email.sender_email);
    println!(
        "  Password:          {}",
        set(!config.email.sender_password.is_empty())
    );
    println!();
    println!("[Event]");
    println!("  Title:             {}", config.event.title);
    println!("  Signature:         {}", config.event.signature);
}
