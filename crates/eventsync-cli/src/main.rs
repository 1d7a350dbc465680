//! eventsync CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use eventsync_cli::cli::{Cli, Command, ConfigAction, EventsAction};
use eventsync_cli::commands;
use eventsync_cli::commands::events::ListOptions;
use eventsync_cli::config::AppConfig;
use eventsync_cli::error::CliResult;
use eventsync_core::{DEFAULT_TIMEZONE, TracingConfig, init_tracing};
use eventsync_importers::{HttpFetcher, ImporterRegistry};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = match cli.command {
        Command::Daemon { .. } if !cli.debug => TracingConfig::daemon(),
        _ => TracingConfig::from_flags(cli.debug, cli.json_logs),
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let database = config.database_path(cli.database.as_deref());

    match cli.command {
        Command::Sync { organization, json } => {
            commands::sync::run(&config, &database, organization.as_deref(), json).await
        }
        Command::Daemon { interval } => commands::daemon::run(&config, &database, interval).await,
        Command::Events { action } => {
            let store = commands::open_store(&database)?;
            match action {
                EventsAction::List {
                    organization,
                    rejected,
                    upcoming,
                    limit,
                    json,
                } => commands::events::list(
                    store.as_ref(),
                    &ListOptions {
                        organization,
                        rejected,
                        upcoming,
                        limit,
                        json,
                    },
                    config.timezone()?,
                ),
                EventsAction::Reject { target } => commands::events::reject(store.as_ref(), &target),
                EventsAction::Approve { target } => {
                    commands::events::approve(store.as_ref(), &target)
                }
                EventsAction::SetType { target, event_type } => {
                    commands::events::set_type(store.as_ref(), &target, &event_type)
                }
            }
        }
        Command::Importers => commands::importers::list(&listing_registry(&config)?),
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => {
                commands::config::validate(&config, &listing_registry(&config)?)
            }
            ConfigAction::Path => commands::config::path(),
        },
    }
}

/// A registry for name lookups that tolerates an invalid timezone, so that
/// `config validate` can report it instead of failing first.
fn listing_registry(config: &AppConfig) -> CliResult<ImporterRegistry> {
    let tz = config.timezone().unwrap_or(DEFAULT_TIMEZONE);
    Ok(ImporterRegistry::with_defaults(
        Arc::new(HttpFetcher::new()?),
        tz,
    ))
}
