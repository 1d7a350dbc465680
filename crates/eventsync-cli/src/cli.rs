//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// eventsync - keep a moderated event calendar in step with its source feeds
#[derive(Debug, Parser)]
#[command(name = "eventsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "EVENTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database (overrides the config file)
    #[arg(long, global = true, env = "EVENTSYNC_DATABASE")]
    pub database: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every organization once and reconcile the store
    Sync {
        /// Only sync this organization
        #[arg(long, short)]
        organization: Option<String>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync on an interval until SIGTERM or SIGINT (SIGHUP syncs now)
    Daemon {
        /// Seconds between runs (overrides `interval_secs`)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Inspect and moderate stored events
    Events {
        #[command(subcommand)]
        action: EventsAction,
    },

    /// List registered importers
    Importers,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Selects one stored event.
#[derive(Debug, Clone, Args)]
pub struct EventTarget {
    /// Event UID
    pub uid: String,

    /// Owning organization
    #[arg(long, short)]
    pub organization: String,

    /// Recurrence ID of a modified instance; omit for the series master
    #[arg(long)]
    pub recurrence_id: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum EventsAction {
    /// List stored events by start time
    List {
        #[arg(long, short)]
        organization: Option<String>,

        /// Only rejected (true) or only unrejected (false) events
        #[arg(long)]
        rejected: Option<bool>,

        /// Only events that have not ended yet
        #[arg(long)]
        upcoming: bool,

        #[arg(long)]
        limit: Option<usize>,

        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark an event rejected
    Reject {
        #[command(flatten)]
        target: EventTarget,
    },

    /// Clear an event's rejection
    Approve {
        #[command(flatten)]
        target: EventTarget,
    },

    /// Set or clear an event's local type
    SetType {
        #[command(flatten)]
        target: EventTarget,

        /// Type to set; an empty string clears it
        #[arg(long = "type")]
        event_type: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump the effective configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_moderation_target() {
        let cli = Cli::try_parse_from([
            "eventsync",
            "events",
            "reject",
            "ride-1",
            "--organization",
            "Bike Dallas",
            "--recurrence-id",
            "20250308T100000",
        ])
        .unwrap();

        match cli.command {
            Command::Events {
                action: EventsAction::Reject { target },
            } => {
                assert_eq!(target.uid, "ride-1");
                assert_eq!(target.organization, "Bike Dallas");
                assert_eq!(target.recurrence_id.as_deref(), Some("20250308T100000"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "eventsync",
            "sync",
            "--organization",
            "Bike Dallas",
            "--database",
            "/tmp/events.db",
            "--debug",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/events.db")));
        assert!(matches!(
            cli.command,
            Command::Sync { organization: Some(ref name), json: false } if name == "Bike Dallas"
        ));
    }

    #[test]
    fn rejected_filter_takes_a_bool() {
        let cli =
            Cli::try_parse_from(["eventsync", "events", "list", "--rejected", "false", "--upcoming"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Command::Events {
                action: EventsAction::List {
                    rejected: Some(false),
                    upcoming: true,
                    ..
                }
            }
        ));
    }
}
