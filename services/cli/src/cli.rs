use std::path::PathBuf;

use applytrack::error::AppError;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::commands;

#[derive(Parser, Debug)]
#[command(
    name = "applytrack",
    about = "Reconcile job applications with their inbound mail and archive finished ones",
    version
)]
pub(crate) struct Cli {
    /// Tracker root holding `Solicitaties/` and `Email/` (overrides TRACKER_ROOT)
    #[arg(long, global = true)]
    pub(crate) root: Option<PathBuf>,
    /// How summaries are printed
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub(crate) format: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Organize unclassified mail, then reconcile every application (default command)
    Run(ReconcileArgs),
    /// Attach unclassified mail to applications
    Organize,
    /// Resolve statuses and archive finished applications
    Reconcile(ReconcileArgs),
    /// List all tracked applications
    List(ListArgs),
    /// Report active applications without a usable deadline, or rank upcoming ones
    Deadlines(DeadlineArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ReconcileArgs {
    /// Run date used for deadline expiry (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ListArgs {
    /// Only active applications that have not been sent yet
    #[arg(long)]
    pub(crate) unsent: bool,
    /// Export the listing in a machine-readable format instead of printing a table
    #[arg(long, value_enum)]
    pub(crate) export: Option<ExportFormat>,
    /// Write the export to a file instead of stdout
    #[arg(long, requires = "export")]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DeadlineArgs {
    /// Rank ongoing applications by deadline, soonest first
    #[arg(long)]
    pub(crate) upcoming: bool,
    /// Reference date for days left (YYYY-MM-DD). Defaults to today.
    #[arg(long, requires = "upcoming", value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ExportFormat {
    Json,
    Csv,
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Run(ReconcileArgs::default()));
    let context = commands::Context::prepare(cli.root, cli.format)?;

    match command {
        Command::Run(args) => commands::run_all(&context, args),
        Command::Organize => commands::organize(&context),
        Command::Reconcile(args) => commands::reconcile(&context, args),
        Command::List(args) => commands::list(&context, args),
        Command::Deadlines(args) => commands::deadlines(&context, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_apply_to_subcommands() {
        let cli = Cli::try_parse_from([
            "applytrack",
            "reconcile",
            "--today",
            "2024-06-01",
            "--root",
            "/srv/tracker",
            "--format",
            "json",
        ])
        .expect("arguments parse");

        assert_eq!(cli.root, Some(PathBuf::from("/srv/tracker")));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Some(Command::Reconcile(args)) => {
                assert_eq!(args.today, NaiveDate::from_ymd_opt(2024, 6, 1));
            }
            other => panic!("expected reconcile, got {other:?}"),
        }
    }

    #[test]
    fn output_path_requires_an_export_format() {
        let result = Cli::try_parse_from(["applytrack", "list", "--output", "jobs.csv"]);
        assert!(result.is_err());
    }

    #[test]
    fn report_filters_parse() {
        let cli = Cli::try_parse_from(["applytrack", "list", "--unsent", "--export", "json"])
            .expect("list arguments parse");
        match cli.command {
            Some(Command::List(args)) => {
                assert!(args.unsent);
                assert_eq!(args.export, Some(ExportFormat::Json));
            }
            other => panic!("expected list, got {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "applytrack",
            "deadlines",
            "--upcoming",
            "--today",
            "2024-06-01",
        ])
        .expect("deadline arguments parse");
        match cli.command {
            Some(Command::Deadlines(args)) => {
                assert!(args.upcoming);
                assert_eq!(args.today, NaiveDate::from_ymd_opt(2024, 6, 1));
            }
            other => panic!("expected deadlines, got {other:?}"),
        }
    }

    #[test]
    fn deadline_date_requires_the_upcoming_ranking() {
        let result = Cli::try_parse_from(["applytrack", "deadlines", "--today", "2024-06-01"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_malformed_run_dates() {
        let result = Cli::try_parse_from(["applytrack", "reconcile", "--today", "01-06-2024"]);
        assert!(result.is_err());
    }
}
