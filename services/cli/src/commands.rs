use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use applytrack::config::AppConfig;
use applytrack::error::AppError;
use applytrack::telemetry;
use applytrack::workflows::tracking::listing::{self, ExportError};
use applytrack::workflows::tracking::{
    EmailMatcher, FileRecordStore, OrganizeDriver, ReconciliationDriver,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::cli::{DeadlineArgs, ExportFormat, ListArgs, OutputFormat, ReconcileArgs};
use crate::infra;
use crate::render;

pub(crate) struct Context {
    pub(crate) config: AppConfig,
    pub(crate) format: OutputFormat,
    store: FileRecordStore,
}

impl Context {
    pub(crate) fn prepare(root: Option<PathBuf>, format: OutputFormat) -> Result<Self, AppError> {
        let mut config = AppConfig::load()?;
        if let Some(root) = root {
            config.tracker.root = root;
        }
        telemetry::init(&config.telemetry)?;

        let store = infra::open_store(&config.tracker.root)?;
        info!(
            root = %config.tracker.root.display(),
            environment = ?config.environment,
            "tracker opened"
        );
        Ok(Self {
            config,
            format,
            store,
        })
    }

    fn matcher(&self) -> EmailMatcher {
        EmailMatcher::new(self.config.matcher)
    }
}

pub(crate) fn run_all(context: &Context, args: ReconcileArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(infra::today);
    let organized = OrganizeDriver::new(&context.store, context.matcher()).run()?;
    let reconciled = ReconciliationDriver::new(&context.store, today).run()?;

    let mut out = io::stdout().lock();
    match context.format {
        OutputFormat::Json => emit_json(
            &json!({ "organize": organized, "reconcile": reconciled }),
            &mut out,
        ),
        OutputFormat::Text => {
            render::organize_summary(&organized, &mut out)?;
            writeln!(out)?;
            render::run_summary(&reconciled, &mut out)?;
            Ok(())
        }
    }
}

pub(crate) fn organize(context: &Context) -> Result<(), AppError> {
    let summary = OrganizeDriver::new(&context.store, context.matcher()).run()?;

    let mut out = io::stdout().lock();
    match context.format {
        OutputFormat::Json => emit_json(&summary, &mut out),
        OutputFormat::Text => Ok(render::organize_summary(&summary, &mut out)?),
    }
}

pub(crate) fn reconcile(context: &Context, args: ReconcileArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(infra::today);
    let summary = ReconciliationDriver::new(&context.store, today).run()?;

    let mut out = io::stdout().lock();
    match context.format {
        OutputFormat::Json => emit_json(&summary, &mut out),
        OutputFormat::Text => Ok(render::run_summary(&summary, &mut out)?),
    }
}

pub(crate) fn list(context: &Context, args: ListArgs) -> Result<(), AppError> {
    let listings = if args.unsent {
        listing::unsent_applications(&context.store)?
    } else {
        listing::list_applications(&context.store)?
    };

    let Some(export) = args.export else {
        let mut out = io::stdout().lock();
        return match context.format {
            OutputFormat::Json => Ok(listing::write_json(&listings, &mut out)?),
            OutputFormat::Text => Ok(render::listing_table(&listings, &mut out)?),
        };
    };

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    match export {
        ExportFormat::Json => listing::write_json(&listings, writer)?,
        ExportFormat::Csv => listing::write_csv(&listings, writer)?,
    }

    if let Some(path) = &args.output {
        info!(path = %path.display(), rows = listings.len(), "listing exported");
    }
    Ok(())
}

pub(crate) fn deadlines(context: &Context, args: DeadlineArgs) -> Result<(), AppError> {
    if args.upcoming {
        let today = args.today.unwrap_or_else(infra::today);
        let upcoming = listing::upcoming_deadlines(&context.store, today)?;

        let mut out = io::stdout().lock();
        return match context.format {
            OutputFormat::Json => emit_json(&upcoming, &mut out),
            OutputFormat::Text => Ok(render::upcoming_deadlines(&upcoming, &mut out)?),
        };
    }

    let missing = listing::missing_deadlines(&context.store)?;

    let mut out = io::stdout().lock();
    match context.format {
        OutputFormat::Json => emit_json(&missing, &mut out),
        OutputFormat::Text => Ok(render::missing_deadlines(&missing, &mut out)?),
    }
}

fn emit_json<T: Serialize + ?Sized, W: Write>(value: &T, out: &mut W) -> Result<(), AppError> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(ExportError::from)?;
    writeln!(out)?;
    Ok(())
}
