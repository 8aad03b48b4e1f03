use std::io::{self, Write};

use applytrack::workflows::tracking::listing::{
    ApplicationListing, MissingDeadline, UpcomingDeadline,
};
use applytrack::workflows::tracking::{
    ApplicationOutcome, ApplicationStatus, OrganizeSummary, ResolutionReason, RunSummary,
};

pub(crate) fn run_summary<W: Write>(summary: &RunSummary, out: &mut W) -> io::Result<()> {
    writeln!(out, "Reconciliation for {}", summary.run_date)?;
    writeln!(
        out,
        "- {} active | {} archived applications",
        summary.active, summary.archived_total
    )?;
    writeln!(
        out,
        "- {} updated | {} archived | {} expired",
        summary.updated, summary.archived, summary.expired
    )?;
    writeln!(
        out,
        "- {} emails relocated | {} skipped | {} errors",
        summary.relocated_emails, summary.skipped, summary.errors
    )?;

    let notable: Vec<&ApplicationOutcome> = summary
        .outcomes
        .iter()
        .filter(|outcome| outcome.is_notable())
        .collect();
    if notable.is_empty() {
        return writeln!(out, "No changes.");
    }

    writeln!(out, "Changes:")?;
    for outcome in notable {
        writeln!(out, "  - {}", describe(outcome))?;
    }
    Ok(())
}

fn describe(outcome: &ApplicationOutcome) -> String {
    let mut line = outcome.key.to_string();
    if outcome.updated {
        line.push_str(&format!(
            ": {} -> {}",
            status_label(outcome.previous),
            status_label(outcome.status)
        ));
        if let Some(reason) = outcome.reason {
            line.push_str(&format!(" ({})", reason_label(reason)));
        }
    }
    if outcome.archived {
        line.push_str(" [archived]");
    }
    if outcome.relocated_emails > 0 {
        line.push_str(&format!(" [{} emails moved]", outcome.relocated_emails));
    }
    for failure in &outcome.failures {
        line.push_str(&format!(" [not moved: {} ({})]", failure.record_id, failure.reason));
    }
    if outcome.unreadable_emails > 0 {
        line.push_str(&format!(" [{} unreadable emails]", outcome.unreadable_emails));
    }
    if let Some(error) = &outcome.error {
        line.push_str(&format!(" [error: {error}]"));
    }
    line
}

fn status_label(status: Option<ApplicationStatus>) -> &'static str {
    status.map(ApplicationStatus::label).unwrap_or("unset")
}

fn reason_label(reason: ResolutionReason) -> &'static str {
    match reason {
        ResolutionReason::ArchivedLocation => "already archived",
        ResolutionReason::ManualRejection => "marked rejected",
        ResolutionReason::TerminalHint => "final response",
        ResolutionReason::ProgressHint => "new response",
        ResolutionReason::DeadlinePassed => "deadline passed",
    }
}

pub(crate) fn organize_summary<W: Write>(
    summary: &OrganizeSummary,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "Mail organization")?;
    writeln!(
        out,
        "- {} assigned | {} discarded ({} new blocked senders)",
        summary.assigned, summary.discarded, summary.blocked_senders
    )?;
    writeln!(
        out,
        "- {} without a confident match | {} awaiting triage | {} errors",
        summary.unresolved, summary.untriaged, summary.errors
    )?;
    for assignment in &summary.assignments {
        writeln!(
            out,
            "  - {} -> {} (score {})",
            assignment.record_id, assignment.key, assignment.score
        )?;
    }
    Ok(())
}

pub(crate) fn listing_table<W: Write>(
    listings: &[ApplicationListing],
    out: &mut W,
) -> io::Result<()> {
    if listings.is_empty() {
        return writeln!(out, "No applications found.");
    }

    let role_width = column_width(listings.iter().map(|listing| listing.role.as_str()), "Role");
    let company_width = column_width(
        listings
            .iter()
            .map(|listing| listing.company.as_deref().unwrap_or("-")),
        "Company",
    );

    writeln!(
        out,
        "{:<8}  {:<role_width$}  {:<company_width$}  {:<20}  Deadline",
        "Location", "Role", "Company", "Status"
    )?;
    for listing in listings {
        writeln!(
            out,
            "{:<8}  {:<role_width$}  {:<company_width$}  {:<20}  {}",
            listing.location,
            listing.role,
            listing.company.as_deref().unwrap_or("-"),
            listing.status.as_deref().unwrap_or("-"),
            listing
                .deadline
                .map(|deadline| deadline.to_string())
                .unwrap_or_else(|| "-".to_string()),
        )?;
    }
    writeln!(out, "{} applications", listings.len())
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, header: &str) -> usize {
    values
        .map(|value| value.chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or_default()
}

pub(crate) fn missing_deadlines<W: Write>(
    missing: &[MissingDeadline],
    out: &mut W,
) -> io::Result<()> {
    if missing.is_empty() {
        return writeln!(out, "All active applications have a deadline.");
    }

    writeln!(out, "Active applications without a usable deadline:")?;
    for entry in missing {
        let raw = entry.raw.as_deref().unwrap_or("missing");
        match &entry.link {
            Some(link) => writeln!(out, "  - {} (deadline: {raw}) {link}", entry.key)?,
            None => writeln!(out, "  - {} (deadline: {raw})", entry.key)?,
        }
    }
    Ok(())
}

pub(crate) fn upcoming_deadlines<W: Write>(
    upcoming: &[UpcomingDeadline],
    out: &mut W,
) -> io::Result<()> {
    if upcoming.is_empty() {
        return writeln!(out, "No ongoing applications.");
    }

    writeln!(out, "Ongoing applications by deadline:")?;
    let mut undated = Vec::new();
    for entry in upcoming {
        let status = entry.status.as_deref().unwrap_or("-");
        match (entry.deadline, entry.days_left) {
            (Some(deadline), Some(days)) if days < 0 => writeln!(
                out,
                "  {deadline}  {} ({status}, {} days overdue)",
                entry.key,
                -days
            )?,
            (Some(deadline), Some(days)) => writeln!(
                out,
                "  {deadline}  {} ({status}, {days} days left)",
                entry.key
            )?,
            _ => undated.push(entry),
        }
    }

    if !undated.is_empty() {
        writeln!(out, "Unknown deadline:")?;
        for entry in undated {
            writeln!(out, "  - {}", entry.key)?;
        }
    }
    Ok(())
}
