use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{Application, ApplicationStatus, StatusRecord};

/// Signal that produced a status candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionReason {
    /// The application already sits in the archive area.
    ArchivedLocation,
    /// Someone flagged the application as rejected by hand.
    ManualRejection,
    TerminalHint,
    ProgressHint,
    DeadlinePassed,
}

impl ResolutionReason {
    /// Forced candidates bypass the update-acceptance guard.
    pub const fn is_forced(self) -> bool {
        matches!(self, Self::ArchivedLocation | Self::ManualRejection)
    }
}

/// Everything the resolver decided for one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResolution {
    pub previous: Option<ApplicationStatus>,
    pub candidate: Option<(ApplicationStatus, ResolutionReason)>,
    /// The stored status record must be overwritten.
    pub accepted: bool,
    /// Status after this pass, whether or not it changed.
    pub effective: Option<ApplicationStatus>,
    /// Records must be relocated to the archive area.
    pub archive: bool,
}

impl StatusResolution {
    pub fn reason(&self) -> Option<ResolutionReason> {
        self.candidate.map(|(_, reason)| reason)
    }

    /// Write the accepted status and its monotonic flags into `record`.
    pub fn apply(&self, record: &mut StatusRecord) {
        let Some((status, _)) = self.candidate.filter(|_| self.accepted) else {
            return;
        };

        record.response = Some(status.label().to_string());
        if status == ApplicationStatus::Rejected {
            record.rejected = true;
        }
        if status == ApplicationStatus::Hired {
            record.hired = true;
        }
        if status.implies_interview() {
            record.interviewed = true;
        }
    }
}

/// Pick the strongest response hint: any terminal hint beats every non-terminal one, then the
/// lowest rank wins.
pub fn strongest_hint(hints: &[ApplicationStatus]) -> Option<ApplicationStatus> {
    let terminal = hints
        .iter()
        .copied()
        .filter(|hint| hint.is_terminal())
        .min_by_key(|hint| hint.rank());
    terminal.or_else(|| hints.iter().copied().min_by_key(|hint| hint.rank()))
}

/// Guard against regressions from noisy signals.
pub fn should_accept(old: Option<ApplicationStatus>, candidate: ApplicationStatus) -> bool {
    let Some(old) = old else {
        return true;
    };

    if candidate == ApplicationStatus::Expired
        && matches!(old, ApplicationStatus::Unsent | ApplicationStatus::Called)
    {
        return true;
    }

    match (old.is_terminal(), candidate.is_terminal()) {
        (false, true) => true,
        (true, false) => false,
        _ => candidate.rank() < old.rank(),
    }
}

/// Compute the canonical status of `application` from its signals on `today`.
///
/// `hints` are the response hints of every email assigned to the application, in either area.
pub fn resolve(
    application: &Application,
    hints: &[ApplicationStatus],
    today: NaiveDate,
) -> StatusResolution {
    let previous = application.status;
    let candidate = candidate(application, hints, today);

    let accepted = match candidate {
        Some((status, _)) if Some(status) == previous => false,
        Some((_, reason)) if reason.is_forced() => true,
        Some((status, _)) => should_accept(previous, status),
        None => false,
    };

    let effective = match candidate {
        Some((status, _)) if accepted => Some(status),
        _ => previous,
    };

    let manual_rejection =
        candidate.is_some_and(|(_, reason)| reason == ResolutionReason::ManualRejection);
    let archive = !application.archived
        && (manual_rejection || effective.is_some_and(ApplicationStatus::is_archivable));

    StatusResolution {
        previous,
        candidate,
        accepted,
        effective,
        archive,
    }
}

fn candidate(
    application: &Application,
    hints: &[ApplicationStatus],
    today: NaiveDate,
) -> Option<(ApplicationStatus, ResolutionReason)> {
    if application.archived {
        // Archival is one-way: an archivable status already on record is kept as is.
        let status = application
            .status
            .filter(|status| status.is_archivable())
            .unwrap_or(ApplicationStatus::Rejected);
        return Some((status, ResolutionReason::ArchivedLocation));
    }

    if application.rejected_flag {
        return Some((ApplicationStatus::Rejected, ResolutionReason::ManualRejection));
    }

    if let Some(hint) = strongest_hint(hints) {
        let reason = if hint.is_terminal() {
            ResolutionReason::TerminalHint
        } else {
            ResolutionReason::ProgressHint
        };
        return Some((hint, reason));
    }

    let awaiting_reply = matches!(
        application.status,
        Some(ApplicationStatus::Unsent | ApplicationStatus::Called)
    );
    match application.deadline {
        Some(deadline) if awaiting_reply && deadline < today => {
            Some((ApplicationStatus::Expired, ResolutionReason::DeadlinePassed))
        }
        _ => None,
    }
}
