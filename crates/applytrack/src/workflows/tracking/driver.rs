use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::archival::{ArchivalCoordinator, RelocationFailure};
use super::domain::{Application, ApplicationKey, ApplicationStatus, Area, EmailRecord};
use super::matcher::{EmailMatcher, MatchBasis, MatchOutcome};
use super::resolver::{self, ResolutionReason, StatusResolution};
use super::store::{RecordStore, Relocation, StoreError};

/// What one reconciliation pass did to a single application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationOutcome {
    pub key: ApplicationKey,
    pub location: Area,
    pub previous: Option<ApplicationStatus>,
    pub status: Option<ApplicationStatus>,
    pub reason: Option<ResolutionReason>,
    pub updated: bool,
    pub archived: bool,
    pub relocated_emails: usize,
    pub unreadable_emails: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RelocationFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplicationOutcome {
    fn new(application: &Application, resolution: &StatusResolution) -> Self {
        Self {
            key: application.key.clone(),
            location: application.location(),
            previous: resolution.previous,
            status: resolution.effective,
            reason: resolution.reason(),
            updated: false,
            archived: false,
            relocated_emails: 0,
            unreadable_emails: 0,
            failures: Vec::new(),
            error: None,
        }
    }

    fn failed(key: ApplicationKey, location: Area, error: &StoreError) -> Self {
        Self {
            key,
            location,
            previous: None,
            status: None,
            reason: None,
            updated: false,
            archived: false,
            relocated_emails: 0,
            unreadable_emails: 0,
            failures: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    fn error_count(&self) -> usize {
        self.failures.len() + self.unreadable_emails + usize::from(self.error.is_some())
    }

    /// Anything worth reporting happened to this application.
    pub fn is_notable(&self) -> bool {
        self.updated || self.archived || self.relocated_emails > 0 || self.error_count() > 0
    }
}

/// Aggregate counters of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_date: NaiveDate,
    pub active: usize,
    pub archived_total: usize,
    pub updated: usize,
    pub archived: usize,
    pub expired: usize,
    pub relocated_emails: usize,
    pub errors: usize,
    pub skipped: usize,
    pub outcomes: Vec<ApplicationOutcome>,
}

impl RunSummary {
    fn new(run_date: NaiveDate, active: usize, archived_total: usize) -> Self {
        Self {
            run_date,
            active,
            archived_total,
            updated: 0,
            archived: 0,
            expired: 0,
            relocated_emails: 0,
            errors: 0,
            skipped: 0,
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: ApplicationOutcome) {
        if outcome.updated {
            self.updated += 1;
            if outcome.status == Some(ApplicationStatus::Expired) {
                self.expired += 1;
            }
        }
        if outcome.archived {
            self.archived += 1;
        }
        self.relocated_emails += outcome.relocated_emails;
        self.errors += outcome.error_count();
        self.outcomes.push(outcome);
    }

    /// No status was written and no record moved.
    pub fn is_quiescent(&self) -> bool {
        self.updated == 0 && self.archived == 0 && self.relocated_emails == 0
    }
}

/// Walks every application once, resolving status and archiving finished ones.
pub struct ReconciliationDriver<'a, S> {
    store: &'a S,
    today: NaiveDate,
}

impl<'a, S> ReconciliationDriver<'a, S>
where
    S: RecordStore,
{
    pub fn new(store: &'a S, today: NaiveDate) -> Self {
        Self { store, today }
    }

    /// Run one pass. Only failing to enumerate applications aborts; every other failure is
    /// isolated to its application and counted.
    pub fn run(&self) -> Result<RunSummary, StoreError> {
        let active = self.store.list_applications(Area::Active)?;
        let archived = self.store.list_applications(Area::Archive)?;
        info!(
            active = active.len(),
            archived = archived.len(),
            run_date = %self.today,
            "reconciling applications"
        );

        let mut summary = RunSummary::new(self.today, active.len(), archived.len());
        let queue = active
            .into_iter()
            .map(|key| (key, Area::Active))
            .chain(archived.into_iter().map(|key| (key, Area::Archive)));

        for (key, location) in queue {
            match self.reconcile(&key, location) {
                Ok(Some(outcome)) => summary.record(outcome),
                Ok(None) => summary.skipped += 1,
                Err(err) => {
                    warn!(application = %key, error = %err, "skipping application");
                    summary.record(ApplicationOutcome::failed(key, location, &err));
                }
            }
        }

        info!(
            updated = summary.updated,
            archived = summary.archived,
            expired = summary.expired,
            errors = summary.errors,
            "reconciliation finished"
        );
        Ok(summary)
    }

    fn reconcile(
        &self,
        key: &ApplicationKey,
        location: Area,
    ) -> Result<Option<ApplicationOutcome>, StoreError> {
        let Some(mut record) = self.store.read_status(key)? else {
            debug!(application = %key, "no status record, skipping");
            return Ok(None);
        };

        let deadline = self.store.read_deadline(key).unwrap_or_else(|err| {
            warn!(application = %key, error = %err, "deadline unavailable");
            None
        });
        let (hints, unreadable_emails) = self.collect_hints(key)?;

        let application =
            Application::from_record(key.clone(), &record, deadline, location == Area::Archive);
        let resolution = resolver::resolve(&application, &hints, self.today);
        let mut outcome = ApplicationOutcome::new(&application, &resolution);
        outcome.unreadable_emails = unreadable_emails;

        // Archived applications are swept too so stray active mail follows them.
        let coordinator = ArchivalCoordinator::new(self.store);
        if resolution.archive || application.archived {
            let report = coordinator.relocate_emails(key)?;
            outcome.relocated_emails = report.moved;
            outcome.failures = report.failures;
        }

        if resolution.accepted {
            resolution.apply(&mut record);
            if let Err(err) = self.store.write_status(key, &record) {
                warn!(application = %key, error = %err, "failed to persist status");
                outcome.error = Some(err.to_string());
                return Ok(Some(outcome));
            }
            outcome.updated = true;
            info!(
                application = %key,
                from = resolution.previous.map(ApplicationStatus::label).unwrap_or("unset"),
                to = resolution.effective.map(ApplicationStatus::label).unwrap_or("unset"),
                reason = ?resolution.reason(),
                "status updated"
            );
        }

        if resolution.archive && outcome.failures.is_empty() {
            match coordinator.seal(key) {
                Ok(Relocation::Moved) => {
                    outcome.archived = true;
                    info!(
                        application = %key,
                        emails = outcome.relocated_emails,
                        "application archived"
                    );
                }
                Ok(Relocation::AlreadyInPlace) => {}
                Err(err) => {
                    warn!(application = %key, error = %err, "failed to archive application");
                    outcome.error = Some(err.to_string());
                }
            }
        }

        Ok(Some(outcome))
    }

    /// Response hints of every email attached to `key`, plus the number of unreadable records.
    fn collect_hints(
        &self,
        key: &ApplicationKey,
    ) -> Result<(Vec<ApplicationStatus>, usize), StoreError> {
        let mut hints = Vec::new();
        let mut unreadable = 0;

        for area in [Area::Active, Area::Archive] {
            for email in self.store.list_emails(key, area)? {
                match email.record {
                    Ok(record) => hints.extend(record.response_hint()),
                    Err(err) => {
                        warn!(
                            application = %key,
                            record = %email.id,
                            error = %err,
                            "unreadable email"
                        );
                        unreadable += 1;
                    }
                }
            }
        }

        Ok((hints, unreadable))
    }
}

/// One email attached to an application by the organize pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub record_id: String,
    pub key: ApplicationKey,
    pub score: u32,
    pub basis: MatchBasis,
}

/// Aggregate counters of one organize pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizeSummary {
    pub assigned: usize,
    pub discarded: usize,
    pub blocked_senders: usize,
    pub unresolved: usize,
    pub untriaged: usize,
    pub errors: usize,
    pub assignments: Vec<Assignment>,
}

/// Attaches unclassified mail to applications using the matcher.
pub struct OrganizeDriver<'a, S> {
    store: &'a S,
    matcher: EmailMatcher,
}

impl<'a, S> OrganizeDriver<'a, S>
where
    S: RecordStore,
{
    pub fn new(store: &'a S, matcher: EmailMatcher) -> Self {
        Self { store, matcher }
    }

    pub fn run(&self) -> Result<OrganizeSummary, StoreError> {
        let applications = self.candidates()?;
        let emails = self.store.list_unclassified()?;
        info!(
            emails = emails.len(),
            applications = applications.len(),
            "organizing unclassified mail"
        );

        let mut summary = OrganizeSummary::default();
        for email in emails {
            let record = match email.record {
                Ok(record) => record,
                Err(err) => {
                    warn!(record = %email.id, error = %err, "unreadable email");
                    summary.errors += 1;
                    continue;
                }
            };

            if record.is_untriaged() {
                summary.untriaged += 1;
                continue;
            }

            match self.matcher.match_email(&record, &applications) {
                MatchOutcome::Discard { sender } => self.discard(&record, sender, &mut summary),
                MatchOutcome::Matched { candidate, basis } => {
                    let record = EmailRecord {
                        assigned: true,
                        ..record
                    };
                    match self.store.attach_email(&candidate.key, &record) {
                        Ok(()) => {
                            debug!(
                                record = %record.id,
                                application = %candidate.key,
                                score = candidate.score,
                                basis = ?basis,
                                "email assigned"
                            );
                            summary.assigned += 1;
                            summary.assignments.push(Assignment {
                                record_id: record.id,
                                key: candidate.key,
                                score: candidate.score,
                                basis,
                            });
                        }
                        Err(err) => {
                            warn!(record = %record.id, error = %err, "failed to attach email");
                            summary.errors += 1;
                        }
                    }
                }
                MatchOutcome::Unresolved { best } => {
                    info!(
                        record = %record.id,
                        best_score = best.as_ref().map(|candidate| candidate.score),
                        "no confident match, leaving email unclassified"
                    );
                    summary.unresolved += 1;
                }
            }
        }

        info!(
            assigned = summary.assigned,
            discarded = summary.discarded,
            unresolved = summary.unresolved,
            untriaged = summary.untriaged,
            "organize finished"
        );
        Ok(summary)
    }

    /// The record is only deleted once its sender made it into the ledger.
    fn discard(&self, record: &EmailRecord, sender: Option<String>, summary: &mut OrganizeSummary) {
        if let Some(sender) = sender {
            match self.store.block_sender(&sender) {
                Ok(true) => summary.blocked_senders += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(record = %record.id, error = %err, "failed to record blocked sender");
                    summary.errors += 1;
                    return;
                }
            }
        }

        match self.store.discard_email(&record.id) {
            Ok(()) => summary.discarded += 1,
            Err(err) => {
                warn!(record = %record.id, error = %err, "failed to discard email");
                summary.errors += 1;
            }
        }
    }

    fn candidates(&self) -> Result<Vec<Application>, StoreError> {
        let keys = self.store.list_applications(Area::Active)?;
        Ok(keys
            .into_iter()
            .map(|key| {
                let record = self.store.read_status(&key).unwrap_or_else(|err| {
                    warn!(
                        application = %key,
                        error = %err,
                        "status unreadable, matching by name only"
                    );
                    None
                });
                Application::from_record(key, &record.unwrap_or_default(), None, false)
            })
            .collect())
    }
}
