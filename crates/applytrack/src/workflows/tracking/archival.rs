use serde::Serialize;
use tracing::{debug, warn};

use super::domain::{ApplicationKey, Area};
use super::store::{RecordStore, Relocation, StoreError};

/// A single record that could not be placed in the archive area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationFailure {
    pub record_id: String,
    pub reason: String,
}

/// Result of moving one application's mail to the archive area.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchivalReport {
    pub moved: usize,
    pub already_in_place: usize,
    pub failures: Vec<RelocationFailure>,
}

impl ArchivalReport {
    /// Every record of the application now sits in the archive area.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns the physical placement of an application's records once it reaches a final status.
pub struct ArchivalCoordinator<'a, S> {
    store: &'a S,
}

impl<'a, S> ArchivalCoordinator<'a, S>
where
    S: RecordStore,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Ensure every email attached to `key` in the active area is in the archive area.
    ///
    /// A failing record is reported and skipped; its siblings are still moved. Only listing
    /// the active area can fail the whole call.
    pub fn relocate_emails(&self, key: &ApplicationKey) -> Result<ArchivalReport, StoreError> {
        let mut report = ArchivalReport::default();

        for email in self.store.list_emails(key, Area::Active)? {
            match self
                .store
                .ensure_email_in(key, &email.id, Area::Active, Area::Archive)
            {
                Ok(Relocation::Moved) => report.moved += 1,
                Ok(Relocation::AlreadyInPlace) => report.already_in_place += 1,
                Err(err) => {
                    warn!(
                        application = %key,
                        record = %email.id,
                        error = %err,
                        "failed to archive email"
                    );
                    report.failures.push(RelocationFailure {
                        record_id: email.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        debug!(
            application = %key,
            moved = report.moved,
            failed = report.failures.len(),
            "email relocation finished"
        );
        Ok(report)
    }

    /// Move the application itself into the archive area, which marks it archived.
    ///
    /// Callers persist the final status first so an archived application never carries a
    /// non-final status on disk.
    pub fn seal(&self, key: &ApplicationKey) -> Result<Relocation, StoreError> {
        self.store.ensure_application_in(key, Area::Archive)
    }
}
