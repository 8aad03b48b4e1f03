//! Reconciliation of job applications, their inbound mail, and canonical status.
//!
//! The matcher attaches unclassified mail to applications, the resolver derives each
//! application's status from the hints on that mail, and the archival coordinator moves
//! finished applications out of the active area. The drivers run those steps as one batch
//! over a [`RecordStore`].

pub mod archival;
pub mod domain;
pub mod driver;
pub mod fs_store;
pub mod listing;
pub mod matcher;
pub mod resolver;
pub mod store;

#[cfg(test)]
mod tests;

pub use archival::{ArchivalCoordinator, ArchivalReport, RelocationFailure};
pub use domain::{
    parse_deadline, Application, ApplicationKey, ApplicationStatus, Area, EmailRecord,
    OrganizationHint, StatusRecord,
};
pub use driver::{
    ApplicationOutcome, Assignment, OrganizeDriver, OrganizeSummary, ReconciliationDriver,
    RunSummary,
};
pub use fs_store::{FileRecordStore, StoreLayout};
pub use listing::{ApplicationListing, ExportError, MissingDeadline, UpcomingDeadline};
pub use matcher::{CandidateScore, EmailMatcher, MatchBasis, MatchOutcome, MatchSignal};
pub use resolver::{ResolutionReason, StatusResolution};
pub use store::{PostingInfo, RecordStore, Relocation, StoreError, StoredEmail};
