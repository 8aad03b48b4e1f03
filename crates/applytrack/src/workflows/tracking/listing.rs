use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use super::domain::{ApplicationKey, ApplicationStatus, Area, StatusRecord};
use super::store::{RecordStore, StoreError};

/// One row of the application overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationListing {
    pub folder_name: String,
    pub role: String,
    pub company: Option<String>,
    pub status: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub application_link: Option<String>,
    pub location: &'static str,
}

/// Active application whose posting has no usable deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDeadline {
    pub key: ApplicationKey,
    /// Deadline text as entered, when present but unparsable.
    pub raw: Option<String>,
    pub link: Option<String>,
}

/// Ongoing application ranked by how soon its posting closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingDeadline {
    pub key: ApplicationKey,
    pub status: Option<String>,
    pub deadline: Option<NaiveDate>,
    /// Days from the run date to the deadline; negative once it has passed.
    pub days_left: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to encode listing as json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to encode listing as csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write listing: {0}")]
    Io(#[from] std::io::Error),
}

/// Every application in both areas, sorted by location then role.
///
/// Unreadable status or posting records leave the corresponding columns empty.
pub fn list_applications<S: RecordStore>(
    store: &S,
) -> Result<Vec<ApplicationListing>, StoreError> {
    let mut listings = Vec::new();
    for area in [Area::Active, Area::Archive] {
        for key in store.list_applications(area)? {
            let (listing, _) = listing_row(store, key, area);
            listings.push(listing);
        }
    }

    listings.sort_by(|left, right| (left.location, &left.role).cmp(&(right.location, &right.role)));
    Ok(listings)
}

/// Active applications still marked Unsent, sorted by role.
pub fn unsent_applications<S: RecordStore>(
    store: &S,
) -> Result<Vec<ApplicationListing>, StoreError> {
    let mut unsent = Vec::new();
    for key in store.list_applications(Area::Active)? {
        let (listing, status) = listing_row(store, key, Area::Active);
        if status.and_then(|record| record.status()) == Some(ApplicationStatus::Unsent) {
            unsent.push(listing);
        }
    }

    unsent.sort_by(|left, right| left.role.cmp(&right.role));
    Ok(unsent)
}

fn listing_row<S: RecordStore>(
    store: &S,
    key: ApplicationKey,
    area: Area,
) -> (ApplicationListing, Option<StatusRecord>) {
    let status = read_status_or_warn(store, &key);
    let posting = store.read_posting(&key).unwrap_or_else(|err| {
        warn!(application = %key, error = %err, "posting details unreadable");
        None
    });

    let listing = ApplicationListing {
        folder_name: key.to_string(),
        role: key.role(),
        company: key.organization(),
        status: status.as_ref().and_then(|record| record.response.clone()),
        deadline: posting.as_ref().and_then(|posting| posting.deadline),
        application_link: posting.and_then(|posting| posting.link),
        location: area.label(),
    };
    (listing, status)
}

fn read_status_or_warn<S: RecordStore>(store: &S, key: &ApplicationKey) -> Option<StatusRecord> {
    store.read_status(key).unwrap_or_else(|err| {
        warn!(application = %key, error = %err, "status unreadable");
        None
    })
}

/// Ongoing active applications, soonest deadline first; undated ones follow in key order.
///
/// Applications flagged or resolved as rejected are left out.
pub fn upcoming_deadlines<S: RecordStore>(
    store: &S,
    today: NaiveDate,
) -> Result<Vec<UpcomingDeadline>, StoreError> {
    let mut upcoming = Vec::new();

    for key in store.list_applications(Area::Active)? {
        let status = read_status_or_warn(store, &key);
        let rejected = status.as_ref().is_some_and(|record| {
            record.rejected || record.status() == Some(ApplicationStatus::Rejected)
        });
        if rejected {
            continue;
        }

        let deadline = match store.read_posting(&key) {
            Ok(posting) => posting.and_then(|posting| posting.deadline),
            Err(err) => {
                warn!(application = %key, error = %err, "posting details unreadable");
                None
            }
        };
        upcoming.push(UpcomingDeadline {
            key,
            status: status.and_then(|record| record.response),
            deadline,
            days_left: deadline.map(|deadline| (deadline - today).num_days()),
        });
    }

    upcoming.sort_by(|left, right| {
        (left.deadline.is_none(), left.deadline, &left.key)
            .cmp(&(right.deadline.is_none(), right.deadline, &right.key))
    });
    Ok(upcoming)
}

/// Active applications with posting details but no parsable deadline.
pub fn missing_deadlines<S: RecordStore>(store: &S) -> Result<Vec<MissingDeadline>, StoreError> {
    let mut missing = Vec::new();

    for key in store.list_applications(Area::Active)? {
        let posting = match store.read_posting(&key) {
            Ok(Some(posting)) => posting,
            Ok(None) => continue,
            Err(err) => {
                warn!(application = %key, error = %err, "posting details unreadable");
                continue;
            }
        };

        if posting.deadline.is_none() {
            missing.push(MissingDeadline {
                key,
                raw: posting.deadline_raw,
                link: posting.link,
            });
        }
    }

    Ok(missing)
}

#[derive(Serialize)]
struct JobsDocument<'a> {
    jobs: &'a [ApplicationListing],
    total_count: usize,
}

pub fn write_json<W: Write>(
    listings: &[ApplicationListing],
    mut writer: W,
) -> Result<(), ExportError> {
    let document = JobsDocument {
        jobs: listings,
        total_count: listings.len(),
    };
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_csv<W: Write>(
    listings: &[ApplicationListing],
    writer: W,
) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for listing in listings {
        csv.serialize(listing)?;
    }
    csv.flush()?;
    Ok(())
}
