use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{ApplicationKey, Area, EmailRecord, StatusRecord};

/// Storage abstraction so the matcher, resolver, and drivers can be exercised in isolation.
///
/// All relocation operations are idempotent and keyed by record identity: asking for a record
/// that already sits in the destination area is a successful no-op.
pub trait RecordStore {
    /// Applications whose directory lives in `area`, in key order.
    fn list_applications(&self, area: Area) -> Result<Vec<ApplicationKey>, StoreError>;
    /// `Ok(None)` when the application has no status record yet.
    fn read_status(&self, key: &ApplicationKey) -> Result<Option<StatusRecord>, StoreError>;
    fn write_status(&self, key: &ApplicationKey, record: &StatusRecord) -> Result<(), StoreError>;
    /// Posting details registered with the application, if any.
    fn read_posting(&self, key: &ApplicationKey) -> Result<Option<PostingInfo>, StoreError>;

    fn read_deadline(&self, key: &ApplicationKey) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self.read_posting(key)?.and_then(|posting| posting.deadline))
    }

    /// Email records attached to `key` in `area`, in identity order.
    ///
    /// Unreadable records are reported individually so one corrupt file does not hide its
    /// siblings.
    fn list_emails(&self, key: &ApplicationKey, area: Area)
        -> Result<Vec<StoredEmail>, StoreError>;

    /// Make sure `record` sits in `to` for `key`, moving it out of `from` if needed.
    fn ensure_email_in(
        &self,
        key: &ApplicationKey,
        record_id: &str,
        from: Area,
        to: Area,
    ) -> Result<Relocation, StoreError>;

    /// Make sure the application directory itself sits in `to`.
    fn ensure_application_in(&self, key: &ApplicationKey, to: Area)
        -> Result<Relocation, StoreError>;

    /// Unclassified email records, in identity order.
    fn list_unclassified(&self) -> Result<Vec<StoredEmail>, StoreError>;

    /// Store `record` (already marked assigned) under `key` in the active area and drop the
    /// unclassified copy.
    fn attach_email(&self, key: &ApplicationKey, record: &EmailRecord) -> Result<(), StoreError>;

    /// Delete an unclassified record.
    fn discard_email(&self, record_id: &str) -> Result<(), StoreError>;

    /// Add `address` to the blocked-sender ledger. Returns `false` when it was already listed.
    fn block_sender(&self, address: &str) -> Result<bool, StoreError>;
}

/// An email record as listed by the store. The identity survives even when the payload
/// cannot be parsed, so corrupt records can still be relocated.
#[derive(Debug)]
pub struct StoredEmail {
    pub id: String,
    pub record: Result<EmailRecord, StoreError>,
}

/// Posting details kept next to the status record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingInfo {
    /// Deadline exactly as entered, before parsing.
    pub deadline_raw: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub link: Option<String>,
}

/// Outcome of an idempotent relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relocation {
    Moved,
    AlreadyInPlace,
}

/// Error enumeration for record store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("application {0} not found")]
    MissingApplication(ApplicationKey),
    #[error("email record {record} not found for {key:?}")]
    MissingEmail {
        key: Option<ApplicationKey>,
        record: String,
    },
    #[error("application {0} exists in both the active and archive areas")]
    Conflict(ApplicationKey),
    #[error("unsupported relocation of {subject} from {from:?} to {to:?}")]
    UnsupportedRelocation {
        subject: String,
        from: Area,
        to: Area,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, StoreError::Malformed { .. })
    }
}
