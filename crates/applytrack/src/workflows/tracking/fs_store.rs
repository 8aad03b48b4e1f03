//! Filesystem-backed record store.
//!
//! ```text
//! <root>/Solicitaties/<key>/stats.json          status record
//! <root>/Solicitaties/<key>/relevant_info.json  posting details (deadline)
//! <root>/Solicitaties/1.Archief/<key>/          archived applications
//! <root>/Email/Processing/<id>.json             unclassified mail
//! <root>/Email/Processing/unrelated_email_senders.json  blocked sender ledger
//! <root>/Email/Ongoing/<key>/<id>.json          mail of active applications
//! <root>/Email/Archive/<key>/<id>.json          mail of archived applications
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::domain::{parse_deadline, ApplicationKey, Area, EmailRecord, StatusRecord};
use super::store::{PostingInfo, RecordStore, Relocation, StoreError, StoredEmail};

const STATUS_FILE: &str = "stats.json";
const INFO_FILE: &str = "relevant_info.json";
const BLOCKED_SENDERS_FILE: &str = "unrelated_email_senders.json";

/// Bookkeeping files that live next to unclassified mail but are not messages.
const LEDGER_FILES: &[&str] = &[BLOCKED_SENDERS_FILE, "rejected_companies.json"];

/// Directory layout of a tracker root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub applications: PathBuf,
    pub applications_archive: PathBuf,
    pub unclassified: PathBuf,
    pub email_active: PathBuf,
    pub email_archive: PathBuf,
    pub blocked_senders: PathBuf,
}

impl StoreLayout {
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let applications = root.join("Solicitaties");
        let email = root.join("Email");
        let unclassified = email.join("Processing");

        Self {
            applications_archive: applications.join("1.Archief"),
            applications,
            blocked_senders: unclassified.join(BLOCKED_SENDERS_FILE),
            unclassified,
            email_active: email.join("Ongoing"),
            email_archive: email.join("Archive"),
        }
    }

    fn application_dir(&self, area: Area) -> Option<&Path> {
        match area {
            Area::Active => Some(&self.applications),
            Area::Archive => Some(&self.applications_archive),
            Area::Unclassified => None,
        }
    }

    fn email_dir(&self, area: Area) -> &Path {
        match area {
            Area::Unclassified => &self.unclassified,
            Area::Active => &self.email_active,
            Area::Archive => &self.email_archive,
        }
    }
}

/// Record store operating directly on the JSON files of a tracker root.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    layout: StoreLayout,
}

impl FileRecordStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn open(root: impl AsRef<Path>) -> Self {
        Self::new(StoreLayout::under(root))
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Directory currently holding the application, active location first.
    fn locate(&self, key: &ApplicationKey) -> Result<PathBuf, StoreError> {
        [Area::Active, Area::Archive]
            .into_iter()
            .filter_map(|area| self.layout.application_dir(area))
            .map(|dir| dir.join(key.as_str()))
            .find(|path| path.is_dir())
            .ok_or_else(|| StoreError::MissingApplication(key.clone()))
    }

    fn email_path(&self, key: Option<&ApplicationKey>, area: Area, record_id: &str) -> PathBuf {
        let dir = self.layout.email_dir(area);
        let dir = match key {
            Some(key) => dir.join(key.as_str()),
            None => dir.to_path_buf(),
        };
        dir.join(format!("{record_id}.json"))
    }

    fn read_email_dir(&self, dir: &Path) -> Result<Vec<StoredEmail>, StoreError> {
        let records = json_files(dir)?
            .into_iter()
            .filter(|path| !is_ledger_file(path))
            .map(|path| {
                let id = file_stem(&path);
                let record = read_json::<EmailRecord>(&path).map(|mut record| {
                    record.id = id.clone();
                    record
                });
                StoredEmail { id, record }
            })
            .collect();
        Ok(records)
    }
}

impl RecordStore for FileRecordStore {
    fn list_applications(&self, area: Area) -> Result<Vec<ApplicationKey>, StoreError> {
        let Some(dir) = self.layout.application_dir(area) else {
            return Ok(Vec::new());
        };
        let archive_name = self.layout.applications_archive.file_name();

        let mut keys: Vec<ApplicationKey> = sub_dirs(dir)?
            .into_iter()
            .filter(|path| area != Area::Active || path.file_name() != archive_name)
            .map(|path| file_name(&path))
            .filter(|name| !name.starts_with('.') && name != "Archief")
            .map(ApplicationKey)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn read_status(&self, key: &ApplicationKey) -> Result<Option<StatusRecord>, StoreError> {
        let path = self.locate(key)?.join(STATUS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    fn write_status(&self, key: &ApplicationKey, record: &StatusRecord) -> Result<(), StoreError> {
        let path = self.locate(key)?.join(STATUS_FILE);
        write_json(&path, record)
    }

    fn read_posting(&self, key: &ApplicationKey) -> Result<Option<PostingInfo>, StoreError> {
        let path = self.locate(key)?.join(INFO_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let info: Value = read_json(&path)?;
        let text = |field: &str| {
            info.get(field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let deadline_raw = text("Deadline");
        Ok(Some(PostingInfo {
            deadline: deadline_raw.as_deref().and_then(parse_deadline),
            deadline_raw,
            link: text("Link"),
        }))
    }

    fn list_emails(
        &self,
        key: &ApplicationKey,
        area: Area,
    ) -> Result<Vec<StoredEmail>, StoreError> {
        if area == Area::Unclassified {
            return Ok(Vec::new());
        }
        self.read_email_dir(&self.layout.email_dir(area).join(key.as_str()))
    }

    fn ensure_email_in(
        &self,
        key: &ApplicationKey,
        record_id: &str,
        from: Area,
        to: Area,
    ) -> Result<Relocation, StoreError> {
        if from == Area::Unclassified || to == Area::Unclassified || from == to {
            return Err(StoreError::UnsupportedRelocation {
                subject: record_id.to_string(),
                from,
                to,
            });
        }

        let source = self.email_path(Some(key), from, record_id);
        let destination = self.email_path(Some(key), to, record_id);

        let relocation = match (source.exists(), destination.exists()) {
            (false, true) => return Ok(Relocation::AlreadyInPlace),
            (false, false) => {
                return Err(StoreError::MissingEmail {
                    key: Some(key.clone()),
                    record: record_id.to_string(),
                })
            }
            // Relocated records are immutable, so a leftover source copy is a stale duplicate.
            (true, true) => {
                fs::remove_file(&source).map_err(|err| StoreError::io(&source, err))?;
                Relocation::Moved
            }
            (true, false) => {
                create_parent(&destination)?;
                fs::rename(&source, &destination).map_err(|err| StoreError::io(&source, err))?;
                Relocation::Moved
            }
        };

        if let Some(parent) = source.parent() {
            remove_if_empty(parent);
        }
        Ok(relocation)
    }

    fn ensure_application_in(
        &self,
        key: &ApplicationKey,
        to: Area,
    ) -> Result<Relocation, StoreError> {
        let from = match to {
            Area::Active => Area::Archive,
            Area::Archive => Area::Active,
            Area::Unclassified => {
                return Err(StoreError::UnsupportedRelocation {
                    subject: key.to_string(),
                    from: Area::Active,
                    to,
                })
            }
        };

        let source = self
            .layout
            .application_dir(from)
            .map(|dir| dir.join(key.as_str()))
            .ok_or_else(|| StoreError::MissingApplication(key.clone()))?;
        let destination = self
            .layout
            .application_dir(to)
            .map(|dir| dir.join(key.as_str()))
            .ok_or_else(|| StoreError::MissingApplication(key.clone()))?;

        match (source.is_dir(), destination.is_dir()) {
            (false, true) => Ok(Relocation::AlreadyInPlace),
            (false, false) => Err(StoreError::MissingApplication(key.clone())),
            (true, true) => Err(StoreError::Conflict(key.clone())),
            (true, false) => {
                create_parent(&destination)?;
                fs::rename(&source, &destination).map_err(|err| StoreError::io(&source, err))?;
                debug!(application = %key, to = to.label(), "relocated application directory");
                Ok(Relocation::Moved)
            }
        }
    }

    fn list_unclassified(&self) -> Result<Vec<StoredEmail>, StoreError> {
        self.read_email_dir(&self.layout.unclassified)
    }

    fn attach_email(&self, key: &ApplicationKey, record: &EmailRecord) -> Result<(), StoreError> {
        let destination = self.email_path(Some(key), Area::Active, &record.id);
        create_parent(&destination)?;
        write_json(&destination, record)?;

        let source = self.email_path(None, Area::Unclassified, &record.id);
        match fs::remove_file(&source) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io(&source, err)),
        }
    }

    fn discard_email(&self, record_id: &str) -> Result<(), StoreError> {
        let path = self.email_path(None, Area::Unclassified, record_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::MissingEmail {
                key: None,
                record: record_id.to_string(),
            }),
            Err(err) => Err(StoreError::io(&path, err)),
        }
    }

    fn block_sender(&self, address: &str) -> Result<bool, StoreError> {
        let path = &self.layout.blocked_senders;
        let mut senders: Vec<String> = if path.exists() {
            read_json(path)?
        } else {
            Vec::new()
        };

        if senders.iter().any(|sender| sender.eq_ignore_ascii_case(address)) {
            return Ok(false);
        }

        senders.push(address.to_string());
        create_parent(path)?;
        write_json(path, &senders)?;
        Ok(true)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let raw = fs::read_to_string(path).map_err(|err| StoreError::io(path, err))?;
    serde_json::from_str(raw.trim_start_matches('\u{feff}')).map_err(|source| {
        StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Write through a sibling temp file so a crash never leaves a truncated record.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut payload = serde_json::to_string_pretty(value).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    payload.push('\n');

    let staging = path.with_extension("json.tmp");
    fs::write(&staging, payload).map_err(|err| StoreError::io(&staging, err))?;
    fs::rename(&staging, path).map_err(|err| StoreError::io(path, err))
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err)),
        None => Ok(()),
    }
}

fn remove_if_empty(dir: &Path) {
    let is_empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if is_empty {
        // Best effort: an empty leftover directory is harmless.
        let _ = fs::remove_dir(dir);
    }
}

fn sub_dirs(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    entries(dir).map(|paths| paths.into_iter().filter(|path| path.is_dir()).collect())
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files: Vec<PathBuf> = entries(dir)?
        .into_iter()
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn entries(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let reader = match fs::read_dir(dir) {
        Ok(reader) => reader,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(StoreError::io(dir, err)),
    };

    reader
        .map(|entry| {
            entry
                .map(|entry| entry.path())
                .map_err(|err| StoreError::io(dir, err))
        })
        .collect()
}

fn is_ledger_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| LEDGER_FILES.contains(&name))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
