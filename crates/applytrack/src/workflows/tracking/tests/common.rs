use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::workflows::tracking::domain::{
    Application, ApplicationKey, ApplicationStatus, Area, EmailRecord, StatusRecord,
};
use crate::workflows::tracking::store::{
    PostingInfo, RecordStore, Relocation, StoreError, StoredEmail,
};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn key(value: &str) -> ApplicationKey {
    ApplicationKey::new(value)
}

pub(super) fn application(value: &str, status: Option<ApplicationStatus>) -> Application {
    let record = StatusRecord {
        response: status.map(|status| status.label().to_string()),
        ..StatusRecord::default()
    };
    Application::from_record(key(value), &record, None, false)
}

pub(super) fn email(id: &str, from: &str, subject: &str, body: &str) -> EmailRecord {
    EmailRecord {
        id: id.to_string(),
        from: Some(from.to_string()),
        subject: Some(subject.to_string()),
        body: Some(body.to_string()),
        ..EmailRecord::default()
    }
}

pub(super) fn hinted(id: &str, response: Option<&str>, company: Option<&str>) -> EmailRecord {
    EmailRecord {
        id: id.to_string(),
        response: response.map(str::to_string),
        company: company.map(str::to_string),
        ..EmailRecord::default()
    }
}

fn malformed() -> StoreError {
    StoreError::Malformed {
        path: "corrupt.json".into(),
        source: serde_json::from_str::<EmailRecord>("{").expect_err("truncated json"),
    }
}

fn unavailable(subject: &str) -> StoreError {
    StoreError::io(
        subject,
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
    )
}

pub(super) struct MemoryApplication {
    pub(super) area: Area,
    pub(super) status: Option<StatusRecord>,
    pub(super) posting: Option<PostingInfo>,
}

pub(super) struct MemoryEmail {
    pub(super) key: ApplicationKey,
    pub(super) area: Area,
    /// `None` stands for a record whose payload cannot be parsed.
    pub(super) record: Option<EmailRecord>,
}

#[derive(Default)]
pub(super) struct MemoryState {
    pub(super) applications: BTreeMap<ApplicationKey, MemoryApplication>,
    pub(super) emails: BTreeMap<String, MemoryEmail>,
    pub(super) unclassified: BTreeMap<String, Option<EmailRecord>>,
    pub(super) blocked: Vec<String>,
    pub(super) failing_moves: BTreeSet<String>,
    pub(super) failing_writes: BTreeSet<ApplicationKey>,
    pub(super) status_writes: usize,
    pub(super) email_moves: usize,
}

#[derive(Clone, Default)]
pub(super) struct MemoryStore {
    pub(super) state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub(super) fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("state lock")
    }

    pub(super) fn add_application(
        &self,
        name: &str,
        area: Area,
        status: Option<ApplicationStatus>,
    ) -> ApplicationKey {
        let record = StatusRecord {
            response: status.map(|status| status.label().to_string()),
            ..StatusRecord::default()
        };
        self.add_application_record(name, area, Some(record))
    }

    pub(super) fn add_application_record(
        &self,
        name: &str,
        area: Area,
        status: Option<StatusRecord>,
    ) -> ApplicationKey {
        let key = key(name);
        self.state().applications.insert(
            key.clone(),
            MemoryApplication {
                area,
                status,
                posting: None,
            },
        );
        key
    }

    pub(super) fn set_deadline(&self, key: &ApplicationKey, deadline: Option<NaiveDate>) {
        let mut state = self.state();
        let application = state.applications.get_mut(key).expect("known application");
        application.posting = Some(PostingInfo {
            deadline_raw: deadline.map(|date| date.to_string()),
            deadline,
            link: Some(format!("https://jobs.example/{key}")),
        });
    }

    pub(super) fn add_email(&self, key: &ApplicationKey, area: Area, id: &str, response: &str) {
        let record = EmailRecord {
            assigned: true,
            ..hinted(id, Some(response), None)
        };
        self.state().emails.insert(
            id.to_string(),
            MemoryEmail {
                key: key.clone(),
                area,
                record: Some(record),
            },
        );
    }

    pub(super) fn add_corrupt_email(&self, key: &ApplicationKey, area: Area, id: &str) {
        self.state().emails.insert(
            id.to_string(),
            MemoryEmail {
                key: key.clone(),
                area,
                record: None,
            },
        );
    }

    pub(super) fn add_unclassified(&self, record: EmailRecord) {
        self.state()
            .unclassified
            .insert(record.id.clone(), Some(record));
    }

    pub(super) fn add_corrupt_unclassified(&self, id: &str) {
        self.state().unclassified.insert(id.to_string(), None);
    }

    pub(super) fn fail_move(&self, record_id: &str) {
        self.state().failing_moves.insert(record_id.to_string());
    }

    pub(super) fn fail_status_write(&self, key: &ApplicationKey) {
        self.state().failing_writes.insert(key.clone());
    }

    pub(super) fn status(&self, key: &ApplicationKey) -> Option<StatusRecord> {
        self.state()
            .applications
            .get(key)
            .and_then(|application| application.status.clone())
    }

    pub(super) fn area_of(&self, key: &ApplicationKey) -> Option<Area> {
        self.state()
            .applications
            .get(key)
            .map(|application| application.area)
    }

    pub(super) fn email_area(&self, record_id: &str) -> Option<Area> {
        self.state().emails.get(record_id).map(|email| email.area)
    }

    pub(super) fn attached(&self, record_id: &str) -> Option<(ApplicationKey, EmailRecord)> {
        self.state().emails.get(record_id).and_then(|email| {
            email
                .record
                .clone()
                .map(|record| (email.key.clone(), record))
        })
    }

    pub(super) fn blocked(&self) -> Vec<String> {
        self.state().blocked.clone()
    }

    pub(super) fn unclassified_ids(&self) -> Vec<String> {
        self.state().unclassified.keys().cloned().collect()
    }

    /// Number of status writes and email moves performed so far.
    pub(super) fn mutations(&self) -> (usize, usize) {
        let state = self.state();
        (state.status_writes, state.email_moves)
    }
}

impl RecordStore for MemoryStore {
    fn list_applications(&self, area: Area) -> Result<Vec<ApplicationKey>, StoreError> {
        Ok(self
            .state()
            .applications
            .iter()
            .filter(|(_, application)| application.area == area)
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn read_status(&self, key: &ApplicationKey) -> Result<Option<StatusRecord>, StoreError> {
        self.state()
            .applications
            .get(key)
            .map(|application| application.status.clone())
            .ok_or_else(|| StoreError::MissingApplication(key.clone()))
    }

    fn write_status(&self, key: &ApplicationKey, record: &StatusRecord) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.failing_writes.contains(key) {
            return Err(unavailable(key.as_str()));
        }
        let application = state
            .applications
            .get_mut(key)
            .ok_or_else(|| StoreError::MissingApplication(key.clone()))?;
        application.status = Some(record.clone());
        state.status_writes += 1;
        Ok(())
    }

    fn read_posting(&self, key: &ApplicationKey) -> Result<Option<PostingInfo>, StoreError> {
        self.state()
            .applications
            .get(key)
            .map(|application| application.posting.clone())
            .ok_or_else(|| StoreError::MissingApplication(key.clone()))
    }

    fn list_emails(
        &self,
        key: &ApplicationKey,
        area: Area,
    ) -> Result<Vec<StoredEmail>, StoreError> {
        Ok(self
            .state()
            .emails
            .iter()
            .filter(|(_, email)| &email.key == key && email.area == area)
            .map(|(id, email)| StoredEmail {
                id: id.clone(),
                record: email.record.clone().ok_or_else(malformed),
            })
            .collect())
    }

    fn ensure_email_in(
        &self,
        key: &ApplicationKey,
        record_id: &str,
        from: Area,
        to: Area,
    ) -> Result<Relocation, StoreError> {
        let mut state = self.state();
        if state.failing_moves.contains(record_id) {
            return Err(unavailable(record_id));
        }
        let missing = || StoreError::MissingEmail {
            key: Some(key.clone()),
            record: record_id.to_string(),
        };
        let email = state
            .emails
            .get_mut(record_id)
            .filter(|email| &email.key == key)
            .ok_or_else(missing)?;

        if email.area == to {
            return Ok(Relocation::AlreadyInPlace);
        }
        if email.area != from {
            return Err(missing());
        }
        email.area = to;
        state.email_moves += 1;
        Ok(Relocation::Moved)
    }

    fn ensure_application_in(
        &self,
        key: &ApplicationKey,
        to: Area,
    ) -> Result<Relocation, StoreError> {
        let mut state = self.state();
        let application = state
            .applications
            .get_mut(key)
            .ok_or_else(|| StoreError::MissingApplication(key.clone()))?;
        if application.area == to {
            return Ok(Relocation::AlreadyInPlace);
        }
        application.area = to;
        Ok(Relocation::Moved)
    }

    fn list_unclassified(&self) -> Result<Vec<StoredEmail>, StoreError> {
        Ok(self
            .state()
            .unclassified
            .iter()
            .map(|(id, record)| StoredEmail {
                id: id.clone(),
                record: record.clone().ok_or_else(malformed),
            })
            .collect())
    }

    fn attach_email(&self, key: &ApplicationKey, record: &EmailRecord) -> Result<(), StoreError> {
        let mut state = self.state();
        state.unclassified.remove(&record.id);
        state.emails.insert(
            record.id.clone(),
            MemoryEmail {
                key: key.clone(),
                area: Area::Active,
                record: Some(record.clone()),
            },
        );
        Ok(())
    }

    fn discard_email(&self, record_id: &str) -> Result<(), StoreError> {
        self.state()
            .unclassified
            .remove(record_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::MissingEmail {
                key: None,
                record: record_id.to_string(),
            })
    }

    fn block_sender(&self, address: &str) -> Result<bool, StoreError> {
        let mut state = self.state();
        if state
            .blocked
            .iter()
            .any(|sender| sender.eq_ignore_ascii_case(address))
        {
            return Ok(false);
        }
        state.blocked.push(address.to_string());
        Ok(true)
    }
}
