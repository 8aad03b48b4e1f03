use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Separator between role and organization in an application key.
pub const KEY_SEPARATOR: &str = "_—_";

/// Sentinel organization hint marking an email as unrelated mail.
pub const DISCARD_HINT: &str = "discard";

/// Stable, human-readable identity of an application (`<Role>_—_<Organization>`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationKey(pub String);

impl ApplicationKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Role part of the key with underscores shown as spaces.
    pub fn role(&self) -> String {
        match self.0.split_once(KEY_SEPARATOR) {
            Some((role, _)) => humanize(role),
            None => humanize(&self.0),
        }
    }

    /// Organization part of the key, if the key carries one.
    pub fn organization(&self) -> Option<String> {
        self.0
            .split_once(KEY_SEPARATOR)
            .map(|(_, organization)| humanize(organization))
            .filter(|organization| !organization.is_empty())
    }
}

impl fmt::Display for ApplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn humanize(raw: &str) -> String {
    raw.replace('_', " ").trim().to_string()
}

/// Canonical application status. Declaration order is the priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Hired,
    Offer,
    #[serde(rename = "Interview Scheduled")]
    InterviewScheduled,
    Received,
    Pending,
    Called,
    Unsent,
    Rejected,
    Expired,
    Other,
}

impl ApplicationStatus {
    pub const fn ordered() -> [Self; 10] {
        [
            Self::Hired,
            Self::Offer,
            Self::InterviewScheduled,
            Self::Received,
            Self::Pending,
            Self::Called,
            Self::Unsent,
            Self::Rejected,
            Self::Expired,
            Self::Other,
        ]
    }

    /// Position in the priority table; lower is more advanced.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Hired => 1,
            Self::Offer => 2,
            Self::InterviewScheduled => 3,
            Self::Received => 4,
            Self::Pending => 5,
            Self::Called => 6,
            Self::Unsent => 7,
            Self::Rejected => 8,
            Self::Expired => 9,
            Self::Other => 10,
        }
    }

    /// Content signals never move an application out of a terminal status.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Hired | Self::Rejected | Self::Expired | Self::Other
        )
    }

    /// Terminal statuses whose records belong in the archive area.
    pub const fn is_archivable(self) -> bool {
        matches!(self, Self::Rejected | Self::Expired | Self::Other)
    }

    /// Statuses that imply the applicant reached an interview.
    pub const fn implies_interview(self) -> bool {
        matches!(self, Self::InterviewScheduled | Self::Offer | Self::Hired)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Hired => "Hired",
            Self::Offer => "Offer",
            Self::InterviewScheduled => "Interview Scheduled",
            Self::Received => "Received",
            Self::Pending => "Pending",
            Self::Called => "Called",
            Self::Unsent => "Unsent",
            Self::Rejected => "Rejected",
            Self::Expired => "Expired",
            Self::Other => "Other",
        }
    }

    /// Lenient parse of stored labels; unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().replace(['_', '-'], " ").to_lowercase();
        Self::ordered()
            .into_iter()
            .find(|status| status.label().to_lowercase() == normalized)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Logical record areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    /// Freshly collected mail that has not been attached to an application.
    Unclassified,
    Active,
    Archive,
}

impl Area {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unclassified => "Unclassified",
            Self::Active => "Active",
            Self::Archive => "Archived",
        }
    }
}

/// Persisted per-application status record (`stats.json`).
///
/// Fields this engine does not own are carried in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(
        rename = "Response",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub response: Option<String>,
    #[serde(rename = "Rejected", default, deserialize_with = "null_as_default")]
    pub rejected: bool,
    #[serde(rename = "Hired", default, deserialize_with = "null_as_default")]
    pub hired: bool,
    #[serde(rename = "Interviewed", default, deserialize_with = "null_as_default")]
    pub interviewed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusRecord {
    pub fn with_status(status: ApplicationStatus) -> Self {
        Self {
            response: Some(status.label().to_string()),
            ..Self::default()
        }
    }

    pub fn status(&self) -> Option<ApplicationStatus> {
        self.response.as_deref().and_then(ApplicationStatus::parse)
    }
}

/// One inbound message as left by the mail collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Record identity, taken from the file stem rather than the payload.
    #[serde(skip)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub assigned: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmailRecord {
    pub fn organization_hint(&self) -> OrganizationHint {
        match self.company.as_deref().map(str::trim) {
            None | Some("") => OrganizationHint::Absent,
            Some(hint) if hint.eq_ignore_ascii_case(DISCARD_HINT) => OrganizationHint::Discard,
            Some(hint) => OrganizationHint::Named(hint.to_string()),
        }
    }

    /// Response hint set by the upstream classifier; unknown labels are ignored.
    pub fn response_hint(&self) -> Option<ApplicationStatus> {
        self.response.as_deref().and_then(ApplicationStatus::parse)
    }

    /// Neither hint has been filled in yet.
    pub fn is_untriaged(&self) -> bool {
        self.organization_hint() == OrganizationHint::Absent && self.response.is_none()
    }

    /// Bare, lower-cased sender address extracted from the `from` header.
    pub fn sender_address(&self) -> Option<String> {
        let from = self.from.as_deref()?.trim();
        let address = match (from.find('<'), from.rfind('>')) {
            (Some(start), Some(end)) if end > start => &from[start + 1..end],
            _ => from,
        };
        let address = address.trim().to_lowercase();
        (!address.is_empty()).then_some(address)
    }

    pub fn sender_domain(&self) -> Option<String> {
        let address = self.sender_address()?;
        address
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_string())
            .filter(|domain| !domain.is_empty())
    }

    pub fn subject_text(&self) -> &str {
        self.subject.as_deref().unwrap_or_default()
    }

    /// Body text used for scoring, falling back to the snippet.
    pub fn body_text(&self) -> &str {
        self.body
            .as_deref()
            .filter(|body| !body.trim().is_empty())
            .or(self.snippet.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationHint {
    Absent,
    Discard,
    Named(String),
}

/// Snapshot of one application assembled from its records for a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub key: ApplicationKey,
    pub role: String,
    pub organization: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub rejected_flag: bool,
    pub hired_flag: bool,
    pub interviewed_flag: bool,
    pub deadline: Option<NaiveDate>,
    pub archived: bool,
}

impl Application {
    pub fn from_record(
        key: ApplicationKey,
        record: &StatusRecord,
        deadline: Option<NaiveDate>,
        archived: bool,
    ) -> Self {
        Self {
            role: key.role(),
            organization: key.organization(),
            status: record.status(),
            rejected_flag: record.rejected,
            hired_flag: record.hired,
            interviewed_flag: record.interviewed,
            deadline,
            archived,
            key,
        }
    }

    pub fn location(&self) -> Area {
        if self.archived {
            Area::Archive
        } else {
            Area::Active
        }
    }
}

/// Parse a deadline in `YYYY-MM-DD`, `YYYY/MM/DD`, or `YYYY.MM.DD` form.
///
/// Placeholders such as `unknown` or `onbekend` and impossible dates yield `None`.
pub fn parse_deadline(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if matches!(
        trimmed.to_lowercase().as_str(),
        "" | "none" | "null" | "unknown" | "onbekend"
    ) {
        return None;
    }

    let normalized = trimmed.replace(['/', '.'], "-");
    let mut parts = normalized.split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || year.len() != 4 || month.len() > 2 || day.len() > 2 {
        return None;
    }

    NaiveDate::from_ymd_opt(
        year.parse().ok()?,
        month.parse().ok()?,
        day.parse().ok()?,
    )
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
