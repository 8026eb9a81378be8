use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::storage::{
    deserialize_timestamp, KeyValueStore, StorageError, StoredList, ENQUIRIES_KEY,
};

/// Default number of enquiries retained on the device.
pub const ENQUIRY_CAP: usize = 100;

/// Which form produced the enquiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    #[default]
    Enquiry,
    QuickEnquiry,
    MeetingRequest,
}

impl FormType {
    pub fn all() -> &'static [FormType] {
        &[
            FormType::Enquiry,
            FormType::QuickEnquiry,
            FormType::MeetingRequest,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FormType::Enquiry => "enquiry",
            FormType::QuickEnquiry => "quick_enquiry",
            FormType::MeetingRequest => "meeting_request",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown form type '{s}'"))
    }
}

/// Workflow status of a lead. Closed set; nothing else is ever written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnquiryStatus {
    #[default]
    New,
    Contacted,
    Converted,
    Closed,
}

impl EnquiryStatus {
    pub fn all() -> &'static [EnquiryStatus] {
        &[
            EnquiryStatus::New,
            EnquiryStatus::Contacted,
            EnquiryStatus::Converted,
            EnquiryStatus::Closed,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnquiryStatus::New => "new",
            EnquiryStatus::Contacted => "contacted",
            EnquiryStatus::Converted => "converted",
            EnquiryStatus::Closed => "closed",
        }
    }

    /// Capitalised label used in outbound payloads and the admin table.
    pub fn label(self) -> &'static str {
        match self {
            EnquiryStatus::New => "New",
            EnquiryStatus::Contacted => "Contacted",
            EnquiryStatus::Converted => "Converted",
            EnquiryStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for EnquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnquiryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        EnquiryStatus::all()
            .iter()
            .copied()
            .find(|st| st.as_str() == lower)
            .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

/// Form fields as submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEnquiry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub email: String,
    /// The meeting form calls this field `message`.
    #[serde(default, alias = "message")]
    pub requirement: String,
    #[serde(default)]
    pub preferred_date: String,
    #[serde(default)]
    pub meeting_type: String,
}

/// A stored lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enquiry {
    pub id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub requirement: String,
    #[serde(default)]
    pub preferred_date: String,
    #[serde(default)]
    pub meeting_type: String,
    #[serde(default)]
    pub form_type: FormType,
    #[serde(default)]
    pub status: EnquiryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Enquiry {
    /// A fresh lead with a random id and status `New`.
    pub fn new(form: NewEnquiry, form_type: FormType, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            name: form.name,
            company: form.company,
            mobile: form.mobile,
            email: form.email,
            requirement: form.requirement,
            preferred_date: form.preferred_date,
            meeting_type: form.meeting_type,
            form_type,
            status: EnquiryStatus::New,
            updated_at: None,
        }
    }
}

/// Admin edits to an existing lead. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryUpdate {
    pub name: Option<String>,
    pub company: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub requirement: Option<String>,
    pub preferred_date: Option<String>,
    pub meeting_type: Option<String>,
}

impl EnquiryUpdate {
    fn apply(self, enquiry: &mut Enquiry) {
        let fields = [
            (self.name, &mut enquiry.name),
            (self.company, &mut enquiry.company),
            (self.mobile, &mut enquiry.mobile),
            (self.email, &mut enquiry.email),
            (self.requirement, &mut enquiry.requirement),
            (self.preferred_date, &mut enquiry.preferred_date),
            (self.meeting_type, &mut enquiry.meeting_type),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

/// Dashboard counters over the stored leads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnquiryStats {
    pub total: usize,
    pub new: usize,
    pub today: usize,
    pub this_week: usize,
    pub by_type: BTreeMap<FormType, usize>,
    pub by_status: BTreeMap<EnquiryStatus, usize>,
}

/// Lead history over an injected store, newest first, capped.
#[derive(Debug)]
pub struct EnquiryStore<S> {
    store: S,
    cap: usize,
}

impl<S: KeyValueStore> EnquiryStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_cap(store, ENQUIRY_CAP)
    }

    pub fn with_cap(store: S, cap: usize) -> Self {
        Self { store, cap }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Stored leads, newest first. Unreadable data reads as empty.
    pub fn enquiries(&self) -> Vec<Enquiry> {
        self.stored().into_parsed()
    }

    pub fn get(&self, id: &str) -> Option<Enquiry> {
        self.enquiries().into_iter().find(|e| e.id == id)
    }

    /// Build and store a new lead.
    pub fn add(
        &mut self,
        form: NewEnquiry,
        form_type: FormType,
        now: DateTime<Utc>,
    ) -> Result<Enquiry, StorageError> {
        let enquiry = Enquiry::new(form, form_type, now);
        self.insert(enquiry.clone())?;
        Ok(enquiry)
    }

    /// Put `enquiry` at the front, evicting the oldest beyond the cap.
    pub fn insert(&mut self, enquiry: Enquiry) -> Result<(), StorageError> {
        let mut enquiries = self.stored();
        enquiries.push_front(enquiry);
        if enquiries.len() > self.cap {
            debug!("Evicting {} oldest enquiries", enquiries.len() - self.cap);
            enquiries.truncate(self.cap);
        }
        enquiries.save(&mut self.store, ENQUIRIES_KEY)
    }

    /// Returns `false` when no lead has `id`.
    pub fn update_status(
        &mut self,
        id: &str,
        status: EnquiryStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        self.modify(id, now, |e| e.status = status)
    }

    /// Returns `false` when no lead has `id`.
    pub fn update_fields(
        &mut self,
        id: &str,
        update: EnquiryUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        self.modify(id, now, |e| update.apply(e))
    }

    pub fn delete(&mut self, id: &str) -> Result<bool, StorageError> {
        let mut enquiries = self.stored();
        if enquiries.retain(|e| e.id != id) == 0 {
            return Ok(false);
        }
        enquiries.save(&mut self.store, ENQUIRIES_KEY)?;
        info!("Deleted enquiry {id}");
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.store.remove(ENQUIRIES_KEY)
    }

    /// Counters relative to `now`: "today" is the same UTC calendar day,
    /// "this week" the trailing seven days.
    pub fn stats(&self, now: DateTime<Utc>) -> EnquiryStats {
        let enquiries = self.enquiries();
        let week_ago = now - Duration::days(7);

        let mut by_type: BTreeMap<FormType, usize> =
            FormType::all().iter().map(|t| (*t, 0)).collect();
        let mut by_status: BTreeMap<EnquiryStatus, usize> =
            EnquiryStatus::all().iter().map(|s| (*s, 0)).collect();
        for e in &enquiries {
            *by_type.entry(e.form_type).or_insert(0) += 1;
            *by_status.entry(e.status).or_insert(0) += 1;
        }

        EnquiryStats {
            total: enquiries.len(),
            new: by_status[&EnquiryStatus::New],
            today: enquiries
                .iter()
                .filter(|e| e.timestamp.date_naive() == now.date_naive())
                .count(),
            this_week: enquiries.iter().filter(|e| e.timestamp >= week_ago).count(),
            by_type,
            by_status,
        }
    }

    fn modify(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
        change: impl FnOnce(&mut Enquiry),
    ) -> Result<bool, StorageError> {
        let mut enquiries = self.stored();
        let Some(enquiry) = enquiries.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };
        change(enquiry);
        enquiry.updated_at = Some(now);
        enquiries.save(&mut self.store, ENQUIRIES_KEY)?;
        Ok(true)
    }

    fn stored(&self) -> StoredList<Enquiry> {
        StoredList::load(&self.store, ENQUIRIES_KEY)
    }
}
