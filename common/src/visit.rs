//! First-party visit log for the admin dashboard.
//!
//! One record is appended per browsing session (the session-scoped store
//! decides what a session is). Classification of user agents, referrers and
//! campaign tags is pure and lives on the record types.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::storage::{
    deserialize_timestamp, read_list, read_string, KeyValueStore, StorageError, StoredList,
    VISITOR_ID_KEY, VISITOR_SESSION_KEY, VISIT_COUNT_KEY, VISIT_LOG_KEY,
};

pub const VISIT_CAP: usize = 200;
const TOP_PAGES: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    #[default]
    Desktop,
    Tablet,
}

impl DeviceClass {
    pub fn from_user_agent(ua: &str) -> Self {
        let ua = ua.to_ascii_lowercase();
        let any = |needles: &[&str]| needles.iter().any(|n| ua.contains(n));
        if any(&["tablet", "ipad", "playbook", "silk"]) {
            DeviceClass::Tablet
        } else if any(&[
            "mobile",
            "iphone",
            "ipod",
            "android",
            "blackberry",
            "opera mini",
            "iemobile",
        ]) {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrowserClass {
    Firefox,
    Chrome,
    Safari,
    Edge,
    Opera,
    #[default]
    Other,
}

impl BrowserClass {
    /// Order matters: Chromium-based agents also advertise Safari, and Edge
    /// advertises Chrome.
    pub fn from_user_agent(ua: &str) -> Self {
        if ua.contains("Firefox") {
            BrowserClass::Firefox
        } else if ua.contains("Chrome") && !ua.contains("Edg") {
            BrowserClass::Chrome
        } else if ua.contains("Safari") && !ua.contains("Chrome") {
            BrowserClass::Safari
        } else if ua.contains("Edg") {
            BrowserClass::Edge
        } else if ua.contains("Opera") || ua.contains("OPR") {
            BrowserClass::Opera
        } else {
            BrowserClass::Other
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficSource {
    #[default]
    Direct,
    Google,
    Facebook,
    Linkedin,
    Twitter,
    Instagram,
    Youtube,
    Whatsapp,
    Referral,
    Unknown,
}

impl TrafficSource {
    pub fn from_referrer(referrer: &str) -> Self {
        if referrer.is_empty() {
            return TrafficSource::Direct;
        }
        let Ok(url) = Url::parse(referrer) else {
            return TrafficSource::Unknown;
        };
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let rules: [(&[&str], TrafficSource); 7] = [
            (&["google"], TrafficSource::Google),
            (&["facebook", "fb.com"], TrafficSource::Facebook),
            (&["linkedin"], TrafficSource::Linkedin),
            (&["twitter", "x.com"], TrafficSource::Twitter),
            (&["instagram"], TrafficSource::Instagram),
            (&["youtube"], TrafficSource::Youtube),
            (&["whatsapp"], TrafficSource::Whatsapp),
        ];
        rules
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| host.contains(n)))
            .map(|(_, source)| *source)
            .unwrap_or(TrafficSource::Referral)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrafficSource::Direct => "direct",
            TrafficSource::Google => "google",
            TrafficSource::Facebook => "facebook",
            TrafficSource::Linkedin => "linkedin",
            TrafficSource::Twitter => "twitter",
            TrafficSource::Instagram => "instagram",
            TrafficSource::Youtube => "youtube",
            TrafficSource::Whatsapp => "whatsapp",
            TrafficSource::Referral => "referral",
            TrafficSource::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TrafficSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UTM tags from the landing URL. Missing tags are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignTags {
    #[serde(rename = "utm_source", default)]
    pub source: String,
    #[serde(rename = "utm_medium", default)]
    pub medium: String,
    #[serde(rename = "utm_campaign", default)]
    pub campaign: String,
}

impl CampaignTags {
    pub fn from_url(page_url: &str) -> Self {
        let Ok(url) = Url::parse(page_url) else {
            return Self::default();
        };
        let mut tags = Self::default();
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "utm_source" => &mut tags.source,
                "utm_medium" => &mut tags.medium,
                "utm_campaign" => &mut tags.campaign,
                _ => continue,
            };
            if slot.is_empty() {
                *slot = value.into_owned();
            }
        }
        tags
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.medium.is_empty() && self.campaign.is_empty()
    }
}

/// What the host page knows about the current view.
#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub page: String,
    pub title: String,
    pub url: String,
    pub user_agent: String,
    pub referrer: String,
    pub language: String,
    /// `<width>x<height>`, when the host knows it.
    pub screen_size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    pub visitor_id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Only present on records written by older site builds.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub page_title: String,
    #[serde(default)]
    pub device: DeviceClass,
    #[serde(default)]
    pub browser: BrowserClass,
    #[serde(default)]
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub screen_size: String,
    #[serde(default)]
    pub source: TrafficSource,
    #[serde(default)]
    pub referrer: String,
    #[serde(flatten)]
    pub campaign: CampaignTags,
    #[serde(default)]
    pub visit_count: u32,
    #[serde(default)]
    pub is_new_session: bool,
    #[serde(default)]
    pub is_new_visitor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCount {
    pub page: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitStats {
    pub total: usize,
    pub unique_visitors: usize,
    pub new_visitors: usize,
    pub today: usize,
    pub this_week: usize,
    pub by_device: BTreeMap<DeviceClass, usize>,
    pub by_source: BTreeMap<TrafficSource, usize>,
    pub top_pages: Vec<PageCount>,
}

/// Tracks visits over a device-local store `L` and a session-scoped store `S`.
#[derive(Debug)]
pub struct VisitTracker<L, S> {
    local: L,
    session: S,
    cap: usize,
}

impl<L: KeyValueStore, S: KeyValueStore> VisitTracker<L, S> {
    pub fn new(local: L, session: S) -> Self {
        Self::with_cap(local, session, VISIT_CAP)
    }

    pub fn with_cap(local: L, session: S, cap: usize) -> Self {
        Self {
            local,
            session,
            cap,
        }
    }

    pub fn into_inner(self) -> (L, S) {
        (self.local, self.session)
    }

    /// Record a page view. Storage problems are logged; tracking never fails.
    pub fn track_page_view(&mut self, view: PageView, now: DateTime<Utc>) -> VisitRecord {
        let new_session = self.start_session_if_needed(now);
        let visit_count = if new_session {
            self.increment_visit_count()
        } else {
            self.visit_count()
        };

        let record = VisitRecord {
            visitor_id: self.visitor_id(),
            timestamp: now,
            fingerprint: String::new(),
            page: if view.page.is_empty() { "/".to_string() } else { view.page },
            page_title: view.title,
            device: DeviceClass::from_user_agent(&view.user_agent),
            browser: BrowserClass::from_user_agent(&view.user_agent),
            language: view.language,
            screen_size: view.screen_size,
            source: TrafficSource::from_referrer(&view.referrer),
            referrer: view.referrer,
            campaign: CampaignTags::from_url(&view.url),
            visit_count,
            is_new_session: new_session,
            is_new_visitor: visit_count == 1,
        };

        if new_session {
            if let Err(e) = self.append(record.clone()) {
                warn!("Error storing visit: {e}");
            }
        }
        record
    }

    /// Logged visits, newest first.
    pub fn visits(&self) -> Vec<VisitRecord> {
        read_list(&self.local, VISIT_LOG_KEY)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> VisitStats {
        let visits = self.visits();
        let week_ago = now - Duration::days(7);

        let mut by_device: BTreeMap<DeviceClass, usize> = [
            DeviceClass::Mobile,
            DeviceClass::Desktop,
            DeviceClass::Tablet,
        ]
        .into_iter()
        .map(|d| (d, 0))
        .collect();
        let mut by_source = BTreeMap::new();
        let mut pages: HashMap<&str, usize> = HashMap::new();
        for v in &visits {
            *by_device.entry(v.device).or_insert(0) += 1;
            *by_source.entry(v.source).or_insert(0) += 1;
            *pages.entry(v.page.as_str()).or_insert(0) += 1;
        }

        let mut top_pages: Vec<PageCount> = pages
            .into_iter()
            .map(|(page, count)| PageCount {
                page: page.to_string(),
                count,
            })
            .collect();
        top_pages.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.page.cmp(&b.page)));
        top_pages.truncate(TOP_PAGES);

        VisitStats {
            total: visits.len(),
            unique_visitors: visits
                .iter()
                .map(|v| v.visitor_id.as_str())
                .collect::<HashSet<_>>()
                .len(),
            new_visitors: visits.iter().filter(|v| v.is_new_visitor).count(),
            today: visits
                .iter()
                .filter(|v| v.timestamp.date_naive() == now.date_naive())
                .count(),
            this_week: visits.iter().filter(|v| v.timestamp >= week_ago).count(),
            by_device,
            by_source,
            top_pages,
        }
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.local.remove(VISIT_LOG_KEY)
    }

    /// Stable per-device id, created on first use.
    pub fn visitor_id(&mut self) -> String {
        if let Some(id) = read_string(&self.local, VISITOR_ID_KEY).filter(|id| !id.is_empty()) {
            return id;
        }
        let id = format!("v_{}", Uuid::new_v4().simple());
        if let Err(e) = self.local.set(VISITOR_ID_KEY, &id) {
            warn!("Could not persist visitor id: {e}");
        }
        id
    }

    pub fn visit_count(&self) -> u32 {
        read_string(&self.local, VISIT_COUNT_KEY)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }

    fn increment_visit_count(&mut self) -> u32 {
        let count = self.visit_count().saturating_add(1);
        if let Err(e) = self.local.set(VISIT_COUNT_KEY, &count.to_string()) {
            warn!("Could not persist visit count: {e}");
        }
        count
    }

    fn start_session_if_needed(&mut self, now: DateTime<Utc>) -> bool {
        if read_string(&self.session, VISITOR_SESSION_KEY).is_some() {
            return false;
        }
        if let Err(e) = self
            .session
            .set(VISITOR_SESSION_KEY, &now.timestamp_millis().to_string())
        {
            warn!("Could not mark visitor session: {e}");
        }
        debug!("New visitor session at {now}");
        true
    }

    fn append(&mut self, record: VisitRecord) -> Result<(), StorageError> {
        let mut visits: StoredList<VisitRecord> = StoredList::load(&self.local, VISIT_LOG_KEY);
        visits.push_front(record);
        visits.truncate(self.cap);
        visits.save(&mut self.local, VISIT_LOG_KEY)
    }
}
