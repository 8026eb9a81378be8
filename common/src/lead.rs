//! Lead submission: persist locally, then forward to outbound sinks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::enquiry::{Enquiry, EnquiryStore, FormType, NewEnquiry};
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("network error: {0}")]
    Network(String),
    #[error("lead sink answered with HTTP {0}")]
    Status(u16),
}

/// JSON body forwarded to a lead sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPayload {
    pub form_type: FormType,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub company: String,
    pub mobile: String,
    pub email: String,
    pub requirement: String,
    pub preferred_date: String,
    pub meeting_type: String,
    pub status: &'static str,
}

impl From<&Enquiry> for LeadPayload {
    fn from(e: &Enquiry) -> Self {
        Self {
            form_type: e.form_type,
            timestamp: e.timestamp,
            name: e.name.clone(),
            company: e.company.clone(),
            mobile: e.mobile.clone(),
            email: e.email.clone(),
            requirement: e.requirement.clone(),
            preferred_date: e.preferred_date.clone(),
            meeting_type: e.meeting_type.clone(),
            status: e.status.label(),
        }
    }
}

/// An outbound destination for leads.
#[allow(async_fn_in_trait)]
pub trait LeadSink {
    async fn deliver(&self, payload: &LeadPayload) -> Result<(), SinkError>;

    fn sink_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub sink: String,
    pub error: Option<SinkError>,
}

impl DeliveryOutcome {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// What happened to one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    pub enquiry: Enquiry,
    pub stored: bool,
    pub deliveries: Vec<DeliveryOutcome>,
}

impl SubmissionReport {
    /// True when the lead landed somewhere.
    pub fn success(&self) -> bool {
        self.stored || self.deliveries.iter().any(DeliveryOutcome::delivered)
    }
}

/// Save the lead on the device, then forward it to every sink in order.
///
/// Failures on either path are logged and recorded in the report; none of
/// them abort the remaining steps.
pub async fn submit_enquiry<S, K>(
    store: &mut EnquiryStore<S>,
    sinks: &[K],
    form: NewEnquiry,
    form_type: FormType,
    now: DateTime<Utc>,
) -> SubmissionReport
where
    S: KeyValueStore,
    K: LeadSink,
{
    let enquiry = Enquiry::new(form, form_type, now);

    let stored = match store.insert(enquiry.clone()) {
        Ok(()) => true,
        Err(e) => {
            error!("Could not save enquiry {} locally: {e}", enquiry.id);
            false
        }
    };

    let payload = LeadPayload::from(&enquiry);
    let mut deliveries = Vec::with_capacity(sinks.len());
    for sink in sinks {
        let outcome = sink.deliver(&payload).await;
        match &outcome {
            Ok(()) => info!("Forwarded {} to {}", form_type, sink.sink_name()),
            Err(e) => warn!("Forwarding {} to {} failed: {e}", form_type, sink.sink_name()),
        }
        deliveries.push(DeliveryOutcome {
            sink: sink.sink_name().to_string(),
            error: outcome.err(),
        });
    }

    SubmissionReport {
        enquiry,
        stored,
        deliveries,
    }
}
