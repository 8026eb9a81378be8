//! Lead capture, visit log and admin session over file-backed storage.

use apex_catalog_integration::fixture::FixtureServer;
use apex_catalog_integration::init_tracing;
use apex_common::config::SiteConfig;
use apex_common::enquiry::{EnquiryStatus, EnquiryStore, FormType, NewEnquiry};
use apex_common::lead::{submit_enquiry, SinkError};
use apex_common::session::AdminSession;
use apex_common::storage::{FileStore, MemoryStore};
use apex_common::visit::{PageView, TrafficSource, VisitTracker};
use apex_sheets::AppsScriptSink;
use chrono::{Duration, Utc};

fn form() -> NewEnquiry {
    NewEnquiry {
        name: "Kiran".into(),
        company: "Kiran Engineering".into(),
        mobile: "9876501234".into(),
        email: "kiran@example.com".into(),
        requirement: "M16 foundation bolts, 2000 pcs".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn submitted_lead_is_stored_and_forwarded() {
    init_tracing();
    let server = FixtureServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local-store.json");

    let sinks = [AppsScriptSink::new(&server.sink_url()).unwrap()];
    let mut store = EnquiryStore::new(FileStore::open(&path).unwrap());
    let report = submit_enquiry(&mut store, &sinks, form(), FormType::Enquiry, Utc::now()).await;

    assert!(report.success());
    assert!(report.stored);
    assert!(report.deliveries[0].delivered());

    let leads = server.received_leads();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0]["formType"], "enquiry");
    assert_eq!(leads[0]["status"], "New");
    assert_eq!(leads[0]["company"], "Kiran Engineering");

    let reopened = EnquiryStore::new(FileStore::open(&path).unwrap());
    let stored = reopened.enquiries();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, report.enquiry.id);
}

#[tokio::test]
async fn rejected_forward_still_keeps_local_copy() {
    init_tracing();
    let server = FixtureServer::start().await;
    server.set_sink_status(500);

    let sinks = [AppsScriptSink::new(&server.sink_url()).unwrap()];
    let mut store = EnquiryStore::new(MemoryStore::new());
    let report =
        submit_enquiry(&mut store, &sinks, form(), FormType::QuickEnquiry, Utc::now()).await;

    assert!(report.success());
    assert_eq!(report.deliveries[0].error, Some(SinkError::Status(500)));
    assert_eq!(store.enquiries().len(), 1);
    assert_eq!(server.received_leads().len(), 1);
}

#[tokio::test]
async fn admin_workflow_over_stored_leads() {
    init_tracing();
    let now = Utc::now();
    let sinks: [AppsScriptSink; 0] = [];
    let mut store = EnquiryStore::new(MemoryStore::new());
    let first = submit_enquiry(&mut store, &sinks, form(), FormType::Enquiry, now).await;
    submit_enquiry(&mut store, &sinks, form(), FormType::MeetingRequest, now).await;

    let config = SiteConfig::from_json_str(r#"{"sessionMinutes":45}"#).unwrap();
    let mut session = AdminSession::with_lifetime(MemoryStore::new(), config.session_lifetime());
    session.create(now).unwrap();
    assert!(session.is_valid(now + Duration::minutes(30)));

    assert!(store
        .update_status(&first.enquiry.id, EnquiryStatus::Contacted, now)
        .unwrap());
    let stats = store.stats(now);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.new, 1);
    assert_eq!(stats.today, 2);
    assert_eq!(stats.by_type[&FormType::MeetingRequest], 1);

    assert!(!session.is_valid(now + Duration::minutes(50)));
}

#[test]
fn visit_log_persists_per_device() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local-store.json");
    let now = Utc::now();

    let first_id = {
        let mut tracker = VisitTracker::new(FileStore::open(&path).unwrap(), MemoryStore::new());
        let record = tracker.track_page_view(
            PageView {
                page: "/products".into(),
                referrer: "https://www.google.com/".into(),
                user_agent: "Mozilla/5.0 (Linux; Android 14) Mobile".into(),
                ..Default::default()
            },
            now,
        );
        record.visitor_id
    };

    let mut tracker = VisitTracker::new(FileStore::open(&path).unwrap(), MemoryStore::new());
    let again = tracker.track_page_view(
        PageView {
            page: "/contact".into(),
            ..Default::default()
        },
        now,
    );
    assert_eq!(again.visitor_id, first_id);
    assert_eq!(again.visit_count, 2);

    let stats = tracker.stats(now);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.unique_visitors, 1);
    assert_eq!(stats.by_source[&TrafficSource::Google], 1);
    assert_eq!(stats.by_source[&TrafficSource::Direct], 1);
}
