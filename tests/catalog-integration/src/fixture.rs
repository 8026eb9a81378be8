//! In-process HTTP stand-in for the spreadsheet and Apps Script endpoints.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use apex_common::sheets::SheetConfig;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::task::JoinHandle;

/// What the sheet endpoint answers with.
#[derive(Debug, Clone)]
pub enum SheetReply {
    Gviz(String),
    Status(u16),
}

#[derive(Debug)]
struct FixtureState {
    sheet: Option<SheetReply>,
    sheet_requests: Vec<String>,
    sink_status: u16,
    leads: Vec<Value>,
}

type Shared = Arc<Mutex<FixtureState>>;

pub struct FixtureServer {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl FixtureServer {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FixtureState {
            sheet: None,
            sheet_requests: Vec::new(),
            sink_status: 200,
            leads: Vec::new(),
        }));
        let app = Router::new()
            .route("/spreadsheets/d/{sheet_id}/gviz/tq", get(serve_sheet))
            .route("/exec", post(receive_lead))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fixture listener");
        let addr = listener.local_addr().expect("fixture address");
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fixture server");
        });
        Self { addr, state, task }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn sink_url(&self) -> String {
        format!("{}/exec", self.base_url())
    }

    /// An enabled sheet config pointing at this server.
    pub fn sheet_config(&self, sheet_id: &str) -> SheetConfig {
        SheetConfig {
            base_url: self.base_url(),
            ..SheetConfig::new(sheet_id)
        }
    }

    pub fn reply_with_gviz(&self, body: impl Into<String>) {
        self.lock().sheet = Some(SheetReply::Gviz(body.into()));
    }

    pub fn reply_with_status(&self, code: u16) {
        self.lock().sheet = Some(SheetReply::Status(code));
    }

    pub fn set_sink_status(&self, code: u16) {
        self.lock().sink_status = code;
    }

    /// Sheet ids requested so far, in order.
    pub fn sheet_requests(&self) -> Vec<String> {
        self.lock().sheet_requests.clone()
    }

    /// JSON bodies posted to the lead endpoint, in order.
    pub fn received_leads(&self) -> Vec<Value> {
        self.lock().leads.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FixtureState> {
        self.state.lock().expect("fixture state poisoned")
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_sheet(
    State(state): State<Shared>,
    Path(sheet_id): Path<String>,
) -> (StatusCode, String) {
    let mut state = state.lock().expect("fixture state poisoned");
    state.sheet_requests.push(sheet_id);
    match state.sheet.clone() {
        Some(SheetReply::Gviz(body)) => (StatusCode::OK, body),
        Some(SheetReply::Status(code)) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            String::new(),
        ),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

async fn receive_lead(State(state): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    let mut state = state.lock().expect("fixture state poisoned");
    state.leads.push(body);
    StatusCode::from_u16(state.sink_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
