//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::Notify;
use vigil::normalize::normalize_endpoint;
use vigil::{EndpointConfig, ProbeRequest, ProbeResponse, Submission, Transport};

/// One scripted transport reaction
pub enum Step {
    Respond(u16, &'static str),
    Fail(&'static str),
    /// Never answers; only the probe timeout ends it
    Hang,
    /// Signals `started`, waits for `release`, then answers 200
    Gated(Arc<Gate>),
}

#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

/// Transport answering from a per-URL script. Unscripted URLs, and URLs whose
/// script ran out, answer `200 OK`.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    requests: Mutex<Vec<ProbeRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts.lock().unwrap().insert(url.to_string(), steps.into_iter().collect());
        self
    }

    pub fn requests(&self) -> Vec<ProbeRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ProbeRequest) -> anyhow::Result<ProbeResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self.scripts.lock().unwrap().get_mut(&request.url).and_then(VecDeque::pop_front);

        match step {
            None => Ok(response(200, "OK")),
            Some(Step::Respond(status, body)) => Ok(response(status, body)),
            Some(Step::Fail(message)) => Err(anyhow::anyhow!(message)),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::Gated(gate)) => {
                gate.started.notify_one();
                gate.release.notified().await;
                Ok(response(200, "OK"))
            }
        }
    }
}

fn response(status: u16, body: &str) -> ProbeResponse {
    ProbeResponse { status, body: body.to_string(), latency_ms: 3 }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn submission(value: Value) -> Submission {
    Submission::from_json(value).unwrap()
}

/// A normalized endpoint probing `url` every `interval_minutes`
pub fn endpoint(name: &str, url: &str, interval_minutes: u32) -> EndpointConfig {
    normalize_endpoint(&submission(json!({
        "name": name,
        "url": url,
        "interval_minutes": interval_minutes,
    })))
    .unwrap()
}
