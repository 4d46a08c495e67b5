#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use iobeam_rs::requester::{status_code_to_result, Method, RawResponse, Request, RequestResult};
use iobeam_rs::{Requester, TokenValidator};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

pub const OK_TOKEN: &str = "dummytoken";
pub const REFRESHED_TOKEN: &str = "refreshtoken";
pub const BAD_TOKEN: &str = "badtoken";
pub const OK_PID: u64 = 1;
pub const OK_USER: &str = "test";
pub const OK_PASS: &str = "correct";
pub const BASE_URL: &str = "dummy/v1";

static LOGGER: Once = Once::new();

pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    });
}

#[derive(Default)]
struct DummyState {
    requests: Vec<Request>,
    events: Vec<String>,
    device_ids: HashSet<String>,
    refresh_fails: bool,
    assigned_id: Option<String>,
}

/// An in-memory stand-in for the API.
///
/// Devices are registered into a set, with 422/code 150 for ids that are taken. The project
/// token endpoint hands out `REFRESHED_TOKEN` for `OK_TOKEN`. Every request is recorded, and
/// tests can append their own events to the same log to check ordering.
#[derive(Default)]
pub struct DummyRequester {
    state: Mutex<DummyState>,
    delay: Option<Duration>,
}

impl DummyRequester {
    pub fn new() -> Arc<DummyRequester> {
        Arc::new(DummyRequester::default())
    }

    /// Every request sleeps for `delay` before it is answered
    pub fn with_delay(delay: Duration) -> Arc<DummyRequester> {
        Arc::new(DummyRequester {
            delay: Some(delay),
            ..DummyRequester::default()
        })
    }

    pub fn set_refresh_fails(&self, fails: bool) {
        self.state.lock().unwrap().refresh_fails = fails;
    }

    /// Id handed out when a registration carries none, instead of `generated-N`
    pub fn set_assigned_id(&self, device_id: &str) {
        self.state.lock().unwrap().assigned_id = Some(device_id.to_string());
    }

    pub fn add_existing_device(&self, device_id: &str) {
        self.state
            .lock()
            .unwrap()
            .device_ids
            .insert(device_id.to_string());
    }

    pub fn record(&self, event: impl Into<String>) {
        self.state.lock().unwrap().events.push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Request> {
        let url = format!("{}{}", BASE_URL, path);
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }

    fn respond(&self, request: &Request) -> RawResponse {
        let path = request.url.strip_prefix(BASE_URL).unwrap_or(&request.url);
        match (request.method, path) {
            (Method::Get, "/tokens/user") => user_token(request),
            (Method::Get, "/tokens/project") => project_token(request),
            (Method::Post, "/tokens/project") => {
                let refresh = request.body.as_ref().and_then(|b| b.get("refresh_token"));
                if self.state.lock().unwrap().refresh_fails
                    || refresh != Some(&json!(OK_TOKEN))
                {
                    return forbidden();
                }
                RawResponse::new(
                    200,
                    Some(json!({
                        "token": REFRESHED_TOKEN,
                        "expires": "a date",
                        "project_id": OK_PID,
                        "read": true,
                        "write": true,
                        "admin": false,
                    })),
                )
            }
            _ if !authorised(request) => RawResponse::new(403, None),
            (Method::Post, "/devices") => self.register(request.body.as_ref()),
            (Method::Get, "/devices/timestamp") => {
                RawResponse::new(200, Some(json!({ "server_timestamp": 1_449_000_000_000i64 })))
            }
            (Method::Post, "/imports") => RawResponse::new(200, None),
            (Method::Get, p) if p.starts_with("/exports") || p.starts_with("/data/") => {
                RawResponse::new(200, Some(json!({ "result": [] })))
            }
            (Method::Get, "/namespaces/") => RawResponse::new(
                200,
                Some(json!({ "namespaces": [{ "namespace_id": 7, "namespace_name": "input" }] })),
            ),
            (Method::Get, "/namespaces/7") => RawResponse::new(
                200,
                Some(json!({ "namespace_id": 7, "namespace_name": "input" })),
            ),
            _ => RawResponse::new(404, Some(json!({ "errors": [{ "message": "not found" }] }))),
        }
    }

    fn register(&self, body: Option<&Value>) -> RawResponse {
        let body = body.cloned().unwrap_or(Value::Null);
        let mut state = self.state.lock().unwrap();
        let device_id = match body.get("device_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => match &state.assigned_id {
                Some(id) => id.clone(),
                None => format!("generated-{}", state.device_ids.len() + 1),
            },
        };
        if !state.device_ids.insert(device_id.clone()) {
            return RawResponse::new(
                422,
                Some(json!({ "errors": [{ "message": "no dupe id", "code": 150 }] })),
            );
        }
        let mut device = json!({ "device_id": device_id, "created": "2015-12-04 13:00:00" });
        if let Some(name) = body.get("device_name") {
            device["device_name"] = name.clone();
        }
        RawResponse::new(200, Some(device))
    }
}

fn authorised(request: &Request) -> bool {
    matches!(request.token.as_deref(), Some(OK_TOKEN) | Some(REFRESHED_TOKEN))
}

fn forbidden() -> RawResponse {
    RawResponse::new(403, Some(json!({ "errors": [{ "message": "invalid" }] })))
}

fn user_token(request: &Request) -> RawResponse {
    let expected = format!("Basic {}", STANDARD.encode(format!("{}:{}", OK_USER, OK_PASS)));
    if request.header_value("Authorization") == Some(expected.as_str()) {
        RawResponse::new(200, Some(json!({ "token": "usertoken" })))
    } else {
        forbidden()
    }
}

fn project_token(request: &Request) -> RawResponse {
    let pid = OK_PID.to_string();
    if request.token.as_deref() == Some(OK_TOKEN)
        && request.query_value("project_id") == Some(pid.as_str())
    {
        RawResponse::new(200, Some(json!({ "token": OK_TOKEN, "project_id": OK_PID })))
    } else {
        forbidden()
    }
}

#[async_trait]
impl Requester for DummyRequester {
    fn full_endpoint(&self, path: &str) -> String {
        format!("{}{}", BASE_URL, path)
    }

    async fn perform(&self, request: Request) -> (RequestResult, Option<RawResponse>) {
        {
            let mut state = self.state.lock().unwrap();
            let path = request.url.strip_prefix(BASE_URL).unwrap_or(&request.url);
            state
                .events
                .push(format!("request {:?} {}", request.method, path));
            state.requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.respond(&request);
        (status_code_to_result(response.status), Some(response))
    }
}

/// Reports every token except `REFRESHED_TOKEN` as expired
pub struct ExpiredUntilRefreshed;

impl TokenValidator for ExpiredUntilRefreshed {
    fn is_expired(&self, token: &str) -> bool {
        token != REFRESHED_TOKEN
    }
}

/// Never reports a token as expired
pub struct NeverExpires;

impl TokenValidator for NeverExpires {
    fn is_expired(&self, _token: &str) -> bool {
        false
    }
}
