//! Scripted local HTTP server standing in for remote tile and asset hosts.
//!
//! Each path is given a sequence of responses. Requests pop the sequence in
//! order and the last entry repeats. Unscripted paths answer 404.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;

/// One canned HTTP response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::status(200).with_body(body)
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Default)]
struct Script {
    responses: HashMap<String, VecDeque<MockResponse>>,
    hits: HashMap<String, usize>,
}

type SharedScript = Arc<Mutex<Script>>;

/// Running mock server. Stops when the test runtime shuts down.
pub struct MockServer {
    addr: SocketAddr,
    script: SharedScript,
}

impl MockServer {
    pub async fn start() -> Self {
        let script = SharedScript::default();
        let app = Router::new().fallback(respond).with_state(script.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, script }
    }

    /// `http://127.0.0.1:<port>` without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Answer `path` with `responses` in order, repeating the last one.
    pub fn script(&self, path: &str, responses: Vec<MockResponse>) {
        let mut script = self.script.lock().expect("mock script lock");
        script.responses.insert(path.to_string(), responses.into());
    }

    pub fn respond(&self, path: &str, response: MockResponse) {
        self.script(path, vec![response]);
    }

    /// Number of requests received for `path`.
    pub fn hits(&self, path: &str) -> usize {
        let script = self.script.lock().expect("mock script lock");
        script.hits.get(path).copied().unwrap_or(0)
    }
}

async fn respond(State(script): State<SharedScript>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    let response = {
        let mut script = script.lock().expect("mock script lock");
        *script.hits.entry(path.clone()).or_default() += 1;
        match script.responses.get_mut(&path) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    };

    let Some(mock) = response else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut response = mock.body.into_response();
    *response.status_mut() = StatusCode::from_u16(mock.status).unwrap_or(StatusCode::OK);
    for (name, value) in mock.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}
