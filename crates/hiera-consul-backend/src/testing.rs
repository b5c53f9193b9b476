//! In-memory transport for unit tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use hiera_consul_client::{ClientError, ConsulTransport, FailurePolicy, HttpResponse};

enum Reply {
    Answer(u16, String),
    Unreachable,
}

/// Serves canned answers per path and records every request
pub(crate) struct FakeTransport {
    replies: HashMap<String, Reply>,
    failure: FailurePolicy,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new(failure: FailurePolicy) -> Self {
        Self {
            replies: HashMap::new(),
            failure,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_json(mut self, path: &str, body: serde_json::Value) -> Self {
        self.replies
            .insert(path.to_string(), Reply::Answer(200, body.to_string()));
        self
    }

    pub fn with_status(mut self, path: &str, status: u16, body: &str) -> Self {
        self.replies
            .insert(path.to_string(), Reply::Answer(status, body.to_string()));
        self
    }

    pub fn with_unreachable(mut self, path: &str) -> Self {
        self.replies.insert(path.to_string(), Reply::Unreachable);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConsulTransport for FakeTransport {
    async fn get(&self, path: &str, recurse: bool) -> Result<HttpResponse, ClientError> {
        let recorded = if recurse {
            format!("{}?recurse", path)
        } else {
            path.to_string()
        };
        self.calls.lock().unwrap().push(recorded);

        match self.replies.get(path) {
            Some(Reply::Answer(status, body)) => Ok(HttpResponse::new(*status, body.clone())),
            Some(Reply::Unreachable) => Err(transport_error()),
            None => Ok(HttpResponse::new(404, "")),
        }
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.failure
    }
}

/// A real `reqwest` error, produced without touching the network
fn transport_error() -> ClientError {
    let err = reqwest::Client::new()
        .get("not a url")
        .build()
        .unwrap_err();
    ClientError::Transport(err)
}
