#![allow(dead_code)]

use async_trait::async_trait;
use http::StatusCode;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tether::{Request, Response, Result, Transport};

#[derive(Debug)]
struct Script {
    queued: VecDeque<(StatusCode, String)>,
    fallback: (StatusCode, String),
    seen: Vec<Request>,
    closes: usize,
}

/// Transport answering from a script: queued responses first, then the fallback forever.
/// Every request it sees is recorded.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// Always `200 {}` unless told otherwise.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                queued: VecDeque::new(),
                fallback: (StatusCode::OK, "{}".to_string()),
                seen: Vec::new(),
                closes: 0,
            })),
        }
    }

    /// Queue one response.
    pub fn then(self, status: u16, body: &str) -> Self {
        self.script.lock().unwrap().queued.push_back(status_body(status, body));
        self
    }

    /// Response used once the queue is empty.
    pub fn always(self, status: u16, body: &str) -> Self {
        self.script.lock().unwrap().fallback = status_body(status, body);
        self
    }

    pub fn calls(&self) -> usize {
        self.script.lock().unwrap().seen.len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.script.lock().unwrap().seen.clone()
    }

    pub fn last_request(&self) -> Request {
        self.requests().pop().expect("no request sent")
    }

    pub fn closes(&self) -> usize {
        self.script.lock().unwrap().closes
    }
}

fn status_body(status: u16, body: &str) -> (StatusCode, String) {
    (StatusCode::from_u16(status).expect("valid status"), body.to_string())
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<Response> {
        let mut script = self.script.lock().unwrap();
        script.seen.push(request.clone());
        let (status, body) = script.queued.pop_front().unwrap_or_else(|| script.fallback.clone());
        Ok(Response::new(status, body))
    }

    fn close(&self) {
        self.script.lock().unwrap().closes += 1;
    }
}
