#![allow(dead_code)]

use pureport::{Method, Request, Response, Result, SessionId, Transport};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

pub fn bundled_spec() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("schema")
        .join("openapi.json")
}

pub fn bundled_spec_value() -> Value {
    let text = std::fs::read_to_string(bundled_spec()).expect("bundled spec readable");
    serde_json::from_str(&text).expect("bundled spec is JSON")
}

/// In-memory session that answers from canned `(method, path)` replies and
/// records everything it was asked to send.
pub struct MockTransport {
    id: SessionId,
    replies: Mutex<HashMap<(Method, String), Response>>,
    sent: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            id: SessionId::next(),
            replies: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, method: Method, path: &str, status: u16, json: Option<Value>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Response { status, json });
        self
    }

    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, path: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }
}

impl Transport for MockTransport {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn send(&self, request: &Request) -> Result<Response> {
        self.sent.lock().unwrap().push(request.clone());
        let replies = self.replies.lock().unwrap();
        Ok(replies
            .get(&(request.method, request.path.clone()))
            .cloned()
            .unwrap_or(Response {
                status: 404,
                json: Some(serde_json::json!({"message": "no canned reply"})),
            }))
    }
}

// Serializes tests that touch process environment variables.
pub struct EnvGuard {
    _guard: MutexGuard<'static, ()>,
}

pub fn env_guard() -> EnvGuard {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let mutex = LOCK.get_or_init(|| Mutex::new(()));
    let guard = mutex.lock().unwrap_or_else(|err| err.into_inner());
    EnvGuard { _guard: guard }
}
