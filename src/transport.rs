//! HTTP session boundary.
//!
//! The core never speaks HTTP itself: bound operations and the spec loader go
//! through the [`Transport`] trait. [`HttpSession`] is the blocking `ureq`
//! implementation; tests substitute an in-memory transport.

use crate::config::Settings;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a session; the spec loader memoizes per session id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SessionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Parse an OpenAPI path-item key (`get`, `post`, ...).
    pub fn from_openapi_key(key: &str) -> Option<Self> {
        match key {
            "get" => Some(Method::Get),
            "put" => Some(Method::Put),
            "post" => Some(Method::Post),
            "delete" => Some(Method::Delete),
            "patch" => Some(Method::Patch),
            "head" => Some(Method::Head),
            "options" => Some(Method::Options),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request relative to the session's base url.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    /// Parsed JSON body; `None` for an empty body.
    pub json: Option<Value>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Best-effort human readable message from an error body.
    pub fn message(&self) -> String {
        match &self.json {
            Some(Value::Object(map)) => map
                .get("message")
                .or_else(|| map.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
            Some(other) => other.to_string(),
            None => format!("HTTP {}", self.status),
        }
    }
}

/// Injected HTTP session used by the spec loader and bound operations.
///
/// Implementations return non-2xx statuses as `Ok(Response)` and reserve
/// `Err` for failures where no response was received.
pub trait Transport: Send + Sync {
    fn session_id(&self) -> SessionId;

    fn send(&self, request: &Request) -> Result<Response>;

    /// GET `path` and return its JSON body, failing on non-2xx.
    fn get(&self, path: &str) -> Result<Value> {
        let response = self.send(&Request::new(Method::Get, path))?;
        if !response.is_success() {
            return Err(Error::transport(
                path,
                Some(response.status),
                response.message(),
            ));
        }
        Ok(response.json.unwrap_or(Value::Null))
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Blocking HTTP session against the Pureport API.
///
/// Logs in with the api key/secret on first use and sends the resulting
/// bearer token with every request.
pub struct HttpSession {
    id: SessionId,
    agent: ureq::Agent,
    base_url: String,
    credentials: Credentials,
    generic_error: String,
    token: OnceLock<String>,
}

impl HttpSession {
    pub fn new(settings: &Settings, credentials: Credentials) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(settings.connect_timeout())
            .timeout_read(settings.read_timeout())
            .build();
        let base_url = credentials
            .base_url(settings)
            .trim_end_matches('/')
            .to_string();
        Self {
            id: SessionId::next(),
            agent,
            base_url,
            credentials,
            generic_error: settings.generic_transport_error_message.clone(),
            token: OnceLock::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn account_id(&self) -> Option<&str> {
        self.credentials.account_id.as_deref()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    fn access_token(&self) -> Result<&str> {
        if let Some(token) = self.token.get() {
            return Ok(token);
        }
        tracing::debug!(base_url = %self.base_url, "logging in");
        let mut login = Request::new(Method::Post, "/login");
        login.body = Some(json!({
            "key": self.credentials.api_key,
            "secret": self.credentials.api_secret,
        }));
        let response = self.execute(&login, None)?;
        if !response.is_success() {
            return Err(Error::transport(
                "login",
                Some(response.status),
                response.message(),
            ));
        }
        let body = response.json.unwrap_or(Value::Null);
        let parsed: LoginResponse = serde_json::from_value(body).map_err(|err| {
            Error::transport("login", Some(response.status), format!("bad login response: {err}"))
        })?;
        // A concurrent login may have won; either token is valid.
        let _ = self.token.set(parsed.access_token);
        Ok(self.token.get().map(String::as_str).unwrap_or_default())
    }

    fn execute(&self, request: &Request, token: Option<&str>) -> Result<Response> {
        let url = self.url(&request.path);
        let mut req = self
            .agent
            .request(request.method.as_str(), &url)
            .set("Accept", "application/json");
        if let Some(token) = token {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }
        for (name, value) in &request.headers {
            req = req.set(name, value);
        }
        for (name, value) in &request.query {
            req = req.query(name, value);
        }

        tracing::debug!(method = %request.method, %url, "sending request");
        let result = match &request.body {
            Some(body) => req.send_json(body.clone()),
            None => req.call(),
        };
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                tracing::warn!(%url, error = %err, "transport failure");
                return Err(Error::transport(
                    &request.path,
                    None,
                    format!("{err}; {}", self.generic_error),
                ));
            }
        };

        let status = response.status();
        let text = response.into_string().map_err(|err| {
            Error::transport(&request.path, Some(status), format!("reading body: {err}"))
        })?;
        let json = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        };
        Ok(Response { status, json })
    }
}

impl Transport for HttpSession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn send(&self, request: &Request) -> Result<Response> {
        let token = self.access_token()?.to_string();
        self.execute(request, Some(&token))
    }
}

impl fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSession")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_keys_parse() {
        assert_eq!(Method::from_openapi_key("get"), Some(Method::Get));
        assert_eq!(Method::from_openapi_key("delete"), Some(Method::Delete));
        assert_eq!(Method::from_openapi_key("parameters"), None);
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::next(), SessionId::next());
    }

    #[test]
    fn response_message_prefers_message_field() {
        let response = Response {
            status: 400,
            json: Some(serde_json::json!({"message": "bad speed", "code": "X"})),
        };
        assert!(!response.is_success());
        assert_eq!(response.message(), "bad speed");

        let empty = Response {
            status: 502,
            json: None,
        };
        assert_eq!(empty.message(), "HTTP 502");
    }

    #[test]
    fn session_joins_base_url_and_path() {
        let mut settings = Settings::resolve_with(|_| None).unwrap();
        settings.api_base_url = "https://api.example.com/".into();
        let session = HttpSession::new(
            &settings,
            Credentials {
                api_key: "k".into(),
                api_secret: "s".into(),
                api_url: None,
                account_id: None,
            },
        );
        assert_eq!(session.url("/openapi.json"), "https://api.example.com/openapi.json");
        assert_eq!(session.url("accounts"), "https://api.example.com/accounts");
    }
}
