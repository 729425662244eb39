//! Raw HTTP exchange with the deployment server.
//!
//! The [`Transport`] trait is the seam between request construction in
//! [`crate::client::OctopusClient`] and the wire. [`HttpTransport`] is the
//! production implementation; tests substitute scripted transports.

pub mod http;
pub mod response;

use std::fmt;

use serde_json::Value;

use crate::error::Result;

pub use http::HttpTransport;
pub use response::{RemoteFailure, ResponseOutcome};

/// HTTP methods used against the server API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request relative to the server base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path (and optional query) relative to the base URL, e.g. `api/projects/Projects-1`
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status line and raw body of a server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// Reason phrase, e.g. "Not Found"
    pub reason: String,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            reason: canonical_reason(status).to_string(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }
}

fn canonical_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status")
}

/// Executes one request against the server.
///
/// Implementations report only transport-level failures (unreachable host,
/// timeouts) as errors; any HTTP status, including 4xx/5xx, is returned as an
/// [`ApiResponse`] for the client to classify.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).send(request)
    }
}
