//! reqwest-backed transport.
//!
//! The public API of this crate is blocking, so the transport owns a
//! current-thread tokio runtime and blocks on each request future.

use std::time::Duration;

use url::Url;

use super::{ApiRequest, ApiResponse, Method, Transport};
use crate::error::{OctopusError, Result};

pub struct HttpTransport {
    base_url: Url,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpTransport {
    /// Create a transport for the given base URL.
    ///
    /// A base URL without a trailing slash is treated as a directory, so
    /// `https://host/octopus` and `https://host/octopus/` behave the same.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("velo/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| OctopusError::Transport(format!("failed to build HTTP client: {}", e)))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| OctopusError::Transport(format!("failed to create tokio runtime: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            runtime,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a relative API path against the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| OctopusError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                reason: e.to_string(),
            })
    }

    async fn execute(&self, url: Url, request: &ApiRequest) -> Result<ApiResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| OctopusError::Connection {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| OctopusError::Connection {
                url: url.to_string(),
                reason: format!("failed to read response body: {}", e),
            })?;

        Ok(ApiResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
            body: body.to_vec(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.resolve(&request.path)?;
        self.runtime.block_on(self.execute(url, request))
    }
}

fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).map_err(|e| OctopusError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
