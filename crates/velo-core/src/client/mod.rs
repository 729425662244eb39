//! Client for the deployment server API.
//!
//! Wraps a [`Transport`] with request construction, response mapping and the
//! name→id lookups the release and deployment flows need. Every client owns
//! its caches; two clients in one process never share lookup state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::VeloConfig;
use crate::error::{EntityKind, OctopusError, Result};
use crate::transport::{ApiRequest, HttpTransport, Method, ResponseOutcome, Transport};
use crate::types::{NamedResource, ProjectResource};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Octopus-ApiKey";

/// Path probed at construction to check the server is reachable.
pub const HEALTH_PATH: &str = "api";

pub struct OctopusClient<T: Transport = HttpTransport> {
    transport: T,
    config: VeloConfig,
    project_ids: Mutex<HashMap<String, String>>,
    environment_ids: Mutex<Option<HashMap<String, String>>>,
    tenant_ids: Mutex<Option<HashMap<String, String>>>,
}

impl OctopusClient<HttpTransport> {
    /// Connect to the server described by `config` over HTTP.
    ///
    /// Only building the transport can fail here; an unreachable server is
    /// logged and surfaces on the first real request.
    pub fn connect(config: VeloConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.server.url, config.server.request_timeout())?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> OctopusClient<T> {
    /// Create a client over an existing transport and probe connectivity.
    pub fn with_transport(config: VeloConfig, transport: T) -> Self {
        let client = Self {
            transport,
            config,
            project_ids: Mutex::new(HashMap::new()),
            environment_ids: Mutex::new(None),
            tenant_ids: Mutex::new(None),
        };

        match client.head(HEALTH_PATH) {
            Ok(true) => tracing::debug!(
                server = %client.base_url(),
                "connected to Octopus Deploy server"
            ),
            Ok(false) => tracing::warn!(
                server = %client.base_url(),
                "Octopus Deploy server answered the connection check with an error status"
            ),
            Err(e) => tracing::error!(
                server = %client.base_url(),
                "could not establish connection with Octopus Deploy server: {}",
                e
            ),
        }

        client
    }

    pub fn base_url(&self) -> &str {
        &self.config.server.url
    }

    pub fn config(&self) -> &VeloConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Link to a release in the server's web UI.
    pub fn release_web_url(&self, project_name: &str, version: &str) -> String {
        format!(
            "{}/app#/{}/projects/{}/deployments/releases/{}",
            self.base_url().trim_end_matches('/'),
            self.config.packages.space_id,
            project_name,
            version
        )
    }

    /// Fetch and decode a resource.
    pub fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let outcome = self.request(Method::Get, path, None)?;
        self.decode_body(Method::Get, path, outcome)
    }

    /// Check whether a resource exists.
    ///
    /// An error status without a body means "does not exist" and yields
    /// `false`; an error status with a body is still an error.
    pub fn head(&self, path: &str) -> Result<bool> {
        match self.request(Method::Head, path, None)? {
            ResponseOutcome::Body(_) | ResponseOutcome::Empty => Ok(true),
            ResponseOutcome::Missing { .. } => Ok(false),
            ResponseOutcome::Failed(failure) => Err(OctopusError::Remote {
                status: failure.status,
                message: failure.message,
            }),
            ResponseOutcome::Unexpected { status } => Err(OctopusError::UnexpectedStatus {
                method: Method::Head.to_string(),
                path: path.to_string(),
                status,
            }),
        }
    }

    /// Create a resource and decode the server's representation of it.
    pub fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let body = serde_json::to_value(body).map_err(|e| OctopusError::Decode {
            path: path.to_string(),
            reason: format!("failed to encode request body: {}", e),
        })?;
        let outcome = self.request(Method::Post, path, Some(body))?;
        self.decode_body(Method::Post, path, outcome)
    }

    /// Translate a project name into its id. Results are memoized per name.
    pub fn lookup_project_id(&self, project_name: &str) -> Result<String> {
        let mut cache = lock(&self.project_ids);
        if let Some(id) = cache.get(project_name) {
            return Ok(id.clone());
        }

        let project: ProjectResource = self
            .get(&format!("api/projects/{}", project_name))
            .map_err(|e| match e.status() {
                Some(404) => OctopusError::not_found(EntityKind::Project, project_name),
                _ => e,
            })?;

        cache.insert(project_name.to_string(), project.id.clone());
        Ok(project.id)
    }

    /// Translate an environment name into its id.
    ///
    /// The first call fetches every environment and caches the whole list.
    pub fn lookup_environment_id(&self, environment_name: &str) -> Result<String> {
        self.lookup_in_collection(
            &self.environment_ids,
            "api/environments/all",
            EntityKind::Environment,
            environment_name,
        )
    }

    /// Translate a tenant name into its id; no tenant yields an empty id.
    pub fn lookup_tenant_id(&self, tenant_name: Option<&str>) -> Result<String> {
        match tenant_name {
            None | Some("") => Ok(String::new()),
            Some(name) => self.lookup_in_collection(
                &self.tenant_ids,
                "api/tenants/all",
                EntityKind::Tenant,
                name,
            ),
        }
    }

    fn lookup_in_collection(
        &self,
        cache: &Mutex<Option<HashMap<String, String>>>,
        path: &str,
        kind: EntityKind,
        name: &str,
    ) -> Result<String> {
        let mut cache = lock(cache);
        if cache.is_none() {
            let items: Vec<NamedResource> = self.get(path)?;
            tracing::debug!(kind = %kind, count = items.len(), "cached {} ids", kind);
            *cache = Some(items.into_iter().map(|item| (item.name, item.id)).collect());
        }

        cache
            .as_ref()
            .and_then(|ids| ids.get(name))
            .cloned()
            .ok_or_else(|| OctopusError::not_found(kind, name))
    }

    fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<ResponseOutcome> {
        let mut request = ApiRequest::new(method, path)
            .with_header(API_KEY_HEADER, self.config.server.api_key.as_str());
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let response = self.transport.send(&request)?;
        tracing::debug!("{} {}: {}", method, path, response.status);

        ResponseOutcome::classify(&response).map_err(|reason| OctopusError::Decode {
            path: path.to_string(),
            reason,
        })
    }

    fn decode_body<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        outcome: ResponseOutcome,
    ) -> Result<R> {
        let value = match outcome {
            ResponseOutcome::Body(value) => value,
            ResponseOutcome::Empty => Value::Null,
            ResponseOutcome::Failed(failure) => {
                return Err(OctopusError::Remote {
                    status: failure.status,
                    message: failure.message,
                });
            }
            ResponseOutcome::Missing { status, reason } => {
                return Err(OctopusError::Remote {
                    status,
                    message: format!("{}: {} '{}' returned no body", reason, method, path),
                });
            }
            ResponseOutcome::Unexpected { status } => {
                return Err(OctopusError::UnexpectedStatus {
                    method: method.to_string(),
                    path: path.to_string(),
                    status,
                });
            }
        };

        serde_json::from_value(value).map_err(|e| OctopusError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
