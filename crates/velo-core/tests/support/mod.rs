#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};

use velo_core::client::OctopusClient;
use velo_core::config::{PollingConfig, ServerConfig, VeloConfig};
use velo_core::error::Result;
use velo_core::transport::{ApiRequest, ApiResponse, Method, Transport};

pub const SERVER_URL: &str = "https://octopus.example.com";
pub const API_KEY: &str = "API-TESTKEY";

/// Scripted in-memory server.
///
/// Routes are keyed by method and path. A route registered without a query
/// string answers every query on that path. Several responses on one route
/// are served in order, the last one repeating. Unrouted requests get an
/// empty 404.
pub struct FakeServer {
    routes: Mutex<HashMap<(Method, String), VecDeque<ApiResponse>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl FakeServer {
    pub fn new() -> Self {
        let server = Self {
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        };
        server.respond(Method::Head, "api", ApiResponse::empty(200));
        server
    }

    pub fn respond(&self, method: Method, path: &str, response: ApiResponse) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    /// Drop any scripted responses for the route and answer with `response`.
    pub fn replace(&self, method: Method, path: &str, response: ApiResponse) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), VecDeque::from([response]));
        self
    }

    pub fn json(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.respond(method, path, ApiResponse::json(status, &body))
    }

    pub fn get(&self, path: &str, body: Value) -> &Self {
        self.json(Method::Get, path, 200, body)
    }

    pub fn head(&self, path: &str, status: u16) -> &Self {
        self.respond(Method::Head, path, ApiResponse::empty(status))
    }

    pub fn post(&self, path: &str, body: Value) -> &Self {
        self.json(Method::Post, path, 201, body)
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Requests to `path`; a path without a query matches any query.
    pub fn requests(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method && path_matches(path, &call.path))
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests(method, path).len()
    }

    /// Every request except the connectivity probe made at client construction.
    pub fn api_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| !(call.method == Method::Head && call.path == "api"))
            .count()
    }

    pub fn posted_body(&self, path: &str) -> Value {
        self.requests(Method::Post, path)
            .last()
            .and_then(|call| call.body.clone())
            .unwrap_or(Value::Null)
    }

    fn lookup(&self, method: Method, path: &str) -> Option<ApiResponse> {
        let mut routes = self.routes.lock().unwrap();
        let key = if routes.contains_key(&(method, path.to_string())) {
            path.to_string()
        } else {
            path.split('?').next().unwrap_or(path).to_string()
        };
        let queue = routes.get_mut(&(method, key))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Transport for FakeServer {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(request.clone());
        Ok(self
            .lookup(request.method, &request.path)
            .unwrap_or_else(|| ApiResponse::empty(404)))
    }
}

fn path_matches(expected: &str, actual: &str) -> bool {
    if expected.contains('?') {
        expected == actual
    } else {
        actual.split('?').next() == Some(expected)
    }
}

pub fn config() -> VeloConfig {
    let mut config = VeloConfig::new(ServerConfig::new(SERVER_URL, API_KEY));
    config.polling = PollingConfig::default().with_interval(Duration::from_millis(10));
    config
}

pub fn client(server: &FakeServer) -> OctopusClient<&FakeServer> {
    OctopusClient::with_transport(config(), server)
}

pub fn client_with(server: &FakeServer, config: VeloConfig) -> OctopusClient<&FakeServer> {
    OctopusClient::with_transport(config, server)
}

pub fn project(server: &FakeServer, name: &str, id: &str) {
    server.get(&format!("api/projects/{}", name), json!({"Id": id, "Name": name}));
}

pub fn environments(server: &FakeServer, entries: &[(&str, &str)]) {
    server.get("api/environments/all", named(entries));
}

pub fn tenants(server: &FakeServer, entries: &[(&str, &str)]) {
    server.get("api/tenants/all", named(entries));
}

fn named(entries: &[(&str, &str)]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|(name, id)| json!({"Id": id, "Name": name}))
            .collect(),
    )
}

pub fn release_json(id: &str, project_id: &str, version: &str) -> Value {
    json!({
        "Id": id,
        "ProjectId": project_id,
        "Version": version,
        "Links": {"ProjectVariableSnapshot": format!("/api/variables/variableset-{}-s-1", project_id)}
    })
}

/// Register an existing release for `project_id` and `version`.
pub fn existing_release(server: &FakeServer, id: &str, project_id: &str, version: &str) {
    let path = format!("api/projects/{}/releases/{}", project_id, version);
    server.head(&path, 200);
    server.get(&path, release_json(id, project_id, version));
}

pub fn progression(release_id: &str, environment_id: &str, entries: Value) -> Value {
    json!({
        "Releases": [
            {
                "Release": {"Id": release_id},
                "Deployments": {environment_id: entries}
            }
        ]
    })
}
