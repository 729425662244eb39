//! Deployments of a release to one environment (and optionally one tenant).
//!
//! A [`Deployment`] is created at most once. After creation it can poll the
//! project's progression feed until the server reports a terminal state or
//! the wait budget runs out; see [`Deployment::wait_for_completion`].

pub mod state;

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use crate::client::OctopusClient;
use crate::config::PollingConfig;
use crate::error::{OctopusError, Result};
use crate::release::Release;
use crate::transport::{HttpTransport, Transport};
use crate::types::{
    CreateDeploymentBody, DeploymentPreview, DeploymentResource, Progression, ReleaseResource,
};

pub use state::{DeploymentState, PollVerdict, StatusPolicy};

/// Parameters for [`Deployment::create`].
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    pub environment: String,
    pub tenant: Option<String>,
    /// How long to wait for completion; zero returns right after creation
    pub wait: Duration,
    /// Prompted variable values keyed by variable name
    pub variables: BTreeMap<String, String>,
}

impl DeployRequest {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ..Default::default()
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables.extend(variables);
        self
    }
}

pub struct Deployment<'c, T: Transport = HttpTransport> {
    client: &'c OctopusClient<T>,
    release: Option<ReleaseResource>,
    id: String,
    environment_id: String,
    tenant_id: String,
    /// Variable name to form element id, for variables the server accepted
    applied_variables: BTreeMap<String, String>,
    state: DeploymentState,
    interval: Duration,
    policy: StatusPolicy,
}

impl<'c, T: Transport> Deployment<'c, T> {
    /// A deployment with no release attached. Creating it fails until one is.
    pub fn new(client: &'c OctopusClient<T>) -> Self {
        let polling = &client.config().polling;
        Self {
            client,
            release: None,
            id: String::new(),
            environment_id: String::new(),
            tenant_id: String::new(),
            applied_variables: BTreeMap::new(),
            state: DeploymentState::NotCreated,
            interval: polling.interval(),
            policy: StatusPolicy::from(polling),
        }
    }

    pub fn from_release(release: &Release<'c, T>) -> Self {
        let mut deployment = Self::new(release.client());
        deployment.release = Some(release.resource().clone());
        deployment
    }

    /// Deploy an existing release identified by project name and version.
    pub fn for_project_version(
        client: &'c OctopusClient<T>,
        project: &str,
        version: &str,
    ) -> Result<Self> {
        let release = Release::from_project_and_version(client, project, version)?;
        Ok(Self::from_release(&release))
    }

    /// Override the client's polling interval and state vocabulary.
    pub fn with_polling(mut self, polling: &PollingConfig) -> Self {
        self.interval = polling.interval();
        self.policy = StatusPolicy::from(polling);
        self
    }

    /// Submit the deployment and, when `request.wait` is non-zero, wait for
    /// it to finish.
    ///
    /// Fails with `MissingRelease` before any request when no release is
    /// attached. Variables the deployment process does not prompt for are
    /// skipped with a warning.
    pub fn create(&mut self, request: &DeployRequest) -> Result<DeploymentState> {
        let release = self.release.as_ref().ok_or(OctopusError::MissingRelease)?;
        if self.state != DeploymentState::NotCreated {
            return Err(OctopusError::InvalidState(format!(
                "deployment '{}' was already created",
                self.id
            )));
        }
        let release_id = release.id.clone();
        let project_id = release.project_id.clone();

        let environment_id = self.client.lookup_environment_id(&request.environment)?;
        let tenant_id = self.client.lookup_tenant_id(request.tenant.as_deref())?;

        let mut form_values = BTreeMap::new();
        let mut applied_variables = BTreeMap::new();
        if !request.variables.is_empty() {
            let preview: DeploymentPreview = self.client.get(&format!(
                "api/releases/{}/deployments/preview/{}",
                release_id, environment_id
            ))?;
            let element_ids = preview.element_ids();
            for (name, value) in &request.variables {
                match element_ids.get(name) {
                    Some(element_id) => {
                        form_values.insert(element_id.clone(), value.clone());
                        applied_variables.insert(name.clone(), element_id.clone());
                    }
                    None => tracing::warn!(
                        variable = %name,
                        environment = %request.environment,
                        "variable is not prompted for by the deployment process; skipping"
                    ),
                }
            }
        }

        let body = CreateDeploymentBody {
            environment_id: environment_id.clone(),
            project_id,
            release_id,
            tenant_id: (!tenant_id.is_empty()).then(|| tenant_id.clone()),
            form_values,
        };
        let resource: DeploymentResource = self.client.post("api/deployments", &body)?;

        self.id = resource.id;
        self.environment_id = environment_id;
        self.tenant_id = tenant_id;
        self.applied_variables = applied_variables;
        self.state = DeploymentState::Created;

        tracing::info!(
            deployment_id = %self.id,
            environment = %request.environment,
            tenant = request.tenant.as_deref().unwrap_or(""),
            "created deployment"
        );

        if !request.wait.is_zero() {
            self.wait_for_completion(request.wait)?;
        }
        Ok(self.state)
    }

    /// Poll the progression feed until the deployment reaches a terminal state.
    ///
    /// `budget` is measured from the first poll. The terminal state is
    /// recorded before a `DeploymentFailed` or `DeploymentTimedOut` error is
    /// returned. A progression request that fails leaves the deployment
    /// `Failed` and returns that request's error.
    pub fn wait_for_completion(&mut self, budget: Duration) -> Result<DeploymentState> {
        match self.state {
            DeploymentState::Created => {}
            DeploymentState::NotCreated => {
                return Err(OctopusError::InvalidState(
                    "deployment has not been created".to_string(),
                ));
            }
            finished => {
                return Err(OctopusError::InvalidState(format!(
                    "deployment '{}' already finished with state {}",
                    self.id, finished
                )));
            }
        }

        let (release_id, project_id) = match &self.release {
            Some(release) => (release.id.clone(), release.project_id.clone()),
            None => return Err(OctopusError::MissingRelease),
        };
        let path = format!("api/projects/{}/progression", project_id);
        let tenant_id = (!self.tenant_id.is_empty()).then_some(self.tenant_id.as_str());

        let started = Instant::now();
        let mut last_seen: Option<String> = None;
        loop {
            let progression: Progression = match self.client.get(&path) {
                Ok(progression) => progression,
                Err(err) => {
                    self.state = DeploymentState::Failed;
                    tracing::warn!(
                        deployment_id = %self.id,
                        error = %err,
                        "could not read deployment progression"
                    );
                    return Err(err);
                }
            };
            let entry =
                progression.find_entry(&release_id, &self.environment_id, &self.id, tenant_id);

            let seen = entry.map(|entry| entry.state.clone());
            if seen != last_seen {
                tracing::info!(
                    deployment_id = %self.id,
                    state = seen.as_deref().unwrap_or("not listed"),
                    "deployment state changed"
                );
                last_seen = seen;
            }

            match self.policy.classify(entry) {
                PollVerdict::Succeeded => {
                    self.state = DeploymentState::Success;
                    let elapsed_ms =
                        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    if entry.is_some_and(|entry| entry.has_warnings_or_errors) {
                        tracing::warn!(
                            deployment_id = %self.id,
                            elapsed_ms,
                            "deployment succeeded with warnings or errors"
                        );
                    } else {
                        tracing::info!(deployment_id = %self.id, elapsed_ms, "deployment succeeded");
                    }
                    return Ok(self.state);
                }
                PollVerdict::Failed { state, message } => {
                    self.state = DeploymentState::Failed;
                    return Err(OctopusError::DeploymentFailed {
                        deployment_id: self.id.clone(),
                        state,
                        message,
                    });
                }
                PollVerdict::Pending => {}
            }

            if started.elapsed() > budget {
                self.state = DeploymentState::TimedOut;
                return Err(OctopusError::DeploymentTimedOut {
                    deployment_id: self.id.clone(),
                    waited: budget,
                });
            }
            thread::sleep(self.interval);
        }
    }

    /// Server id; empty until created.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn release_id(&self) -> Option<&str> {
        self.release.as_ref().map(|release| release.id.as_str())
    }

    pub fn project_id(&self) -> Option<&str> {
        self.release.as_ref().map(|release| release.project_id.as_str())
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn tenant_id(&self) -> Option<&str> {
        (!self.tenant_id.is_empty()).then_some(self.tenant_id.as_str())
    }

    pub fn applied_variables(&self) -> &BTreeMap<String, String> {
        &self.applied_variables
    }

    pub fn state(&self) -> DeploymentState {
        self.state
    }
}
