//! Sequential release and deployment pipeline.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::client::OctopusClient;
use crate::deployment::{DeployRequest, Deployment, DeploymentState};
use crate::error::Result;
use crate::release::{CreateOutcome, CreateRelease, Release};
use crate::transport::Transport;
use crate::version::VersionConstraint;

/// What to release and where to deploy it.
#[derive(Debug, Clone, Default)]
pub struct PipelinePlan {
    pub project: String,
    pub version: String,
    pub notes: String,
    pub package_constraint: Option<VersionConstraint>,
    pub create_release: bool,
    pub environments: Vec<String>,
    /// Empty deploys once per environment without a tenant
    pub tenants: Vec<String>,
    /// Per-deployment wait budget; zero skips waiting
    pub wait: Duration,
    pub variables: BTreeMap<String, String>,
}

impl PipelinePlan {
    pub fn new(project: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    fn release_request(&self) -> CreateRelease {
        let request = CreateRelease::new(&self.project, &self.version).with_notes(&self.notes);
        match &self.package_constraint {
            Some(constraint) => request.with_package_constraint(constraint.clone()),
            None => request,
        }
    }

    /// Tenant slots per environment; `None` means untenanted.
    fn tenant_slots(&self) -> Vec<Option<&str>> {
        if self.tenants.is_empty() {
            vec![None]
        } else {
            self.tenants.iter().map(|t| Some(t.as_str())).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub id: String,
    pub project_id: String,
    pub version: String,
    /// `None` when the release was fetched rather than created
    pub outcome: Option<CreateOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub environment: String,
    pub tenant: Option<String>,
    pub deployment_id: String,
    pub state: DeploymentState,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub release: Option<ReleaseSummary>,
    pub deployments: Vec<DeploymentReport>,
}

impl PipelineReport {
    pub fn is_empty(&self) -> bool {
        self.release.is_none() && self.deployments.is_empty()
    }
}

pub struct Pipeline;

impl Pipeline {
    /// Create (or fetch) the release, then deploy it to every environment and
    /// tenant in order, each deployment finishing before the next starts.
    ///
    /// The first error aborts the run.
    pub fn run<T: Transport>(client: &OctopusClient<T>, plan: &PipelinePlan) -> Result<PipelineReport> {
        if !plan.create_release && plan.environments.is_empty() {
            tracing::warn!(project = %plan.project, "nothing to release or deploy");
            return Ok(PipelineReport::default());
        }

        let (release, outcome) = if plan.create_release {
            let (release, outcome) = Release::create(client, &plan.release_request())?;
            (release, Some(outcome))
        } else {
            let release = Release::from_project_and_version(client, &plan.project, &plan.version)?;
            (release, None)
        };

        let mut report = PipelineReport {
            release: Some(ReleaseSummary {
                id: release.id().to_string(),
                project_id: release.project_id().to_string(),
                version: release.version().to_string(),
                outcome,
            }),
            deployments: Vec::new(),
        };

        for environment in &plan.environments {
            for tenant in plan.tenant_slots() {
                tracing::info!(
                    project = %plan.project,
                    version = %plan.version,
                    environment = %environment,
                    tenant = tenant.unwrap_or(""),
                    "deploying"
                );

                let mut request = DeployRequest::new(environment)
                    .with_wait(plan.wait)
                    .with_variables(plan.variables.clone());
                if let Some(tenant) = tenant {
                    request = request.with_tenant(tenant);
                }

                let started_at = Utc::now();
                let started = Instant::now();
                let mut deployment = Deployment::from_release(&release);
                let state = deployment.create(&request)?;

                report.deployments.push(DeploymentReport {
                    environment: environment.clone(),
                    tenant: tenant.map(str::to_string),
                    deployment_id: deployment.id().to_string(),
                    state,
                    started_at,
                    elapsed: started.elapsed(),
                });
            }
        }

        Ok(report)
    }
}
