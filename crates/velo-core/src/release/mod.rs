//! Releases: versioned, immutable snapshots of a project's deployment process.

pub mod notes;

use std::collections::HashMap;
use std::sync::OnceLock;

use url::form_urlencoded;

use crate::client::OctopusClient;
use crate::error::{EntityKind, OctopusError, Result};
use crate::transport::{HttpTransport, Transport};
use crate::types::{
    CreateReleaseBody, DeploymentProcessTemplate, PackageVersions, ReleaseResource,
    SelectedPackage, VariableSnapshot,
};
use crate::version::{VersionConstraint, VersionResolver};

pub use notes::{CommitInfo, ReleaseNotes};

/// Excludes pre-release versions when asking a feed for its latest package.
const STABLE_ONLY_TAG: &str = r"^(|\+.*)$";

/// Parameters for [`Release::create`].
#[derive(Debug, Clone)]
pub struct CreateRelease {
    pub project: String,
    pub version: String,
    pub notes: String,
    /// Selects the bootstrapper package version; without it every package
    /// of the deployment process is bound to its feed's latest stable version.
    pub package_constraint: Option<VersionConstraint>,
}

impl CreateRelease {
    pub fn new(project: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            version: version.into(),
            notes: String::new(),
            package_constraint: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_package_constraint(mut self, constraint: VersionConstraint) -> Self {
        self.package_constraint = Some(constraint);
        self
    }
}

/// Whether [`Release::create`] posted a new release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

pub struct Release<'c, T: Transport = HttpTransport> {
    client: &'c OctopusClient<T>,
    resource: ReleaseResource,
    variable_ids: OnceLock<HashMap<String, String>>,
}

impl<'c, T: Transport> Release<'c, T> {
    fn from_resource(client: &'c OctopusClient<T>, resource: ReleaseResource) -> Self {
        Self {
            client,
            resource,
            variable_ids: OnceLock::new(),
        }
    }

    /// Check whether `version` of `project` has been released.
    pub fn exists(client: &OctopusClient<T>, project: &str, version: &str) -> Result<bool> {
        let project_id = client.lookup_project_id(project)?;
        client.head(&release_path(&project_id, version))
    }

    /// Fetch an existing release.
    pub fn from_project_and_version(
        client: &'c OctopusClient<T>,
        project: &str,
        version: &str,
    ) -> Result<Self> {
        let project_id = client.lookup_project_id(project)?;
        let resource: ReleaseResource = client
            .get(&release_path(&project_id, version))
            .map_err(|e| match e.status() {
                Some(404) => {
                    OctopusError::not_found(EntityKind::Release, format!("{}/{}", project, version))
                }
                _ => e,
            })?;
        Ok(Self::from_resource(client, resource))
    }

    /// Create a release unless one already exists for the project and version.
    ///
    /// An existing release is fetched and returned unchanged; nothing is posted.
    pub fn create(
        client: &'c OctopusClient<T>,
        request: &CreateRelease,
    ) -> Result<(Self, CreateOutcome)> {
        let web_url = client.release_web_url(&request.project, &request.version);

        if Self::exists(client, &request.project, &request.version)? {
            tracing::info!(
                project = %request.project,
                version = %request.version,
                "release already exists: {}",
                web_url
            );
            let release = Self::from_project_and_version(client, &request.project, &request.version)?;
            return Ok((release, CreateOutcome::AlreadyExists));
        }

        let project_id = client.lookup_project_id(&request.project)?;
        let selected_packages = match &request.package_constraint {
            Some(constraint) => vec![select_bootstrapper(client, constraint)?],
            None => select_latest_packages(client, &project_id)?,
        };

        let body = CreateReleaseBody {
            project_id,
            version: request.version.clone(),
            release_notes: request.notes.clone(),
            selected_packages,
        };
        let resource: ReleaseResource = client.post("api/releases", &body)?;

        tracing::info!(
            project = %request.project,
            version = %resource.version,
            release_id = %resource.id,
            "created release: {}",
            web_url
        );
        Ok((Self::from_resource(client, resource), CreateOutcome::Created))
    }

    pub fn id(&self) -> &str {
        &self.resource.id
    }

    pub fn project_id(&self) -> &str {
        &self.resource.project_id
    }

    pub fn version(&self) -> &str {
        &self.resource.version
    }

    pub fn selected_packages(&self) -> &[SelectedPackage] {
        &self.resource.selected_packages
    }

    pub fn resource(&self) -> &ReleaseResource {
        &self.resource
    }

    pub(crate) fn client(&self) -> &'c OctopusClient<T> {
        self.client
    }

    /// Map project variable names to their ids in this release's snapshot.
    ///
    /// Fetched on first use and cached for the lifetime of this instance.
    pub fn form_variable_id_mapping(&self) -> Result<&HashMap<String, String>> {
        if let Some(ids) = self.variable_ids.get() {
            return Ok(ids);
        }

        let path = self
            .resource
            .links
            .project_variable_snapshot
            .as_deref()
            .map(|link| link.trim_start_matches('/').to_string())
            .ok_or_else(|| OctopusError::Decode {
                path: format!("api/releases/{}", self.resource.id),
                reason: "release has no variable snapshot link".to_string(),
            })?;

        let snapshot: VariableSnapshot = self.client.get(&path)?;
        let mut ids = HashMap::new();
        for variable in snapshot.variables {
            ids.entry(variable.name).or_insert(variable.id);
        }
        Ok(self.variable_ids.get_or_init(|| ids))
    }
}

fn release_path(project_id: &str, version: &str) -> String {
    format!("api/projects/{}/releases/{}", project_id, version)
}

/// Bind every package of the deployment process to its latest stable version.
fn select_latest_packages<T: Transport>(
    client: &OctopusClient<T>,
    project_id: &str,
) -> Result<Vec<SelectedPackage>> {
    let template: DeploymentProcessTemplate =
        client.get(&format!("api/projects/{}/deploymentprocesses/template", project_id))?;

    let mut selected = Vec::with_capacity(template.packages.len());
    for package in template.packages {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("packageId", &package.package_id)
            .append_pair("preReleaseTag", STABLE_ONLY_TAG)
            .append_pair("take", "1")
            .finish();
        let versions: PackageVersions = client.get(&format!(
            "api/feeds/{}/packages/versions?{}",
            package.feed_id, query
        ))?;

        let latest = versions
            .items
            .into_iter()
            .next()
            .ok_or_else(|| OctopusError::not_found(EntityKind::Package, &package.package_id))?;
        tracing::debug!(
            action = %package.action_name,
            package = %package.package_id,
            version = %latest.version,
            "selected latest package version"
        );
        selected.push(SelectedPackage::new(package.action_name, latest.version));
    }
    Ok(selected)
}

/// List the versions the bootstrapper feed offers.
pub fn bootstrapper_versions<T: Transport>(client: &OctopusClient<T>) -> Result<Vec<String>> {
    let packages = &client.config().packages;
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("packageId", &packages.bootstrapper_package_id)
        .append_pair("take", &packages.catalogue_size.to_string())
        .append_pair("includePreRelease", "false")
        .append_pair("includeReleaseNotes", "false")
        .finish();
    let versions: PackageVersions = client.get(&format!(
        "api/{}/feeds/{}/packages/versions?{}",
        packages.space_id, packages.feed_id, query
    ))?;
    Ok(versions.items.into_iter().map(|item| item.version).collect())
}

fn select_bootstrapper<T: Transport>(
    client: &OctopusClient<T>,
    constraint: &VersionConstraint,
) -> Result<SelectedPackage> {
    let available = bootstrapper_versions(client)?;
    let resolved = VersionResolver::resolve(&available, constraint)?;
    tracing::info!(
        constraint = %constraint,
        version = %resolved.original,
        "resolved bootstrapper version"
    );
    Ok(SelectedPackage::new(
        client.config().packages.bootstrapper_action_name.clone(),
        resolved.original,
    ))
}
