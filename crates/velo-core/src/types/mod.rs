//! Wire resources exchanged with the deployment server.
//!
//! Only the fields this crate reads or writes are modelled; everything else
//! in a server resource is ignored on deserialization.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Any resource listed by name, e.g. environments and tenants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NamedResource {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectResource {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseLinks {
    #[serde(default)]
    pub project_variable_snapshot: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseResource {
    pub id: String,
    pub project_id: String,
    pub version: String,
    #[serde(default)]
    pub release_notes: Option<String>,
    #[serde(default)]
    pub selected_packages: Vec<SelectedPackage>,
    #[serde(default)]
    pub links: ReleaseLinks,
}

/// Binding of a deployment step action to a package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SelectedPackage {
    pub action_name: String,
    pub version: String,
}

impl SelectedPackage {
    pub fn new(action_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateReleaseBody {
    pub project_id: String,
    pub version: String,
    pub release_notes: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selected_packages: Vec<SelectedPackage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentProcessTemplate {
    #[serde(default)]
    pub packages: Vec<TemplatePackage>,
}

/// A package referenced by a step of the deployment process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplatePackage {
    pub action_name: String,
    pub feed_id: String,
    pub package_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageVersions {
    #[serde(default)]
    pub items: Vec<PackageVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageVersion {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VariableSnapshot {
    #[serde(default)]
    pub variables: Vec<NamedResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentPreview {
    #[serde(default)]
    pub form: DeploymentForm,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentForm {
    #[serde(default)]
    pub elements: Vec<FormElement>,
}

/// One prompted value on the deployment form. `name` is the element id the
/// server expects as a `FormValues` key; `control.name` is the variable name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FormElement {
    pub name: String,
    pub control: FormControl,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FormControl {
    pub name: String,
}

impl DeploymentPreview {
    /// Map variable names to form element ids.
    pub fn element_ids(&self) -> HashMap<String, String> {
        self.form
            .elements
            .iter()
            .map(|element| (element.control.name.clone(), element.name.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDeploymentBody {
    pub environment_id: String,
    pub project_id: String,
    pub release_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub form_values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentResource {
    pub id: String,
}

/// Per-project timeline of releases and their deployments per environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Progression {
    #[serde(default)]
    pub releases: Vec<ProgressionRelease>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProgressionRelease {
    pub release: ReleaseRef,
    /// Keyed by environment id
    #[serde(default)]
    pub deployments: HashMap<String, Vec<ProgressionEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProgressionEntry {
    pub deployment_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub state: String,
    #[serde(default)]
    pub has_warnings_or_errors: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Progression {
    /// Find the entry for one deployment of one release in one environment.
    ///
    /// When `tenant_id` is given the entry must also belong to that tenant.
    pub fn find_entry(
        &self,
        release_id: &str,
        environment_id: &str,
        deployment_id: &str,
        tenant_id: Option<&str>,
    ) -> Option<&ProgressionEntry> {
        self.releases
            .iter()
            .filter(|rel| rel.release.id == release_id)
            .filter_map(|rel| rel.deployments.get(environment_id))
            .flatten()
            .find(|entry| {
                entry.deployment_id == deployment_id
                    && tenant_id.is_none_or(|tenant| entry.tenant_id.as_deref() == Some(tenant))
            })
    }
}
