//! Error types for release and deployment orchestration.

use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, OctopusError>;

/// Kind of named entity a lookup was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Environment,
    Tenant,
    Release,
    Package,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Project => "project",
            EntityKind::Environment => "environment",
            EntityKind::Tenant => "tenant",
            EntityKind::Release => "release",
            EntityKind::Package => "package",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OctopusError {
    #[error("error connecting to '{url}': {reason}")]
    Connection { url: String, reason: String },

    #[error("{kind} '{name}' was not found")]
    NotFound { kind: EntityKind, name: String },

    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("{method} '{path}' failed with status '{status}'")]
    UnexpectedStatus {
        method: String,
        path: String,
        status: u16,
    },

    #[error("failed to decode response from '{path}': {reason}")]
    Decode { path: String, reason: String },

    #[error("invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    #[error(
        "no published version satisfies '{constraint}' (available: {})",
        .available.join(", ")
    )]
    VersionResolution {
        constraint: String,
        available: Vec<String>,
    },

    #[error("a deployment requires a release; none was given")]
    MissingRelease,

    #[error("invalid deployment state: {0}")]
    InvalidState(String),

    #[error("deployment '{deployment_id}' failed with state '{state}'{}", format_detail(.message))]
    DeploymentFailed {
        deployment_id: String,
        state: String,
        message: Option<String>,
    },

    #[error("deployment '{deployment_id}' did not succeed within {}s", .waited.as_secs())]
    DeploymentTimedOut {
        deployment_id: String,
        waited: Duration,
    },

    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to set up http transport: {0}")]
    Transport(String),
}

fn format_detail(message: &Option<String>) -> String {
    match message {
        Some(message) if !message.is_empty() => format!(": {}", message),
        _ => String::new(),
    }
}

impl OctopusError {
    /// Errors that indicate a misconfigured request rather than a transient fault.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            OctopusError::NotFound { .. }
                | OctopusError::VersionResolution { .. }
                | OctopusError::InvalidConstraint { .. }
                | OctopusError::MissingRelease
        )
    }

    pub(crate) fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        OctopusError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Status of a remote failure, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            OctopusError::Remote { status, .. } => Some(*status),
            OctopusError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_entity() {
        let err = OctopusError::not_found(EntityKind::Project, "DoesNotExist");
        assert_eq!(err.to_string(), "project 'DoesNotExist' was not found");
    }

    #[test]
    fn test_remote_message_is_verbatim() {
        let err = OctopusError::Remote {
            status: 400,
            message: "Bad Request: There was a problem with your request.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Bad Request: There was a problem with your request."
        );
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_deployment_failed_display() {
        let err = OctopusError::DeploymentFailed {
            deployment_id: "Deployments-1".to_string(),
            state: "Failed".to_string(),
            message: Some("Step 'run velo' failed".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "deployment 'Deployments-1' failed with state 'Failed': Step 'run velo' failed"
        );

        let err = OctopusError::DeploymentFailed {
            deployment_id: "Deployments-1".to_string(),
            state: "Canceled".to_string(),
            message: None,
        };
        assert_eq!(
            err.to_string(),
            "deployment 'Deployments-1' failed with state 'Canceled'"
        );
    }

    #[test]
    fn test_version_resolution_lists_available() {
        let err = OctopusError::VersionResolution {
            constraint: ">2.0.0".to_string(),
            available: vec!["0.1.9".to_string(), "1.0.0".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "no published version satisfies '>2.0.0' (available: 0.1.9, 1.0.0)"
        );
    }

    #[test]
    fn test_configuration_errors() {
        assert!(OctopusError::MissingRelease.is_configuration_error());
        assert!(OctopusError::not_found(EntityKind::Tenant, "acme").is_configuration_error());
        assert!(
            !OctopusError::DeploymentTimedOut {
                deployment_id: "Deployments-1".to_string(),
                waited: Duration::from_secs(1),
            }
            .is_configuration_error()
        );
        assert!(
            !OctopusError::Connection {
                url: "https://octopus/api".to_string(),
                reason: "refused".to_string(),
            }
            .is_configuration_error()
        );
    }
}
