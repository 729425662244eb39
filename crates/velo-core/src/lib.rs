//! Velo Core Library
//!
//! Drives releases and deployments against an Octopus Deploy server:
//! name lookups, idempotent release creation with package version
//! selection, and deployments that poll until they finish.

pub mod client;
pub mod config;
pub mod deployment;
pub mod error;
pub mod orchestration;
pub mod release;
pub mod transport;
pub mod types;
pub mod version;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{PackageConfig, PollingConfig, ServerConfig, VeloConfig};

    // Client
    pub use crate::client::OctopusClient;
    pub use crate::error::{EntityKind, OctopusError, Result};
    pub use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};

    // Release
    pub use crate::release::{CommitInfo, CreateOutcome, CreateRelease, Release, ReleaseNotes};

    // Deployment
    pub use crate::deployment::{DeployRequest, Deployment, DeploymentState};

    // Orchestration
    pub use crate::orchestration::{Pipeline, PipelinePlan, PipelineReport};

    // Version
    pub use crate::version::{ResolvedVersion, VersionConstraint, VersionResolver};
}
