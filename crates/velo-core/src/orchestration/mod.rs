//! Release-then-deploy orchestration across environments and tenants.

pub mod pipeline;

pub use pipeline::{DeploymentReport, Pipeline, PipelinePlan, PipelineReport, ReleaseSummary};
