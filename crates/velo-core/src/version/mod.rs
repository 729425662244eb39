//! Version constraints and highest-match resolution over package catalogues.

pub mod constraint;

pub use constraint::{ResolvedVersion, VersionConstraint, VersionResolver, coerce};
