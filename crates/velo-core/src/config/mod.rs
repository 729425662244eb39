//! Configuration for the deployment server connection and polling behaviour.
//!
//! Nothing in this crate reads the process environment; callers build a
//! [`VeloConfig`] (or parse one from TOML) and pass it in explicitly.

pub mod parser;
pub mod schema;

pub use parser::{parse_config_file, parse_config_str, to_toml};
pub use schema::{PackageConfig, PollingConfig, ServerConfig, VeloConfig};
