//! Terraflow Config
//!
//! This crate contains the serializable infrastructure configuration types
//! for terraflow: the set of workspaces to orchestrate, their dependency
//! edges, and the output→input mappings between them.
//!
//! Configuration can be loaded from:
//! - YAML files (the CLI's `--config=infra.yaml` surface)
//! - JSON payloads (inline API calls)
//!
//! The engine takes these configuration types, validates the dependency
//! graph (cycles, unknown references, operation sequences), normalizes
//! paths and defaults, and computes DAG depths for its hosting decisions.

mod config;
mod depth;
mod error;
mod loader;
mod normalize;
mod validate;

pub use config::{InfrastructureConfig, InputMapping, WorkspaceConfig, default_operations};
pub use depth::calculate_depths;
pub use error::{ConfigError, ConfigErrorCategory};
pub use loader::load_config;
pub use normalize::normalize_config;
pub use validate::{validate_config, validate_workspace_operations};
