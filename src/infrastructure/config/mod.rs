//! Configuration management infrastructure.
//!
//! Hierarchical configuration using figment: programmatic defaults, then a
//! project YAML file, then `AGON_*` environment variables.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
