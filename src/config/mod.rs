//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - `types`: Config struct definitions (Config, NetworkConfig, ProfileConfig, ServerConfig)
//! - `validation`: Cross-reference checks run before any connection is made
//! - `defaults`: serde default value functions

mod defaults;
mod types;
mod validation;

pub use defaults::default_quit_reason;
pub use types::{Config, ConfigError, EngineConfig, NetworkConfig, ProfileConfig, ServerConfig};
pub use validation::{ValidationError, validate};
