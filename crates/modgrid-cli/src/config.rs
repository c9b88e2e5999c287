//! Layered CLI configuration: built-in defaults, an optional TOML file,
//! `-S key=value` overrides and finally the dedicated command-line flags.

mod builder;
mod defaults;
mod file;
mod models;

pub use builder::build_config;
pub use models::{AppConfig, ServerSettings, load_catalog};
