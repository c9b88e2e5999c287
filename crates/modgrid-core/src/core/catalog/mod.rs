//! Ship layouts and technology module definitions.
//!
//! A [`registry::Catalog`] is loaded once from TOML (or taken from the built-in copy)
//! and is read-only afterwards, so it can be shared across concurrent optimizations.

pub mod layout;
pub mod registry;
