//! # Workflows Module
//!
//! High-level entry points that tie the [`crate::core`] data model and the
//! [`crate::engine`] search together.
//!
//! - **Optimization** ([`optimize`]) - Validates a request against the catalog, derives
//!   the search region and runs placement plus annealing to a single result.
//! - **Golden Fixtures** ([`golden`]) - Records seeded runs as JSON fixtures and replays
//!   them to check that the engine still reproduces its recorded output.

pub mod golden;
pub mod optimize;
