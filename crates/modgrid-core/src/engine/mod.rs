//! # Engine Module
//!
//! The stateful search layer. Given a populated grid and the set of cells it may
//! touch, the engine runs simulated annealing and returns the best layout found.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Annealing schedule, budgets and their validation
//! - **Search** ([`annealing`]) - The temperature loop with acceptance, reheating and termination
//! - **Moves** ([`moves`]) - Swap/relocate proposals with constant-time revert
//! - **Placement** ([`placement`]) - Initial population of the search region
//! - **Windowing** ([`window`]) - Optional restriction of the search to a compact sub-grid
//! - **Progress Monitoring** ([`progress`]) - Snapshots delivered to a caller-supplied sink
//! - **Cancellation** ([`cancel`]) - Cooperative stop flag checked before every move
//! - **Error Handling** ([`error`]) - Engine-level error type wrapping the core errors
//!
//! A run draws every random number from one caller-provided generator, so the
//! same seed, inputs and step budget always produce the same grid.

pub mod annealing;
pub mod cancel;
pub mod config;
pub mod context;
pub mod error;
pub mod moves;
pub mod placement;
pub mod progress;
pub mod state;
pub(crate) mod utils;
pub mod window;
