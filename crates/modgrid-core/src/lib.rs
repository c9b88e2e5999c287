//! # modgrid Core Library
//!
//! Placement optimizer for modules on a fixed, irregular grid of slots. Modules
//! score a base bonus, gain adjacency bonuses from same-technology neighbours and
//! are boosted on supercharged slots; the optimizer searches for the highest
//! scoring layout with simulated annealing.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three layers throughout:
//!
//! - **[`core`]: The Foundation.** Stateless data: the `Grid` model, the module
//!   `Catalog`, the pure `Scorer` and the wire representation of grids.
//!
//! - **[`engine`]: The Logic Core.** The stateful search: initial placement, the
//!   move sampler with undo, the annealing loop, progress snapshots and cooperative
//!   cancellation. Every random draw comes from one seeded generator.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built from the layers
//!   below: running one optimization request and generating or verifying golden
//!   fixtures.

pub mod core;
pub mod engine;
pub mod workflows;
