//! # Core Models Module
//!
//! Data structures describing the slot lattice and the modules placed on it.
//!
//! - [`grid`] - The fixed-shape [`grid::Grid`] of [`grid::Cell`]s and their occupants
//! - [`module`] - Catalog [`module::Module`] records and their [`module::AdjacencyKind`]
//!
//! A grid's shape is fixed at construction. Only occupancy changes afterwards, and an
//! occupant can never sit on an inactive cell.

pub mod grid;
pub mod module;
