//! # Core Module
//!
//! Stateless building blocks of the placement optimizer.
//!
//! - **Grid Model** ([`models`]) - The slot lattice, its cells and the modules they hold
//! - **Module Catalog** ([`catalog`]) - Ship layouts and technology module definitions
//! - **Scoring Engine** ([`scoring`]) - Adjacency and supercharge scoring of a grid
//! - **Serialization** ([`io`]) - Wire representations of grids
//!
//! Nothing in this layer holds hidden state or draws random numbers. The same inputs
//! always give the same outputs.

pub mod catalog;
pub mod io;
pub mod models;
pub mod scoring;
