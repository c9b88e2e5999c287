//! Small numeric helpers shared by the search loop.

pub mod sampling;
