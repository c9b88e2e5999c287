//! Serialized representations of grids.
//!
//! [`dto::GridDto`] is the row-major wire form used by the job protocol and by golden
//! fixtures. Converting a grid to it and back yields an equal grid.

pub mod dto;
