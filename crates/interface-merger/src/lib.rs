//! Command layer of the interface merger: source discovery, option loading and output.

pub mod merge;
pub mod sources;
