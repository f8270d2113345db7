//! Adapter implementations of the domain ports.

pub mod execution;
pub mod generation;
pub mod memory;
pub mod sqlite;
