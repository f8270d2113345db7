//! Domain layer for the evoprompt optimization engine
//!
//! This module contains the core data model, error taxonomy and port traits.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
