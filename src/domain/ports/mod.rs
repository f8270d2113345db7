//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - GenerationService: text generation backends
//! - TestExecutor: running one test case against a candidate
//! - RunStore: durable storage for optimization runs
//! - EvolutionObserver: progress events and the human gate
//!
//! These traits keep the optimization services independent of specific
//! providers and storage engines.

pub mod generation;
pub mod observer;
pub mod run_store;
pub mod test_executor;

pub use generation::{
    generate_within, Generation, GenerationError, GenerationParams, GenerationService, TokenUsage,
};
pub use observer::{EvolutionObserver, HumanResponse, NullObserver};
pub use run_store::{validate_prefix, RunStore};
pub use test_executor::{ExecutionError, TestExecutor};
