//! Evoprompt - Evolutionary Prompt Optimization Engine
//!
//! Evoprompt improves a prompt by elitist hill climbing: each generation the
//! best-known prompt is mutated with a set of strategies, every child is
//! scored against a test suite, and a child replaces the best only with a
//! strictly higher score. Runs are budget-gated, checkpointed after every
//! generation and resumable by id prefix.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Adapters** (`adapters`): generation backends, test execution, run stores
//! - **Service Layer** (`services`): mutation, evaluation, validation, orchestration
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use evoprompt::adapters::memory::InMemoryRunStore;
//! use evoprompt::services::{CostTracker, Evaluator, EvolutionOrchestrator, Mutator};
//!
//! let mut orchestrator = EvolutionOrchestrator::new(
//!     config,
//!     Evaluator::new(executor),
//!     Mutator::new(Some(service)),
//!     Arc::new(InMemoryRunStore::new()),
//!     CostTracker::new(),
//! );
//! let run = orchestrator.run("Explain recursion.", &suite).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Assertion, Candidate, Config, EvaluationResult, OptimizationConfig, OptimizationRun,
    RunStatus, RunSummary, TerminationReason, TestCase, TestSuite, ValidationReport,
};
pub use domain::ports::{
    EvolutionObserver, GenerationService, HumanResponse, RunStore, TestExecutor,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CostTracker, CrossProviderValidator, Evaluator, EvolutionOrchestrator, Mutator,
};
