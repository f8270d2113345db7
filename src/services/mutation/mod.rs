//! Mutation strategies and the round-robin mutator.

pub mod mutator;
pub mod strategy;

pub use mutator::Mutator;
pub use strategy::{
    BuiltinStrategy, CustomStrategy, MutationStrategy, StrategyRegistry, CHAIN_OF_THOUGHT_SUFFIX,
    COMPRESSION_LABEL, MUTATION_SYSTEM_PROMPT, PERSONA_LINE,
};
