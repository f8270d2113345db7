pub mod adversarial;
pub mod cost_tracker;
pub mod cross_provider;
pub mod evaluator;
pub mod evolution_orchestrator;
pub mod mutation;
pub mod suite_loader;
pub mod text_utils;

pub use adversarial::AdversarialProbeGenerator;
pub use cost_tracker::{CostTracker, ModelPricing, PricingTable};
pub use cross_provider::{CrossProviderValidator, ValidationTarget};
pub use evaluator::Evaluator;
pub use evolution_orchestrator::EvolutionOrchestrator;
pub use mutation::{BuiltinStrategy, CustomStrategy, MutationStrategy, Mutator, StrategyRegistry};
pub use suite_loader::load_suite;
