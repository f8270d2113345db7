pub mod candidate;
pub mod config;
pub mod run;
pub mod test_suite;
pub mod validation;

pub use candidate::{origin, Candidate, EvaluationResult, CROSS_VALIDATION_KEY};
pub use config::{
    AdversarialConfig, Config, DatabaseConfig, GenerationConfig, LoggingConfig, TimeoutConfig,
};
pub use run::{
    AdversarialRecord, OptimizationConfig, OptimizationRun, RunStatus, RunSummary,
    TerminationReason,
};
pub use test_suite::{Assertion, CaseExecution, SuiteDefaults, TestCase, TestSuite};
pub use validation::{ModelScore, ValidationReport, OVERFIT_MARGIN};
