//! Common test utilities for integration tests
//!
//! Deterministic executors, a recording observer and small builders shared
//! by the orchestrator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use evoprompt::adapters::generation::MockGenerationService;
use evoprompt::adapters::memory::InMemoryRunStore;
use evoprompt::domain::models::{
    AdversarialRecord, Candidate, CaseExecution, EvaluationResult, OptimizationConfig,
    SuiteDefaults, TerminationReason, TestCase, TestSuite,
};
use evoprompt::domain::ports::{
    EvolutionObserver, ExecutionError, HumanResponse, RunStore, TestExecutor,
};
use evoprompt::services::{CostTracker, Evaluator, EvolutionOrchestrator, Mutator};

type Judge = dyn Fn(&str, &TestCase) -> Result<bool, String> + Send + Sync;

/// Executor that decides pass/fail from the candidate text alone.
/// `Err` from the judge becomes a per-case system error.
pub struct JudgeExecutor {
    name: String,
    judge: Box<Judge>,
}

impl JudgeExecutor {
    pub fn new<F>(name: &str, judge: F) -> Self
    where
        F: Fn(&str, &TestCase) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            judge: Box::new(judge),
        }
    }

    /// Passes every case only for exactly `text`.
    pub fn exact(text: &str) -> Self {
        let expected = text.to_string();
        Self::new("exact", move |candidate, _| Ok(candidate == expected))
    }

    /// Passes a fraction of cases that grows with the candidate's length.
    pub fn longer_is_better(cases: usize) -> Self {
        Self::new("length", move |candidate, case| {
            let index: usize = case.id.trim_start_matches('c').parse().unwrap_or(0);
            Ok(candidate.len() / 20 > index % cases.max(1))
        })
    }

    pub fn always(passed: bool) -> Self {
        Self::new("always", move |_, _| Ok(passed))
    }

    pub fn broken() -> Self {
        Self::new("broken", |_, _| Err("backend down".to_string()))
    }
}

#[async_trait]
impl TestExecutor for JudgeExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        candidate_text: &str,
        case: &TestCase,
        _defaults: &SuiteDefaults,
    ) -> Result<CaseExecution, ExecutionError> {
        match (self.judge)(candidate_text, case) {
            Ok(passed) => Ok(CaseExecution {
                output: candidate_text.to_string(),
                duration: Duration::from_millis(1),
                passed,
                failure_reasons: if passed {
                    vec![]
                } else {
                    vec!["judge rejected output".to_string()]
                },
                system_error: None,
            }),
            Err(message) => Ok(CaseExecution::system_error(message, Duration::from_millis(1))),
        }
    }
}

/// Observer that records every event and answers the human gate from a
/// script.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
    pub new_best_scores: Mutex<Vec<f64>>,
    pub adversarial: Mutex<Vec<AdversarialRecord>>,
    pub completed: Mutex<Option<TerminationReason>>,
    responses: Mutex<Vec<HumanResponse>>,
}

impl RecordingObserver {
    pub fn with_responses(responses: Vec<HumanResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl EvolutionObserver for RecordingObserver {
    async fn on_run_start(&self, _initial_text: &str, target_score: f64) {
        self.push(format!("start:{target_score}"));
    }

    async fn on_generation_start(&self, generation: u32) {
        self.push(format!("generation:{generation}"));
    }

    async fn on_candidate_evaluated(&self, candidate: &Candidate, result: &EvaluationResult) {
        self.push(format!("evaluated:{}:{}", candidate.origin, result.score));
    }

    async fn on_new_best(&self, _candidate: &Candidate, score: f64) {
        self.new_best_scores.lock().unwrap().push(score);
        self.push(format!("best:{score}"));
    }

    async fn on_adversarial_result(&self, record: &AdversarialRecord) {
        self.adversarial.lock().unwrap().push(record.clone());
        self.push(format!("adversarial:{}", record.generation));
    }

    async fn on_run_complete(&self, _best: &Candidate, reason: TerminationReason) {
        *self.completed.lock().unwrap() = Some(reason);
        self.push(format!("complete:{reason}"));
    }

    async fn request_human_input(&self, _best: &Candidate, generation: u32) -> HumanResponse {
        self.push(format!("human:{generation}"));
        self.responses.lock().unwrap().pop().unwrap_or_default()
    }
}

/// A suite of `n` cases named c0..c(n-1).
pub fn suite(n: usize) -> TestSuite {
    TestSuite::new(
        "integration",
        (0..n)
            .map(|i| TestCase::new(format!("c{i}"), format!("question {i}")))
            .collect(),
    )
}

pub fn config(max_generations: u32, candidates: u32) -> OptimizationConfig {
    OptimizationConfig {
        max_generations,
        candidates_per_generation: candidates,
        target_score: 1.0,
        strategies: vec!["refinement".to_string()],
        ..OptimizationConfig::default()
    }
}

/// Orchestrator over an in-memory store, returned together with the store.
pub fn orchestrator(
    config: OptimizationConfig,
    executor: JudgeExecutor,
    generator: MockGenerationService,
) -> (EvolutionOrchestrator, Arc<InMemoryRunStore>) {
    let store = Arc::new(InMemoryRunStore::new());
    let orchestrator = orchestrator_with_store(config, executor, generator, store.clone());
    (orchestrator, store)
}

pub fn orchestrator_with_store(
    config: OptimizationConfig,
    executor: JudgeExecutor,
    generator: MockGenerationService,
    store: Arc<dyn RunStore>,
) -> EvolutionOrchestrator {
    EvolutionOrchestrator::new(
        config,
        Evaluator::new(Arc::new(executor)),
        Mutator::new(Some(Arc::new(generator))),
        store,
        CostTracker::new(),
    )
}
