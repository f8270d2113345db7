//! Produces candidate batches from the current best.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{origin, Candidate};
use crate::domain::ports::{generate_within, GenerationService};
use crate::services::text_utils::clean_rewrite;

use super::strategy::{
    BuiltinStrategy, MutationStrategy, StrategyRegistry, MUTATION_SYSTEM_PROMPT,
};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Assigns strategies to output slots and runs them one at a time.
pub struct Mutator {
    service: Option<Arc<dyn GenerationService>>,
    registry: StrategyRegistry,
    call_timeout: Duration,
}

impl Mutator {
    /// Create a mutator. Without a service every strategy runs its offline
    /// transformation.
    pub fn new(service: Option<Arc<dyn GenerationService>>) -> Self {
        Self {
            service,
            registry: StrategyRegistry::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Model used for mutation calls, if a service is configured.
    pub fn model_id(&self) -> Option<&str> {
        self.service.as_deref().map(GenerationService::model_id)
    }

    /// Reject unknown strategy names before a run starts.
    pub fn check_strategies(&self, names: &[String]) -> DomainResult<()> {
        let unknown: Vec<&str> = names
            .iter()
            .filter(|name| !self.registry.contains(name))
            .map(String::as_str)
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Configuration(format!(
                "unknown mutation strategies: {} (available: {})",
                unknown.join(", "),
                self.registry.names().join(", ")
            )))
        }
    }

    /// Resolve configured names, skipping the ones that do not resolve.
    /// An empty result falls back to refinement alone.
    pub fn resolve(&self, names: &[String]) -> Vec<MutationStrategy> {
        let resolved: Vec<MutationStrategy> = names
            .iter()
            .filter_map(|name| self.registry.get(name))
            .collect();

        if resolved.is_empty() {
            vec![MutationStrategy::Builtin(BuiltinStrategy::Refinement)]
        } else {
            resolved
        }
    }

    /// Strategy for each of `count` slots, strictly `strategies[i % k]`.
    pub fn assign(&self, names: &[String], count: usize) -> Vec<MutationStrategy> {
        let strategies = self.resolve(names);
        (0..count)
            .map(|i| strategies[i % strategies.len()].clone())
            .collect()
    }

    /// Produce `count` children of `parent` for `generation`.
    pub async fn generate(
        &self,
        parent: &Candidate,
        generation: u32,
        count: usize,
        names: &[String],
        prior_failures: &[String],
    ) -> Vec<Candidate> {
        let mut children = Vec::with_capacity(count);
        for strategy in self.assign(names, count) {
            let text = strategy
                .mutate(
                    &parent.text,
                    self.service.as_deref(),
                    prior_failures,
                    self.call_timeout,
                )
                .await;
            let child = Candidate::child_of(parent, generation, text, strategy.name());
            tracing::debug!(
                generation,
                strategy = strategy.name(),
                candidate = %child.short_id(),
                "mutated candidate"
            );
            children.push(child);
        }
        children
    }

    /// Two readings of human feedback, literal and creative.
    ///
    /// Falls back to one annotated copy of the parent when no reading could
    /// be generated.
    pub async fn apply_director_feedback(
        &self,
        parent: &Candidate,
        feedback: &str,
        generation: u32,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        if let Some(service) = self.service.as_deref() {
            let readings = [
                (
                    origin::DIRECTOR_LITERAL,
                    "Apply the director's feedback below to the prompt exactly as written. \
                     Change only what the feedback asks for.",
                ),
                (
                    origin::DIRECTOR_CREATIVE,
                    "Use the director's feedback below as inspiration. Interpret its intent \
                     freely and rework the prompt in whatever way best serves it.",
                ),
            ];

            for (tag, instruction) in readings {
                let prompt = format!(
                    "{instruction}\n\nDirector feedback:\n{feedback}\n\nCurrent prompt:\n<<<\n{}\n>>>",
                    parent.text
                );
                match generate_within(
                    service,
                    &prompt,
                    Some(MUTATION_SYSTEM_PROMPT),
                    self.call_timeout,
                )
                .await
                {
                    Ok(generation_result) => {
                        let text = clean_rewrite(&generation_result.text);
                        if text.is_empty() {
                            tracing::warn!(origin = tag, "empty director rewrite discarded");
                        } else {
                            candidates.push(Candidate::child_of(parent, generation, text, tag));
                        }
                    }
                    Err(e) => tracing::warn!(origin = tag, error = %e, "director rewrite failed"),
                }
            }
        }

        if candidates.is_empty() {
            candidates.push(Candidate::child_of(
                parent,
                generation,
                format!("{}\n\n[Director feedback]: {feedback}", parent.text),
                origin::DIRECTOR_FALLBACK,
            ));
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::generation::MockGenerationService;
    use crate::domain::ports::GenerationError;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_round_robin_order() {
        let mutator = Mutator::new(None);
        let assigned = mutator.assign(&names(&["persona", "compression"]), 5);
        let tags: Vec<&str> = assigned.iter().map(MutationStrategy::name).collect();
        assert_eq!(
            tags,
            vec!["persona", "compression", "persona", "compression", "persona"]
        );
    }

    #[test]
    fn test_unresolved_names_fall_back_to_refinement() {
        let mutator = Mutator::new(None);
        let assigned = mutator.assign(&names(&["nope"]), 2);
        assert!(assigned.iter().all(|s| s.name() == "refinement"));
    }

    #[test]
    fn test_check_strategies_reports_unknown() {
        let mutator = Mutator::new(None);
        let err = mutator
            .check_strategies(&names(&["persona", "nope"]))
            .unwrap_err();
        assert!(matches!(err, DomainError::Configuration(msg) if msg.contains("nope")));
        assert!(mutator.check_strategies(&names(&["few_shot"])).is_ok());
    }

    #[tokio::test]
    async fn test_generate_tags_and_links_children() {
        let mutator = Mutator::new(None);
        let parent = Candidate::baseline("Explain recursion");
        let children = mutator
            .generate(&parent, 1, 3, &names(&["chain_of_thought", "persona"]), &[])
            .await;

        assert_eq!(children.len(), 3);
        assert_eq!(children[0].origin, "chain_of_thought");
        assert_eq!(children[1].origin, "persona");
        assert_eq!(children[2].origin, "chain_of_thought");
        assert!(children
            .iter()
            .all(|c| c.parent_id == Some(parent.id) && c.generation == 1));
    }

    #[tokio::test]
    async fn test_director_feedback_two_readings() {
        let service = Arc::new(MockGenerationService::queue(vec![
            "Explain recursion with a base case",
            "Tell a story about recursion",
        ]));
        let mutator = Mutator::new(Some(service));
        let parent = Candidate::baseline("Explain recursion");

        let candidates = mutator
            .apply_director_feedback(&parent, "mention the base case", 2)
            .await;

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].origin, origin::DIRECTOR_LITERAL);
        assert_eq!(candidates[0].text, "Explain recursion with a base case");
        assert_eq!(candidates[1].origin, origin::DIRECTOR_CREATIVE);
    }

    #[tokio::test]
    async fn test_director_feedback_fallback_without_service() {
        let mutator = Mutator::new(None);
        let parent = Candidate::baseline("Explain recursion");
        let candidates = mutator.apply_director_feedback(&parent, "shorter", 1).await;

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].origin, origin::DIRECTOR_FALLBACK);
        assert!(candidates[0].text.starts_with("Explain recursion"));
        assert!(candidates[0].text.contains("shorter"));
    }

    #[tokio::test]
    async fn test_director_feedback_fallback_on_failure() {
        let service = Arc::new(MockGenerationService::failing(GenerationError::Timeout(
            Duration::from_secs(1),
        )));
        let mutator = Mutator::new(Some(service));
        let parent = Candidate::baseline("p");
        let candidates = mutator.apply_director_feedback(&parent, "f", 1).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].origin, origin::DIRECTOR_FALLBACK);
    }
}
