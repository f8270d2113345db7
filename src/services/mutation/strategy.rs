//! Mutation strategies.
//!
//! The built-in set is a closed enum. Host applications add their own
//! strategies through [`StrategyRegistry::register`].

use async_trait::async_trait;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{generate_within, GenerationService};
use crate::services::text_utils::clean_rewrite;

/// System instruction for every rewrite request.
pub const MUTATION_SYSTEM_PROMPT: &str = "You are an expert prompt engineer. You rewrite prompts so that a \
language model following them performs better on its test suite. Reply with the rewritten prompt only, \
without commentary, headings or surrounding quotes.";

/// Suffix appended by the offline chain-of-thought transformation.
pub const CHAIN_OF_THOUGHT_SUFFIX: &str =
    "Think through the problem step by step before giving your final answer.";

/// Line prepended by the offline persona transformation.
pub const PERSONA_LINE: &str =
    "You are a world-class expert in this domain who answers with precision and care.";

/// Label placed in front of offline compressions.
pub const COMPRESSION_LABEL: &str = "[Concise]";

/// Failures quoted back to the generation service.
const MAX_QUOTED_FAILURES: usize = 5;

/// Failures folded into the offline refinement.
const MAX_LOCAL_FAILURES: usize = 3;

/// Built-in mutation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinStrategy {
    Refinement,
    Expansion,
    Compression,
    ChainOfThought,
    Persona,
    FewShot,
}

impl BuiltinStrategy {
    pub const ALL: [Self; 6] = [
        Self::Refinement,
        Self::Expansion,
        Self::Compression,
        Self::ChainOfThought,
        Self::Persona,
        Self::FewShot,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Refinement => "refinement",
            Self::Expansion => "expansion",
            Self::Compression => "compression",
            Self::ChainOfThought => "chain_of_thought",
            Self::Persona => "persona",
            Self::FewShot => "few_shot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    fn instruction(self) -> &'static str {
        match self {
            Self::Refinement => {
                "Improve the prompt below so that it fixes the observed failures while keeping \
                 everything that already works."
            }
            Self::Expansion => {
                "Expand the prompt below with the missing detail, constraints and context a model \
                 needs to answer well."
            }
            Self::Compression => {
                "Rewrite the prompt below to be as short as possible without losing any requirement."
            }
            Self::ChainOfThought => {
                "Rewrite the prompt below so that it asks the model to reason step by step before \
                 answering."
            }
            Self::Persona => {
                "Rewrite the prompt below so that it opens by giving the model a fitting expert \
                 persona."
            }
            Self::FewShot => {
                "Rewrite the prompt below to include one or two short input/output examples that \
                 demonstrate the expected answer."
            }
        }
    }

    /// Request sent to the generation service.
    pub fn meta_prompt(self, parent: &str, prior_failures: &[String]) -> String {
        let mut prompt = format!(
            "{}\n\nCurrent prompt:\n<<<\n{}\n>>>",
            self.instruction(),
            parent
        );
        if !prior_failures.is_empty() {
            prompt.push_str("\n\nObserved test failures:");
            for failure in prior_failures.iter().take(MAX_QUOTED_FAILURES) {
                prompt.push_str("\n- ");
                prompt.push_str(failure);
            }
        }
        prompt
    }

    /// Deterministic transformation used when no service answers.
    pub fn local_transform(self, parent: &str, prior_failures: &[String]) -> String {
        match self {
            Self::Refinement => {
                if prior_failures.is_empty() {
                    format!("{parent}\n\nBe specific and complete in every answer.")
                } else {
                    let mut text = format!("{parent}\n\nAvoid these observed problems:");
                    for failure in prior_failures.iter().take(MAX_LOCAL_FAILURES) {
                        text.push_str("\n- ");
                        text.push_str(failure);
                    }
                    text
                }
            }
            Self::Expansion => format!(
                "{parent}\n\nInclude the relevant detail and a short example where it helps."
            ),
            Self::Compression => {
                let words: Vec<&str> = parent.split_whitespace().collect();
                let keep = (words.len() * 3).div_ceil(5).max(1).min(words.len());
                format!("{COMPRESSION_LABEL} {}", words[..keep].join(" "))
            }
            Self::ChainOfThought => {
                if parent.trim_end().ends_with(CHAIN_OF_THOUGHT_SUFFIX) {
                    parent.to_string()
                } else {
                    format!("{parent}\n\n{CHAIN_OF_THOUGHT_SUFFIX}")
                }
            }
            Self::Persona => {
                if parent.trim_start().starts_with(PERSONA_LINE) {
                    parent.to_string()
                } else {
                    format!("{PERSONA_LINE}\n\n{parent}")
                }
            }
            Self::FewShot => format!(
                "{parent}\n\nFollow the pattern of this example:\nInput: a typical request\n\
                 Output: a direct, well-structured answer that satisfies every requirement."
            ),
        }
    }
}

/// Extension point for host-defined strategies.
#[async_trait]
pub trait CustomStrategy: Send + Sync {
    /// Produce a new text from `parent`. Errors fall back to the parent text.
    async fn mutate(
        &self,
        parent: &str,
        service: Option<&dyn GenerationService>,
        prior_failures: &[String],
    ) -> anyhow::Result<String>;
}

/// A resolved, ready-to-run strategy.
#[derive(Clone)]
pub enum MutationStrategy {
    Builtin(BuiltinStrategy),
    Custom {
        name: String,
        strategy: Arc<dyn CustomStrategy>,
    },
}

impl fmt::Debug for MutationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(s) => f.debug_tuple("Builtin").field(s).finish(),
            Self::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

impl MutationStrategy {
    pub fn name(&self) -> &str {
        match self {
            Self::Builtin(s) => s.name(),
            Self::Custom { name, .. } => name,
        }
    }

    /// Produce a child text. Never fails: service errors degrade to the
    /// offline transformation, anything else (including a panicking host
    /// strategy) to the parent text.
    pub async fn mutate(
        &self,
        parent: &str,
        service: Option<&dyn GenerationService>,
        prior_failures: &[String],
        deadline: Duration,
    ) -> String {
        match self {
            Self::Builtin(strategy) => {
                let Some(service) = service else {
                    return strategy.local_transform(parent, prior_failures);
                };

                let prompt = strategy.meta_prompt(parent, prior_failures);
                match generate_within(service, &prompt, Some(MUTATION_SYSTEM_PROMPT), deadline).await {
                    Ok(generation) => {
                        let text = clean_rewrite(&generation.text);
                        if text.is_empty() {
                            tracing::warn!(
                                strategy = strategy.name(),
                                "empty rewrite from generation service, keeping parent"
                            );
                            parent.to_string()
                        } else {
                            text
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            strategy = strategy.name(),
                            error = %e,
                            "generation failed, using offline transformation"
                        );
                        strategy.local_transform(parent, prior_failures)
                    }
                }
            }
            Self::Custom { name, strategy } => {
                let call =
                    AssertUnwindSafe(strategy.mutate(parent, service, prior_failures)).catch_unwind();
                match tokio::time::timeout(deadline, call).await {
                    Ok(Ok(Ok(text))) if !text.trim().is_empty() => text,
                    Ok(Ok(Ok(_))) => parent.to_string(),
                    Ok(Ok(Err(e))) => {
                        tracing::warn!(strategy = %name, error = %e, "custom strategy failed");
                        parent.to_string()
                    }
                    Ok(Err(_)) => {
                        tracing::error!(strategy = %name, "custom strategy panicked");
                        parent.to_string()
                    }
                    Err(_) => {
                        tracing::warn!(strategy = %name, "custom strategy timed out");
                        parent.to_string()
                    }
                }
            }
        }
    }
}

/// Name-keyed set of strategies: every built-in plus registered extensions.
#[derive(Clone)]
pub struct StrategyRegistry {
    custom: BTreeMap<String, Arc<dyn CustomStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            custom: BTreeMap::new(),
        }
    }

    /// Register a host strategy. Built-in names cannot be shadowed.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        strategy: Arc<dyn CustomStrategy>,
    ) -> DomainResult<()> {
        let name = name.into();
        if BuiltinStrategy::from_name(&name).is_some() {
            return Err(DomainError::Configuration(format!(
                "strategy name '{name}' is reserved for a built-in strategy"
            )));
        }
        self.custom.insert(name, strategy);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<MutationStrategy> {
        BuiltinStrategy::from_name(name)
            .map(MutationStrategy::Builtin)
            .or_else(|| {
                self.custom.get(name).map(|strategy| MutationStrategy::Custom {
                    name: name.to_string(),
                    strategy: Arc::clone(strategy),
                })
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        BuiltinStrategy::from_name(name).is_some() || self.custom.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        BuiltinStrategy::ALL
            .iter()
            .map(|s| s.name().to_string())
            .chain(self.custom.keys().cloned())
            .collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
