//! Model-aware cost estimation with per-model pricing.
//!
//! Provides the budget gate for optimization runs. Costs are estimates
//! derived from token counts and a static rate table; they are never
//! reconciled against provider billing.

use std::collections::HashMap;

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Cost per million input tokens (USD).
    pub input: f64,
    /// Cost per million output tokens (USD).
    pub output: f64,
}

impl ModelPricing {
    pub const ZERO: Self = Self {
        input: 0.0,
        output: 0.0,
    };
}

/// Known model pricing (costs in USD per million tokens).
const DEFAULT_PRICING: &[(&str, ModelPricing)] = &[
    ("claude-opus-4", ModelPricing { input: 15.0, output: 75.0 }),
    ("claude-sonnet-4", ModelPricing { input: 3.0, output: 15.0 }),
    ("claude-haiku-4", ModelPricing { input: 0.80, output: 4.0 }),
    ("claude-3-5-haiku", ModelPricing { input: 0.80, output: 4.0 }),
    ("gpt-4o", ModelPricing { input: 2.50, output: 10.0 }),
    ("gpt-4o-mini", ModelPricing { input: 0.15, output: 0.60 }),
    ("gpt-4.1", ModelPricing { input: 2.0, output: 8.0 }),
    ("gpt-4.1-mini", ModelPricing { input: 0.40, output: 1.60 }),
    ("o3-mini", ModelPricing { input: 1.10, output: 4.40 }),
];

/// Approximate characters per token for estimation.
const CHARS_PER_TOKEN: usize = 4;

/// Estimated token count of `text`: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u64
}

/// Rate table resolved by longest matching model prefix.
#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: Vec<(String, ModelPricing)>,
}

impl PricingTable {
    pub fn new(entries: impl IntoIterator<Item = (String, ModelPricing)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, pricing)| (name.to_lowercase(), pricing))
                .collect(),
        }
    }

    /// Add or replace the rate for `prefix`.
    pub fn with_rate(mut self, prefix: impl Into<String>, pricing: ModelPricing) -> Self {
        let prefix = prefix.into().to_lowercase();
        self.entries.retain(|(name, _)| *name != prefix);
        self.entries.push((prefix, pricing));
        self
    }

    /// Pricing for `model`. The longest table prefix wins, so "gpt-4o-mini-2024"
    /// resolves to "gpt-4o-mini" rather than "gpt-4o".
    pub fn resolve(&self, model: &str) -> Option<ModelPricing> {
        let model_lower = model.to_lowercase();
        self.entries
            .iter()
            .filter(|(name, _)| model_lower.starts_with(name.as_str()))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, pricing)| *pricing)
    }

    /// Cost in USD for the given token counts; unknown models cost nothing.
    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let pricing = self.resolve(model).unwrap_or(ModelPricing::ZERO);
        (input_tokens as f64 * pricing.input + output_tokens as f64 * pricing.output)
            / 1_000_000.0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_PRICING
                .iter()
                .map(|(name, pricing)| ((*name).to_string(), *pricing)),
        )
    }
}

/// Accumulates estimated spend for one optimization run.
///
/// Owned and mutated by the orchestrator alone, so it needs no locking.
#[derive(Debug, Clone, Default)]
pub struct CostTracker {
    pricing: PricingTable,
    total_usd: f64,
    total_input_tokens: u64,
    total_output_tokens: u64,
    by_model: HashMap<String, f64>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pricing(pricing: PricingTable) -> Self {
        Self {
            pricing,
            ..Self::default()
        }
    }

    /// Record usage and return the cost it added.
    pub fn add_usage(&mut self, input_tokens: u64, output_tokens: u64, model: &str) -> f64 {
        let cost = self.pricing.cost(model, input_tokens, output_tokens);
        self.total_input_tokens += input_tokens;
        self.total_output_tokens += output_tokens;
        self.total_usd += cost;
        *self.by_model.entry(model.to_string()).or_default() += cost;
        cost
    }

    /// Running total in USD.
    pub fn estimated_cost(&self) -> f64 {
        self.total_usd
    }

    /// Start over from a previously accrued total (used on resume).
    pub fn restore(&mut self, accrued_usd: f64) {
        self.total_usd = accrued_usd;
        self.total_input_tokens = 0;
        self.total_output_tokens = 0;
        self.by_model.clear();
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.total_input_tokens
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.total_output_tokens
    }

    /// Format as a human-readable summary.
    pub fn format_summary(&self) -> String {
        let mut s = format!(
            "Estimated cost: ${:.4} ({}K input, {}K output)",
            self.total_usd,
            self.total_input_tokens / 1000,
            self.total_output_tokens / 1000,
        );

        if self.by_model.len() > 1 {
            s.push_str("\n  By model:");
            let mut models: Vec<_> = self.by_model.iter().collect();
            models.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
            for (model, cost) in models {
                s.push_str(&format!("\n    {model}: ${cost:.4}"));
            }
        }

        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        let table = PricingTable::new(vec![
            ("gpt-4o".to_string(), ModelPricing { input: 2.5, output: 10.0 }),
            ("gpt-4o-mini".to_string(), ModelPricing { input: 0.15, output: 0.6 }),
        ]);
        let pricing = table.resolve("gpt-4o-mini-2024").unwrap();
        assert!((pricing.input - 0.15).abs() < f64::EPSILON);

        let pricing = table.resolve("gpt-4o-2024-08-06").unwrap();
        assert!((pricing.input - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resolution_is_order_independent() {
        let table = PricingTable::new(vec![
            ("gpt-4o-mini".to_string(), ModelPricing { input: 0.15, output: 0.6 }),
            ("gpt-4o".to_string(), ModelPricing { input: 2.5, output: 10.0 }),
        ]);
        let pricing = table.resolve("GPT-4o-mini-2024").unwrap();
        assert!((pricing.output - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_model_costs_nothing() {
        let mut tracker = CostTracker::new();
        assert!(tracker.add_usage(1_000_000, 1_000_000, "mystery-model").abs() < f64::EPSILON);
        assert_eq!(tracker.total_input_tokens(), 1_000_000);
    }

    #[test]
    fn test_add_usage_accumulates() {
        let mut tracker = CostTracker::new();
        // 10K * 3 / 1M + 5K * 15 / 1M = 0.03 + 0.075
        tracker.add_usage(10_000, 5_000, "claude-sonnet-4-5");
        tracker.add_usage(10_000, 5_000, "claude-sonnet-4-5");
        assert!((tracker.estimated_cost() - 0.21).abs() < 1e-9);
    }

    #[test]
    fn test_restore_keeps_accrued_total() {
        let mut tracker = CostTracker::new();
        tracker.restore(1.25);
        tracker.add_usage(1_000_000, 0, "claude-haiku-4-5");
        assert!((tracker.estimated_cost() - 2.05).abs() < 1e-9);
    }

    #[test]
    fn test_with_rate_overrides() {
        let table = PricingTable::default().with_rate("claude-sonnet-4", ModelPricing::ZERO);
        assert_eq!(table.resolve("claude-sonnet-4-5"), Some(ModelPricing::ZERO));
    }

    #[test]
    fn test_with_pricing_uses_custom_table() {
        let table = PricingTable::new(vec![(
            "local-llama".to_string(),
            ModelPricing { input: 1.0, output: 2.0 },
        )]);
        let mut tracker = CostTracker::with_pricing(table);

        let added = tracker.add_usage(1_000_000, 500_000, "local-llama-3-8b");
        assert!((added - 2.0).abs() < 1e-9);
        // The default table is replaced, not extended.
        assert!(tracker.add_usage(1_000_000, 0, "gpt-4o").abs() < f64::EPSILON);
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("abcd"), 1);
    }

    #[test]
    fn test_format_summary_lists_models() {
        let mut tracker = CostTracker::new();
        tracker.add_usage(10_000, 5_000, "claude-opus-4-6");
        tracker.add_usage(10_000, 5_000, "gpt-4o");
        assert!(tracker.format_summary().contains("By model:"));
    }
}
