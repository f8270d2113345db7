use evoprompt::domain::models::EvaluationResult;
use evoprompt::services::cost_tracker::estimate_tokens;
use evoprompt::services::{BuiltinStrategy, Mutator};
use proptest::prelude::*;

fn strategy_subset() -> impl Strategy<Value = Vec<String>> {
    proptest::sample::subsequence(BuiltinStrategy::ALL.to_vec(), 1..=BuiltinStrategy::ALL.len())
        .prop_shuffle()
        .prop_map(|strategies| strategies.iter().map(|s| s.name().to_string()).collect())
}

proptest! {
    /// Property: output slot i always gets strategy i mod k.
    #[test]
    fn prop_assignment_is_round_robin(names in strategy_subset(), count in 0usize..40) {
        let mutator = Mutator::new(None);
        let assigned = mutator.assign(&names, count);

        prop_assert_eq!(assigned.len(), count);
        for (i, strategy) in assigned.iter().enumerate() {
            prop_assert_eq!(strategy.name(), names[i % names.len()].as_str());
        }
    }

    /// Property: no strategy gets more than one slot more than another.
    #[test]
    fn prop_assignment_is_balanced(names in strategy_subset(), count in 1usize..40) {
        let mutator = Mutator::new(None);
        let assigned = mutator.assign(&names, count);

        let counts: Vec<usize> = names
            .iter()
            .map(|n| assigned.iter().filter(|s| s.name() == n.as_str()).count())
            .collect();
        let max = counts.iter().copied().max().unwrap_or(0);
        let min = counts.iter().copied().min().unwrap_or(0);
        prop_assert!(max - min <= 1);
    }

    /// Property: scores stay in [0, 1] and the case counts add up.
    #[test]
    fn prop_score_bounded(total in 0u32..50, passed_frac in 0.0f64..=1.0, error_frac in 0.0f64..=1.0) {
        let passed = (f64::from(total) * passed_frac) as u32;
        let errors = (f64::from(total - passed) * error_frac) as u32;
        let result = EvaluationResult::from_counts(total, passed, errors, 0.0, vec![]);

        prop_assert!((0.0..=1.0).contains(&result.score));
        prop_assert_eq!(result.passed + result.failed + result.errors, total);
    }

    /// Property: token estimate is ceil(chars / 4).
    #[test]
    fn prop_token_estimate(text in ".{0,200}") {
        let chars = text.chars().count() as u64;
        prop_assert_eq!(estimate_tokens(&text), chars.div_ceil(4));
    }
}
