//! Terminal observer: progress bar, per-candidate lines and the interactive
//! human gate.

use async_trait::async_trait;
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::BufRead;
use std::time::Duration;

use crate::cli::output::{format_score, truncate};
use crate::domain::models::{AdversarialRecord, Candidate, EvaluationResult, TerminationReason};
use crate::domain::ports::{EvolutionObserver, HumanResponse};

const PROGRESS_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] generation {pos}/{len} {msg}";

/// Prefix that turns a human gate answer into director feedback.
pub const FEEDBACK_PREFIX: &str = "feedback:";

/// Prints progress to stderr. In quiet mode (JSON output) it stays silent
/// and never prompts.
pub struct ConsoleObserver {
    progress: ProgressBar,
    quiet: bool,
    interactive: bool,
}

impl ConsoleObserver {
    pub fn new(max_generations: u32, quiet: bool, interactive: bool) -> Self {
        let progress = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::with_draw_target(
                Some(u64::from(max_generations)),
                ProgressDrawTarget::stderr(),
            );
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(PROGRESS_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        };

        Self {
            progress,
            quiet,
            interactive: interactive && !quiet,
        }
    }

    fn note(&self, line: String) {
        if self.quiet {
            return;
        }
        if self.progress.is_hidden() {
            eprintln!("{line}");
        } else {
            self.progress.println(line);
        }
    }
}

#[async_trait]
impl EvolutionObserver for ConsoleObserver {
    async fn on_run_start(&self, initial_text: &str, target_score: f64) {
        self.note(format!(
            "{} {} (target {})",
            style("Optimizing").cyan().bold(),
            truncate(initial_text, 60),
            format_score(Some(target_score))
        ));
    }

    async fn on_generation_start(&self, generation: u32) {
        self.progress.set_position(u64::from(generation));
    }

    async fn on_candidate_evaluated(&self, candidate: &Candidate, result: &EvaluationResult) {
        let score = format_score(Some(result.score));
        let score = if result.is_unusable() {
            style(score).red().to_string()
        } else {
            score
        };
        self.note(format!(
            "  g{:<3} {} {:<26} {:>6}  {}/{} passed",
            candidate.generation,
            style(candidate.short_id()).dim(),
            candidate.origin,
            score,
            result.passed,
            result.total
        ));
    }

    async fn on_new_best(&self, candidate: &Candidate, score: f64) {
        let best = format_score(Some(score));
        self.progress.set_message(format!("best {best}"));
        self.note(format!(
            "  {} {} via {}",
            style("new best").green().bold(),
            best,
            candidate.origin
        ));
    }

    async fn on_adversarial_result(&self, record: &AdversarialRecord) {
        self.note(format!(
            "  {} {} over {} probe(s)",
            style("adversarial").magenta(),
            format_score(Some(record.score)),
            record.case_count
        ));
    }

    async fn on_run_complete(&self, best: &Candidate, reason: TerminationReason) {
        self.progress.finish_and_clear();
        self.note(format!(
            "{} {} with best {}",
            style("Finished:").bold(),
            reason,
            format_score(best.score())
        ));
    }

    async fn request_human_input(&self, best: &Candidate, generation: u32) -> HumanResponse {
        if !self.interactive {
            return HumanResponse::Skip;
        }

        self.progress.disable_steady_tick();
        self.progress.suspend(|| {
            eprintln!();
            eprintln!(
                "{} after generation {generation} (best {})",
                style("Human gate").yellow().bold(),
                format_score(best.score())
            );
            eprintln!("{}", style("Current best prompt:").bold());
            eprintln!("{}", best.text);
            eprintln!();
            eprintln!("Enter a replacement prompt, or '{FEEDBACK_PREFIX} <notes>' for director feedback.");
            eprintln!("Finish with an empty line. An empty first line skips.");
        });

        let input = tokio::task::spawn_blocking(read_block)
            .await
            .unwrap_or_default();

        self.progress.enable_steady_tick(Duration::from_millis(120));
        parse_human_input(&input)
    }
}

/// Read lines from stdin until an empty line or end of input.
fn read_block() -> String {
    let stdin = std::io::stdin();
    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            break;
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Map terminal input to a gate response.
pub fn parse_human_input(input: &str) -> HumanResponse {
    let trimmed = input.trim();
    let prefix_len = FEEDBACK_PREFIX.len();
    if trimmed
        .get(..prefix_len)
        .is_some_and(|p| p.eq_ignore_ascii_case(FEEDBACK_PREFIX))
    {
        let feedback = trimmed[prefix_len..].trim();
        if feedback.is_empty() {
            return HumanResponse::Skip;
        }
        return HumanResponse::Feedback(feedback.to_string());
    }
    HumanResponse::from_text(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_human_input() {
        assert_eq!(parse_human_input("   "), HumanResponse::Skip);
        assert_eq!(
            parse_human_input("Answer in French."),
            HumanResponse::Edit("Answer in French.".to_string())
        );
        assert_eq!(
            parse_human_input("Feedback: be warmer"),
            HumanResponse::Feedback("be warmer".to_string())
        );
        assert_eq!(parse_human_input("feedback:   "), HumanResponse::Skip);
    }

    #[tokio::test]
    async fn test_quiet_observer_never_prompts() {
        let observer = ConsoleObserver::new(3, true, true);
        let best = Candidate::baseline("p");
        assert_eq!(observer.request_human_input(&best, 1).await, HumanResponse::Skip);
    }
}
