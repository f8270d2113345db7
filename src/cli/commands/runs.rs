//! `evoprompt runs` commands: list and show stored runs.

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::Cell;
use serde::Serialize;

use crate::cli::commands::engine::open_store;
use crate::cli::output::{
    colorize_status, format_score, label, list_table, output, render_list, section_header,
    truncate, CommandOutput,
};
use crate::domain::models::{
    AdversarialRecord, Config, OptimizationRun, RunSummary, ValidationReport,
    CROSS_VALIDATION_KEY,
};
use crate::domain::ports::RunStore;

#[derive(Args, Debug)]
pub struct RunsArgs {
    #[command(subcommand)]
    pub command: RunsCommands,
}

#[derive(Subcommand, Debug)]
pub enum RunsCommands {
    /// List stored runs, most recently updated first
    List {
        /// Maximum number of runs to display
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show one run in detail
    Show {
        /// Run ID or unique prefix
        id: String,
    },
}

#[derive(Debug, Serialize)]
pub struct RunListOutput {
    pub runs: Vec<RunSummary>,
    pub total: usize,
}

impl CommandOutput for RunListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "updated", "gens", "best", "model", "status"]);
        for run in &self.runs {
            table.add_row(vec![
                Cell::new(&run.id.to_string()[..8]),
                Cell::new(run.updated_at.format("%Y-%m-%d %H:%M").to_string()),
                Cell::new(run.generation_count),
                Cell::new(format_score(run.best_score)),
                Cell::new(truncate(&run.model, 28)),
                Cell::new(colorize_status(run.status.as_str())),
            ]);
        }
        render_list("run", &table, self.total)
    }
}

/// Full view of a run, shared by `run`, `resume` and `runs show`.
#[derive(Debug, Serialize)]
pub struct RunDetailOutput {
    pub id: String,
    pub status: String,
    pub termination: Option<String>,
    pub model: String,
    pub generations: usize,
    pub candidates: usize,
    pub best_score: Option<f64>,
    pub best_candidate_id: Option<String>,
    pub best_origin: Option<String>,
    pub best_text: Option<String>,
    pub score_history: Vec<f64>,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    pub adversarial: Vec<AdversarialRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_summary: Option<String>,
}

impl RunDetailOutput {
    pub fn from_run(run: &OptimizationRun) -> Self {
        let best = run.best();
        let validation = best
            .and_then(|b| b.metadata.get(CROSS_VALIDATION_KEY))
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        Self {
            id: run.id.to_string(),
            status: run.status.as_str().to_string(),
            termination: run.termination.map(|t| t.as_str().to_string()),
            model: run.config.model.clone(),
            generations: run.generations.len(),
            candidates: run.candidates().count(),
            best_score: run.best_score(),
            best_candidate_id: best.map(|b| b.id.to_string()),
            best_origin: best.map(|b| b.origin.clone()),
            best_text: best.map(|b| b.text.clone()),
            score_history: run.best_score_history(),
            total_cost: run.total_cost,
            validation,
            adversarial: run.adversarial_log.clone(),
            cost_summary: None,
        }
    }

    /// Attach the tracker's summary of spend accrued in this session.
    pub fn with_cost_summary(mut self, summary: String) -> Self {
        self.cost_summary = Some(summary);
        self
    }
}

impl CommandOutput for RunDetailOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("{} {}", label("Run"), self.id),
            format!("{} {}", label("Status"), colorize_status(&self.status)),
        ];
        if let Some(reason) = &self.termination {
            lines.push(format!("{} {reason}", label("Stopped")));
        }
        lines.push(format!("{} {}", label("Model"), self.model));
        lines.push(format!(
            "{} {} ({} candidates)",
            label("Generations"),
            self.generations,
            self.candidates
        ));
        lines.push(format!("{} {}", label("Best score"), format_score(self.best_score)));
        lines.push(format!("{} ${:.4}", label("Estimated cost"), self.total_cost));
        if let Some(summary) = &self.cost_summary {
            lines.push(summary.clone());
        }

        if !self.score_history.is_empty() {
            let history: Vec<String> = self
                .score_history
                .iter()
                .map(|s| format_score(Some(*s)))
                .collect();
            lines.push(format!("{} {}", label("Progress"), history.join(" > ")));
        }

        if let Some(report) = &self.validation {
            lines.push(section_header("Cross-provider validation"));
            for detail in &report.details {
                let status = match &detail.error {
                    Some(err) => format!("failed: {err}"),
                    None => format!("{}/{} passed", detail.passed, detail.total),
                };
                lines.push(format!(
                    "  {:<32} {:>6}  {status}",
                    detail.target,
                    format_score(Some(detail.score))
                ));
            }
            if report.is_overfit() {
                lines.push(format!(
                    "  possible overfitting on: {}",
                    report.overfit_targets.join(", ")
                ));
            }
        }

        if !self.adversarial.is_empty() {
            lines.push(section_header("Adversarial probes"));
            for record in &self.adversarial {
                lines.push(format!(
                    "  generation {:<3} {:>6} over {} case(s)",
                    record.generation,
                    format_score(Some(record.score)),
                    record.case_count
                ));
            }
        }

        if let Some(text) = &self.best_text {
            let origin = self.best_origin.as_deref().unwrap_or("unknown");
            lines.push(section_header(&format!("Best prompt ({origin})")));
            lines.push(text.clone());
        }

        lines.join("\n")
    }
}

pub async fn execute(args: RunsArgs, config: &Config, json_mode: bool) -> Result<()> {
    let store = open_store(config).await?;

    match args.command {
        RunsCommands::List { limit } => {
            let mut runs = store.list().await?;
            runs.truncate(limit);
            let total = runs.len();
            output(&RunListOutput { runs, total }, json_mode);
        }
        RunsCommands::Show { id } => {
            let run = store.load_by_prefix(&id).await?;
            output(&RunDetailOutput::from_run(&run), json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Candidate, EvaluationResult, OptimizationConfig};

    #[test]
    fn test_detail_from_run() {
        let mut run = OptimizationRun::new(OptimizationConfig::default());
        run.open_generation();
        let mut baseline = Candidate::baseline("Be helpful.");
        baseline
            .record_evaluation(EvaluationResult::from_counts(2, 1, 0, 5.0, vec![]))
            .unwrap();
        run.best_candidate_id = Some(baseline.id);
        run.push_candidate(baseline).unwrap();

        let detail = RunDetailOutput::from_run(&run);
        assert_eq!(detail.best_score, Some(0.5));
        assert_eq!(detail.best_text.as_deref(), Some("Be helpful."));
        assert_eq!(detail.score_history, vec![0.5]);
        assert!(detail.validation.is_none());
        assert!(detail.to_human().contains("Be helpful."));
    }
}
