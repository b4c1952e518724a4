//! Terminal rendering of reports, failures and memory history

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use research_agent::{PartialResults, ResearchReport, RunFailure};
use research_core::{
    AgentAnalysis, DataSnapshot, MemoryEntry, QualityAssessment, SnapshotStatus, WorkflowResult,
};

const CELL_WIDTH: usize = 80;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

fn status_label(status: SnapshotStatus) -> &'static str {
    match status {
        SnapshotStatus::Ok => "ok",
        SnapshotStatus::Unavailable => "unavailable",
        SnapshotStatus::Error => "error",
    }
}

fn snapshot_table(snapshots: &[DataSnapshot]) -> Table {
    let mut t = table(&["Source", "Status", "Attempts", "Detail"]);
    for s in snapshots {
        t.add_row(vec![
            s.source.to_string(),
            status_label(s.status).to_string(),
            s.attempts.to_string(),
            truncate(s.detail.as_deref().unwrap_or("-"), CELL_WIDTH),
        ]);
    }
    t
}

fn analysis_table(analyses: &[AgentAnalysis]) -> Table {
    let mut t = table(&["Specialist", "Status", "Confidence", "Lead finding"]);
    for a in analyses {
        let (status, lead) = match a.invalid_reason() {
            None => (
                "valid",
                a.findings.first().map_or("-", String::as_str).to_string(),
            ),
            Some(reason) => ("invalid", reason.to_string()),
        };
        t.add_row(vec![
            a.agent_role.to_string(),
            status.to_string(),
            format!("{:.2}", a.confidence),
            truncate(&lead, CELL_WIDTH),
        ]);
    }
    t
}

fn workflow_outcome(workflow: &WorkflowResult) -> String {
    match workflow {
        WorkflowResult::Chain(chain) if chain.completed => "all stages completed".to_string(),
        WorkflowResult::Chain(chain) => format!(
            "aborted at {}: {}",
            chain.furthest_stage.name(),
            chain.failure.as_deref().unwrap_or("unknown failure")
        ),
        WorkflowResult::Routing(routing) => match &routing.anomaly {
            None => format!("routed to {}", routing.selected_role),
            Some(anomaly) => format!("defaulted to {} ({anomaly})", routing.selected_role),
        },
        WorkflowResult::EvalOpt(eval) => format!(
            "best {:.2} at iteration {} of {}{}",
            eval.best_score,
            eval.best_iteration,
            eval.iterations.len(),
            if eval.accepted { ", accepted" } else { "" }
        ),
    }
}

fn workflow_table(workflows: &[WorkflowResult]) -> Table {
    let mut t = table(&["Workflow", "Outcome", "Time"]);
    for w in workflows {
        t.add_row(vec![
            w.pattern().to_string(),
            truncate(&workflow_outcome(w), CELL_WIDTH),
            format!("{} ms", w.elapsed_ms()),
        ]);
    }
    t
}

fn quality_table(quality: &QualityAssessment) -> Table {
    let mut t = table(&["Strengths", "Weaknesses", "Improvements"]);
    let rows = quality
        .strengths
        .len()
        .max(quality.weaknesses.len())
        .max(quality.suggested_improvements.len());
    let cell = |items: &[String], i: usize| {
        items
            .get(i)
            .map(|s| truncate(s, CELL_WIDTH / 2))
            .unwrap_or_default()
    };
    for i in 0..rows {
        t.add_row(vec![
            cell(&quality.strengths, i),
            cell(&quality.weaknesses, i),
            cell(&quality.suggested_improvements, i),
        ]);
    }
    t
}

/// Full report, headed by the overall quality score
pub fn report_text(report: &ResearchReport) -> String {
    let mut out = format!(
        "Overall quality score: {:.2}{}\nTopic: {}\nRun: {} ({} ms)\n",
        report.overall_quality_score(),
        if report.quality.degraded { " (degraded)" } else { "" },
        report.topic,
        report.run_id,
        report.duration().num_milliseconds(),
    );
    if !report.plan.objectives.is_empty() {
        out.push_str("\nObjectives:\n");
        for objective in &report.plan.objectives {
            out.push_str(&format!("  - {objective}\n"));
        }
    }
    out.push_str(&format!("\n{}\n", snapshot_table(&report.snapshots)));
    out.push_str(&format!("\n{}\n", analysis_table(&report.analyses)));
    out.push_str(&format!("\n{}\n", workflow_table(&report.workflows)));
    out.push_str(&format!("\n{}\n", quality_table(&report.quality)));
    out.push_str(&format!("\n{}\n", report.final_artifact()));
    out
}

fn partial_text(partial: &PartialResults) -> String {
    let mut out = String::new();
    match &partial.plan {
        Some(plan) => out.push_str(&format!(
            "Plan: {} objectives, {} steps\n",
            plan.objectives.len(),
            plan.steps.len()
        )),
        None => out.push_str("Plan: not created\n"),
    }
    if !partial.snapshots.is_empty() {
        out.push_str(&format!("\n{}\n", snapshot_table(&partial.snapshots)));
    }
    if !partial.analyses.is_empty() {
        out.push_str(&format!("\n{}\n", analysis_table(&partial.analyses)));
    }
    if !partial.workflows.is_empty() {
        out.push_str(&format!("\n{}\n", workflow_table(&partial.workflows)));
    }
    out
}

/// Failure reason followed by whatever the run gathered
pub fn failure_text(failure: &RunFailure) -> String {
    format!(
        "Research run failed ({}): {}\nRun: {}\n\nPartial results\n{}",
        failure.kind(),
        failure.error,
        failure.run_id,
        partial_text(&failure.partial)
    )
}

/// Recalled memory entries, most recent first
pub fn history_text(topic: &str, entries: &[MemoryEntry]) -> String {
    if entries.is_empty() {
        return format!("No previous research on '{topic}'\n");
    }
    let mut t = table(&["Recorded", "Score", "Run", "Insights"]);
    for e in entries {
        t.add_row(vec![
            e.created_at.format("%Y-%m-%d %H:%M").to_string(),
            format!("{:.2}", e.quality_score),
            e.run_id.to_string(),
            truncate(&e.insights.join("; "), CELL_WIDTH),
        ]);
    }
    let average = entries.iter().map(|e| e.quality_score).sum::<f64>() / entries.len() as f64;
    format!(
        "{} previous runs on '{topic}', average quality {average:.2}\n\n{t}\n",
        entries.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::{AgentRole, ResearchError, RoutingResult};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_workflow_outcome() {
        let routing = WorkflowResult::Routing(RoutingResult {
            query: "q".to_string(),
            selected_role: AgentRole::Market,
            rationale: "r".to_string(),
            anomaly: Some("unknown role".to_string()),
            artifact: "a".to_string(),
            elapsed_ms: 1250,
        });
        assert_eq!(
            workflow_outcome(&routing),
            "defaulted to Market (unknown role)"
        );
        assert!(workflow_table(std::slice::from_ref(&routing))
            .to_string()
            .contains("1250 ms"));
    }

    #[test]
    fn test_history_text() {
        assert_eq!(history_text("AAPL", &[]), "No previous research on 'AAPL'\n");

        let entries = vec![
            MemoryEntry::new(Uuid::new_v4(), "AAPL", vec!["peers".to_string()], 0.6),
            MemoryEntry::new(Uuid::new_v4(), "AAPL", vec![], 0.8),
        ];
        let text = history_text("AAPL", &entries);
        assert!(text.starts_with("2 previous runs on 'AAPL', average quality 0.70"));
        assert!(text.contains("peers"));
    }

    #[test]
    fn test_failure_text_lists_partial_results() {
        let failure = RunFailure {
            run_id: Uuid::new_v4(),
            topic: "AAPL".to_string(),
            error: ResearchError::Planning("no plan".to_string()),
            partial: PartialResults {
                analyses: vec![AgentAnalysis::invalid(
                    AgentRole::Fundamentals,
                    "no data",
                    BTreeSet::new(),
                )],
                ..PartialResults::default()
            },
        };

        let text = failure_text(&failure);
        assert!(text.starts_with("Research run failed (planning_failure)"));
        assert!(text.contains("Plan: not created"));
        assert!(text.contains("invalid"));
    }
}
