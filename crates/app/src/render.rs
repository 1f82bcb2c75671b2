//! Plain-text rendering of service views for the terminal.

use std::fmt::Write as _;

use services::{CompletionReport, GraphRow, GraphView, LearnerStats, NextTopic};
use skill_core::{NodeState, ProgressSummary, VisibleKind};

const INDENT: &str = "  ";

fn state_marker(state: Option<NodeState>) -> &'static str {
    match state {
        Some(NodeState::Completed) => "[x]",
        Some(NodeState::Available) => "[ ]",
        Some(NodeState::Locked) => "[-]",
        None => "",
    }
}

fn fold_marker(row: &GraphRow) -> &'static str {
    match (row.kind, row.expanded) {
        (VisibleKind::Topic, _) => "",
        (_, true) => "v ",
        (_, false) => "> ",
    }
}

fn summary_suffix(summary: &ProgressSummary) -> String {
    format!("{}/{} ({}%)", summary.completed, summary.total, summary.percentage)
}

/// One line per visible row, indented by depth.
#[must_use]
pub fn graph(view: &GraphView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} - {}",
        view.title,
        summary_suffix(&view.overall)
    );
    for row in &view.rows {
        let indent = INDENT.repeat(row.depth + 1);
        let mut line = format!("{indent}{}", fold_marker(row));
        let marker = state_marker(row.state);
        if !marker.is_empty() {
            line.push_str(marker);
            line.push(' ');
        }
        line.push_str(&row.name);
        if let Some(points) = row.points.filter(|p| *p > 0) {
            let _ = write!(line, " +{points}");
        }
        if let Some(summary) = &row.summary {
            let _ = write!(line, "  {}", summary_suffix(summary));
        }
        let _ = write!(line, "  <{}>", row.id);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.push_str(&learner(&view.learner));
    out
}

#[must_use]
pub fn learner(stats: &LearnerStats) -> String {
    let mut out = format!(
        "level {} | {} points ({} to next) | streak {}",
        stats.level, stats.points, stats.points_to_next_level, stats.streak
    );
    if let Some(day) = stats.last_active_on {
        let _ = write!(out, " | last active {day}");
    }
    out.push('\n');
    out
}

/// Learner counters followed by per-category progress.
#[must_use]
pub fn stats(view: &GraphView) -> String {
    let mut out = learner(&view.learner);
    let _ = writeln!(out, "overall {}", summary_suffix(&view.overall));
    for category in &view.categories {
        let _ = writeln!(
            out,
            "{}{}  {}",
            INDENT.repeat(category.depth + 1),
            category.name,
            summary_suffix(&category.summary)
        );
    }
    out
}

#[must_use]
pub fn next_topics(topics: &[NextTopic]) -> String {
    if topics.is_empty() {
        return "nothing to start: every reachable topic is completed\n".to_owned();
    }
    let mut out = String::new();
    for topic in topics {
        let _ = writeln!(
            out,
            "{INDENT}{} <{}>  difficulty {} +{}",
            topic.name, topic.id, topic.difficulty, topic.points
        );
    }
    out
}

#[must_use]
pub fn completion(report: &CompletionReport) -> String {
    if report.already_completed {
        return format!("{} was already completed\n", report.topic_id);
    }
    let mut out = format!("completed {} (+{})\n", report.topic_id, report.points_awarded);
    if report.leveled_up {
        let _ = writeln!(out, "level up! now level {}", report.learner.level);
    }
    if !report.newly_available.is_empty() {
        out.push_str("unlocked:\n");
        out.push_str(&next_topics(&report.newly_available));
    }
    out.push_str(&learner(&report.learner));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use skill_core::model::{TopicId, UserId};

    fn stats_for(points: u32, level: u32) -> LearnerStats {
        LearnerStats {
            user_id: UserId::new(1),
            points,
            level,
            streak: 0,
            last_active_on: None,
            points_to_next_level: level * 100 - points,
        }
    }

    fn row(id: &str, depth: usize, kind: VisibleKind, state: Option<NodeState>) -> GraphRow {
        GraphRow {
            id: id.to_owned(),
            name: id.to_uppercase(),
            depth,
            kind,
            expanded: kind != VisibleKind::Topic,
            state,
            summary: (kind != VisibleKind::Topic).then(|| ProgressSummary::from_counts(2, 1)),
            points: state.map(|_| 10),
            color: None,
        }
    }

    #[test]
    fn graph_indents_rows_and_marks_state() {
        let view = GraphView {
            title: "Web".into(),
            curriculum_revision: 1,
            rows: vec![
                row("front", 0, VisibleKind::Category, None),
                row("html", 1, VisibleKind::Topic, Some(NodeState::Completed)),
                row("css", 1, VisibleKind::Topic, Some(NodeState::Locked)),
            ],
            overall: ProgressSummary::from_counts(2, 1),
            categories: Vec::new(),
            learner: stats_for(10, 1),
        };

        let text = graph(&view);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Web - 1/2 (50%)");
        assert_eq!(lines[1], "  v FRONT  1/2 (50%)  <front>");
        assert_eq!(lines[2], "    [x] HTML +10  <html>");
        assert_eq!(lines[3], "    [-] CSS +10  <css>");
        assert!(lines[4].starts_with("level 1 | 10 points (90 to next)"));
    }

    #[test]
    fn completion_lists_unlocks() {
        let report = CompletionReport {
            topic_id: TopicId::new("html").unwrap(),
            already_completed: false,
            points_awarded: 30,
            leveled_up: false,
            learner: stats_for(30, 1),
            newly_available: vec![NextTopic {
                id: TopicId::new("css").unwrap(),
                name: "CSS".into(),
                difficulty: 2,
                points: 40,
            }],
        };
        let text = completion(&report);
        assert!(text.starts_with("completed html (+30)\nunlocked:\n  CSS <css>"));
    }

    #[test]
    fn empty_next_list_says_so() {
        assert!(next_topics(&[]).starts_with("nothing to start"));
    }
}
