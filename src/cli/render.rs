// src/cli/render.rs

//! Draws the plan window and the log tail as plain terminal text.

use colored::*;
use std::ops::Range;

use crate::{
    core::paths,
    models::{CommandStatus, Plan, PlanIndex},
    state::{AppState, Focus},
};

/// The rows visible in a window of `height` rows, keeping `highlight` near the middle.
pub fn visible_rows(len: usize, highlight: usize, height: usize) -> Range<usize> {
    if len <= height {
        return 0..len;
    }
    let start = highlight.saturating_sub(height / 2).min(len - height);
    start..start + height
}

/// One plan row without styling: `  12 [x] ✔ command`.
pub fn row_text(plan: &Plan, index: &PlanIndex, position: usize) -> String {
    let text = plan.get(position).map(|row| row.text.as_str()).unwrap_or_default();
    if plan.is_comment(position) {
        return format!("{:>4}       {}", position + 1, text);
    }
    let mark = if index.is_selected(position) { "[x]" } else { "[ ]" };
    format!(
        "{:>4} {} {} {}",
        position + 1,
        mark,
        index.status(position).glyph(),
        text
    )
}

fn styled_row(state: &AppState, position: usize) -> String {
    let text = row_text(state.plan(), state.index(), position);
    let styled = if state.plan().is_comment(position) {
        text.green().dimmed()
    } else {
        match state.index().status(position) {
            CommandStatus::Success => text.normal(),
            CommandStatus::Failed => text.red(),
            CommandStatus::Pending => text.normal(),
        }
    };
    if position == state.highlight && state.focus == Focus::Preview {
        styled.reversed().to_string()
    } else {
        styled.to_string()
    }
}

/// The log lines to show, newest first, starting `offset` lines from the newest.
pub fn log_tail(lines: &[String], offset: usize, height: usize) -> Vec<&str> {
    lines
        .iter()
        .rev()
        .skip(offset)
        .take(height)
        .map(String::as_str)
        .collect()
}

/// Renders the whole screen: title, plan window, log tail.
pub fn render_screen(
    state: &AppState,
    log_lines: &[String],
    log_name: &str,
    plan_height: usize,
    log_height: usize,
) -> String {
    let mut out = Vec::new();
    out.push(t!("render.title").bold().to_string());

    let plan = state.plan();
    if plan.is_empty() {
        out.push(t!("render.no_commands").yellow().to_string());
    } else {
        out.push(
            t!("render.row_counter")
                .replace("{plan}", &paths::display_path(&plan.source))
                .replace("{row}", &(state.highlight + 1).to_string())
                .replace("{total}", &plan.len().to_string())
                .cyan()
                .to_string(),
        );
        for position in visible_rows(plan.len(), state.highlight, plan_height) {
            out.push(styled_row(state, position));
        }
    }

    out.push(String::new());
    let log_position = if log_lines.is_empty() {
        0
    } else {
        state.log_scroll_offset + 1
    };
    out.push(
        t!("render.log_counter")
            .replace("{log}", log_name)
            .replace("{row}", &log_position.to_string())
            .replace("{total}", &log_lines.len().to_string())
            .cyan()
            .to_string(),
    );
    if state.focus == Focus::Log {
        out.push(t!("render.focus_log").dimmed().to_string());
    }
    for line in log_tail(log_lines, state.log_scroll_offset, log_height) {
        if line.starts_with("ERROR:") {
            out.push(line.red().to_string());
        } else {
            out.push(line.to_string());
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{index_manager::reconcile, selection};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_visible_rows_follow_the_highlight() {
        assert_eq!(visible_rows(3, 2, 10), 0..3);
        assert_eq!(visible_rows(100, 0, 10), 0..10);
        assert_eq!(visible_rows(100, 50, 10), 45..55);
        assert_eq!(visible_rows(100, 99, 10), 90..100);
        assert_eq!(visible_rows(0, 0, 10), 0..0);
    }

    #[test]
    fn test_row_text_shows_selection_and_status() {
        let plan = Plan::from_lines("plan.sh", ["# setup", "echo A", "echo B"]);
        let mut index = PlanIndex::default();
        reconcile(&mut index, &plan);
        selection::toggle(&plan, &mut index, 1);
        index.get_mut(2).unwrap().status = CommandStatus::Failed;

        assert_eq!(row_text(&plan, &index, 0), "   1       # setup");
        assert_eq!(row_text(&plan, &index, 1), "   2 [x] ⌛ echo A");
        assert_eq!(row_text(&plan, &index, 2), "   3 [ ] ✖ echo B");
    }

    #[test]
    fn test_log_tail_is_newest_first() {
        let lines: Vec<String> = ["one", "two", "three", "four"]
            .iter()
            .map(|line| line.to_string())
            .collect();

        assert_eq!(log_tail(&lines, 0, 2), vec!["four", "three"]);
        assert_eq!(log_tail(&lines, 3, 2), vec!["one"]);
        assert!(log_tail(&lines, 10, 2).is_empty());
    }
}
