// src/core/selection.rs

//! Mutations of the `selected` flag. This module is the only writer of that flag, and it
//! never selects a comment row.

use crate::models::{CommandStatus, Plan, PlanIndex};

/// Flips the selection of one row. Comment rows and positions outside the plan are ignored.
///
/// Returns `true` when the row was toggled.
pub fn toggle(plan: &Plan, index: &mut PlanIndex, position: usize) -> bool {
    if plan.is_comment(position) {
        return false;
    }
    match index.get_mut(position) {
        Some(entry) => {
            entry.selected = !entry.selected;
            true
        }
        None => false,
    }
}

/// Selects every non-comment row.
pub fn select_all(plan: &Plan, index: &mut PlanIndex) {
    select_where(plan, index, |_| true);
}

/// Clears the selection of every row, comments included.
pub fn select_none(index: &mut PlanIndex) {
    for position in 0..index.len() {
        if let Some(entry) = index.get_mut(position) {
            entry.selected = false;
        }
    }
}

/// Replaces the selection with the pending rows.
pub fn select_pending(plan: &Plan, index: &mut PlanIndex) {
    select_where(plan, index, |status| status == CommandStatus::Pending);
}

/// Replaces the selection with the failed rows.
pub fn select_failed(plan: &Plan, index: &mut PlanIndex) {
    select_where(plan, index, |status| status == CommandStatus::Failed);
}

/// Selects the pending rows of the block starting at `from`.
///
/// The block ends right before the first comment row or at the end of the plan. Rows in
/// the block that are not pending keep their current selection.
pub fn select_block(plan: &Plan, index: &mut PlanIndex, from: usize) {
    for position in from..plan.len() {
        if plan.is_comment(position) {
            break;
        }
        if let Some(entry) = index.get_mut(position) {
            if entry.status == CommandStatus::Pending {
                entry.selected = true;
            }
        }
    }
}

/// Sets `selected = predicate(status)` for non-comment rows and clears comment rows.
fn select_where(plan: &Plan, index: &mut PlanIndex, predicate: impl Fn(CommandStatus) -> bool) {
    for position in 0..plan.len() {
        let is_comment = plan.is_comment(position);
        if let Some(entry) = index.get_mut(position) {
            entry.selected = !is_comment && predicate(entry.status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::index_manager::reconcile;

    fn fixture(lines: &[&str]) -> (Plan, PlanIndex) {
        let plan = Plan::from_lines("plan.sh", lines.iter().copied());
        let mut index = PlanIndex::default();
        reconcile(&mut index, &plan);
        (plan, index)
    }

    fn selected(index: &PlanIndex) -> Vec<usize> {
        index.selected_positions()
    }

    #[test]
    fn test_toggle_flips_one_row_and_skips_comments() {
        let (plan, mut index) = fixture(&["echo A", "# note", "echo B"]);

        assert!(toggle(&plan, &mut index, 0));
        assert!(!toggle(&plan, &mut index, 1));
        assert!(!toggle(&plan, &mut index, 7));
        assert_eq!(selected(&index), vec![0]);

        assert!(toggle(&plan, &mut index, 0));
        assert!(selected(&index).is_empty());
    }

    #[test]
    fn test_select_all_then_none() {
        let (plan, mut index) = fixture(&["echo A", "# note", "echo B"]);

        select_all(&plan, &mut index);
        assert_eq!(selected(&index), vec![0, 2]);

        select_none(&mut index);
        assert!(selected(&index).is_empty());
    }

    #[test]
    fn test_select_pending_replaces_selection() {
        let (plan, mut index) = fixture(&["a", "b", "# note", "c"]);
        index.get_mut(0).unwrap().status = CommandStatus::Success;
        index.get_mut(1).unwrap().status = CommandStatus::Failed;
        index.get_mut(0).unwrap().selected = true;

        select_pending(&plan, &mut index);

        assert_eq!(selected(&index), vec![3]);
        for (position, entry) in index.iter() {
            if entry.selected {
                assert_eq!(index.status(position), CommandStatus::Pending);
            }
        }
    }

    #[test]
    fn test_select_failed_replaces_selection() {
        let (plan, mut index) = fixture(&["a", "b", "c"]);
        index.get_mut(1).unwrap().status = CommandStatus::Failed;
        index.get_mut(2).unwrap().selected = true;

        select_failed(&plan, &mut index);

        assert_eq!(selected(&index), vec![1]);
    }

    #[test]
    fn test_select_block_stops_at_comment_and_keeps_done_rows() {
        let (plan, mut index) = fixture(&["a", "b", "c", "# next section", "d"]);
        index.get_mut(2).unwrap().status = CommandStatus::Success;
        index.get_mut(2).unwrap().selected = true;
        index.get_mut(1).unwrap().status = CommandStatus::Failed;

        select_block(&plan, &mut index, 0);

        // Row 1 is failed and untouched, row 2 keeps its selection, row 4 is past the comment.
        assert_eq!(selected(&index), vec![0, 2]);
    }

    #[test]
    fn test_select_block_from_a_comment_selects_nothing() {
        let (plan, mut index) = fixture(&["# header", "a"]);

        select_block(&plan, &mut index, 0);

        assert!(selected(&index).is_empty());
    }
}
