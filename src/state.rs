// src/state.rs

use crate::core::index_manager::{self, IndexError};
use crate::models::{Plan, PlanIndex};
use std::path::{Path, PathBuf};

/// Which pane receives navigation input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Preview,
    Log,
}

/// Represents the state of the plan index.
/// It holds the current state and, once a mutation was requested, a snapshot of what is
/// on disk so that unsaved changes can be detected.
#[derive(Debug)]
enum IndexState {
    /// No mutation has been requested since the last load or save.
    Pristine(PlanIndex),
    /// A mutation has been requested. We hold both the saved snapshot and the current state.
    Dirty {
        original: PlanIndex,
        current: PlanIndex,
    },
}

/// Everything the rendering layer reads: the plan, its index, the highlighted row, the
/// focused pane and the log scroll position.
#[derive(Debug)]
pub struct AppState {
    plan: Plan,
    index_path: PathBuf,
    state: IndexState,
    pub highlight: usize,
    pub focus: Focus,
    pub log_scroll_offset: usize,
}

impl AppState {
    /// Builds the state for a loaded plan and its reconciled index. The highlight starts
    /// on the first pending row.
    pub fn new(plan: Plan, index: PlanIndex, index_path: impl Into<PathBuf>) -> Self {
        let highlight = index_manager::find_next_pending(&plan, &index, 0);
        Self {
            plan,
            index_path: index_path.into(),
            state: IndexState::Pristine(index),
            highlight,
            focus: Focus::Preview,
            log_scroll_offset: 0,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Provides read-only access to the current index state.
    pub fn index(&self) -> &PlanIndex {
        match &self.state {
            IndexState::Pristine(index) => index,
            IndexState::Dirty { current, .. } => current,
        }
    }

    /// Mutable access to the index. The first call after a load or save takes the
    /// snapshot used by [`AppState::needs_saving`].
    pub fn index_mut(&mut self) -> &mut PlanIndex {
        if let IndexState::Pristine(_) = self.state {
            self.state = match std::mem::replace(
                &mut self.state,
                IndexState::Pristine(PlanIndex::default()),
            ) {
                IndexState::Pristine(index) => IndexState::Dirty {
                    original: index.clone(),
                    current: index,
                },
                dirty => dirty,
            };
        }
        match &mut self.state {
            IndexState::Dirty { current, .. } => current,
            IndexState::Pristine(index) => index,
        }
    }

    /// Borrows the plan and the mutable index at the same time.
    pub fn plan_and_index_mut(&mut self) -> (&Plan, &mut PlanIndex) {
        self.index_mut();
        let index = match &mut self.state {
            IndexState::Dirty { current, .. } => current,
            IndexState::Pristine(index) => index,
        };
        (&self.plan, index)
    }

    /// Checks whether the index differs from what was last loaded or saved.
    pub fn needs_saving(&self) -> bool {
        match &self.state {
            IndexState::Pristine(_) => false,
            IndexState::Dirty { original, current } => original != current,
        }
    }

    /// Writes the index to its file and marks the state as pristine.
    pub fn save_index(&mut self) -> Result<(), IndexError> {
        index_manager::save_index(&self.index_path, self.index())?;
        self.state = match std::mem::replace(
            &mut self.state,
            IndexState::Pristine(PlanIndex::default()),
        ) {
            IndexState::Dirty { current, .. } => IndexState::Pristine(current),
            pristine => pristine,
        };
        Ok(())
    }

    /// Saves only when the index changed since the last save.
    pub fn save_if_needed(&mut self) -> Result<bool, IndexError> {
        if self.needs_saving() {
            self.save_index()?;
            return Ok(true);
        }
        Ok(false)
    }

    // --- Navigation ---

    pub fn move_up(&mut self) {
        self.highlight = self.highlight.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.highlight < self.plan.last_position() {
            self.highlight += 1;
        }
    }

    pub fn move_top(&mut self) {
        self.highlight = 0;
    }

    pub fn move_bottom(&mut self) {
        self.highlight = self.plan.last_position();
    }

    /// Moves the highlight to `position`, clamped to the plan.
    pub fn move_to(&mut self, position: usize) {
        self.highlight = position.min(self.plan.last_position());
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Preview => Focus::Log,
            Focus::Log => Focus::Preview,
        };
    }

    // --- Log scrolling (bounded by the number of log lines) ---

    pub fn scroll_log_up(&mut self) {
        self.log_scroll_offset = self.log_scroll_offset.saturating_sub(1);
    }

    pub fn scroll_log_down(&mut self, log_len: usize) {
        if self.log_scroll_offset + 1 < log_len {
            self.log_scroll_offset += 1;
        }
    }

    pub fn scroll_log_top(&mut self) {
        self.log_scroll_offset = 0;
    }

    pub fn scroll_log_bottom(&mut self, log_len: usize) {
        self.log_scroll_offset = log_len.saturating_sub(1);
    }
}
