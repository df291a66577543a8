// src/core/batch_executor.rs

//! Runs the selected rows of a plan, in order, through one shell session.
//!
//! The batch is the set of rows selected when execution is triggered. Rows run strictly
//! in ascending position, each at most once. After every row the index is written to
//! disk, so a crash loses at most the row in flight. The first failed row stops the batch.

use crate::{
    core::{
        index_manager,
        run_log::{self, LogSink},
    },
    models::CommandStatus,
    state::AppState,
    system::shell::{CommandOutput, CommandRunner, ShellError},
};
use chrono::Local;

/// The result of running one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutcome {
    pub position: usize,
    pub command: String,
    pub status: CommandStatus,
    /// What the shell returned, when the command completed.
    pub output: Option<CommandOutput>,
    /// The session-level error, when the command could not complete.
    pub error: Option<String>,
}

/// Why a batch ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing was selected.
    #[default]
    NothingSelected,
    /// Every row of the batch ran successfully.
    Completed,
    /// The row at `position` failed; the rows after it were not run.
    CommandFailed { position: usize },
    /// The index could not be written after the row at `position`.
    IndexNotSaved { position: usize, error: String },
}

/// Summary of one batch, in execution order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RowOutcome>,
    pub stop_reason: StopReason,
}

impl BatchReport {
    pub fn executed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == CommandStatus::Failed)
            .count()
    }

    pub fn halted_on_failure(&self) -> bool {
        !matches!(
            self.stop_reason,
            StopReason::Completed | StopReason::NothingSelected
        )
    }
}

/// Runs every selected row without observing progress.
pub fn execute_selected<R, L>(
    state: &mut AppState,
    runner: &mut R,
    log: &mut L,
) -> BatchReport
where
    R: CommandRunner + ?Sized,
    L: LogSink + ?Sized,
{
    execute_selected_with(state, runner, log, |_, _| {})
}

/// Runs every selected row, calling `on_row` after each row has been recorded and saved.
///
/// Per-row problems are recorded in the index and the log and end the batch. A shell that
/// cannot be started fails the first row of the batch like any other session error.
pub fn execute_selected_with<R, L, F>(
    state: &mut AppState,
    runner: &mut R,
    log: &mut L,
    mut on_row: F,
) -> BatchReport
where
    R: CommandRunner + ?Sized,
    L: LogSink + ?Sized,
    F: FnMut(&RowOutcome, &AppState),
{
    // 1. Snapshot the batch.
    let batch: Vec<usize> = state
        .index()
        .selected_positions()
        .into_iter()
        .filter(|&position| !state.plan().is_comment(position))
        .collect();
    let Some(&first) = batch.first() else {
        log::debug!("Execution requested with nothing selected.");
        return BatchReport::default();
    };

    // 2. The first selected row becomes the active highlight.
    state.highlight = first;
    let mut start_error = runner.ensure_ready().err();
    if let Some(e) = &start_error {
        log::warn!("Shell session could not be started: {}", e);
    }
    log::debug!("Executing batch of {} row(s): {:?}", batch.len(), batch);

    let mut report = BatchReport {
        outcomes: Vec::with_capacity(batch.len()),
        stop_reason: StopReason::Completed,
    };

    // 3. Walk the batch in ascending order.
    let mut cursor = 0;
    while let Some(&position) = batch.get(cursor) {
        cursor += 1;
        if !state.index().is_selected(position) {
            continue;
        }
        let Some(command) = state.plan().get(position).map(|row| row.text.clone()) else {
            continue;
        };
        state.highlight = position;

        let outcome = run_row(position, command, runner, log, start_error.take());

        // Record the result and persist before anything else happens.
        {
            let status = outcome.status;
            if let Some(entry) = state.index_mut().get_mut(position) {
                entry.status = status;
                entry.update_timestamp = Some(Local::now().naive_local());
                if status == CommandStatus::Success {
                    entry.selected = false;
                }
            }
        }
        if let Err(e) = state.save_index() {
            log::error!("Could not save the index after row {}: {}", position, e);
            append(log, &[format!("ERROR: INDEX NOT SAVED: {}", e)]);
            on_row(&outcome, &*state);
            report.outcomes.push(outcome);
            report.stop_reason = StopReason::IndexNotSaved {
                position,
                error: e.to_string(),
            };
            return report;
        }

        on_row(&outcome, &*state);
        let failed = outcome.status == CommandStatus::Failed;
        report.outcomes.push(outcome);

        // 3f. Fail fast: a failed step likely invalidates the steps after it.
        if failed {
            log::debug!("Row {} failed; stopping the batch.", position);
            report.stop_reason = StopReason::CommandFailed { position };
            return report;
        }

        // 3g. Move to the next row that is still selected, or rest on unfinished work.
        let next_selected = batch
            .get(cursor..)
            .unwrap_or_default()
            .iter()
            .position(|&next| state.index().is_selected(next));
        match next_selected {
            Some(offset) => cursor += offset,
            None => {
                state.highlight =
                    index_manager::find_next_pending(state.plan(), state.index(), position);
                break;
            }
        }
    }

    report
}

/// Runs one row and writes its block to the log. A pending `start_error` fails the row
/// without running it.
fn run_row<R, L>(
    position: usize,
    command: String,
    runner: &mut R,
    log: &mut L,
    start_error: Option<ShellError>,
) -> RowOutcome
where
    R: CommandRunner + ?Sized,
    L: LogSink + ?Sized,
{
    append(
        log,
        &[String::new(), format!("[{}] > {}", run_log::timestamp(), command)],
    );

    let mut lines = Vec::new();
    let result = match start_error {
        Some(e) => Err(e),
        None => runner.run(&command),
    };
    let outcome = match result {
        Ok(output) => {
            if !output.stdout.is_empty() {
                lines.extend(output.stdout.lines().map(str::to_string));
            }
            if !output.stderr.is_empty() {
                lines.push(format!("ERROR: {}", output.stderr));
            }
            let status = if output.success() {
                CommandStatus::Success
            } else {
                CommandStatus::Failed
            };
            RowOutcome {
                position,
                command,
                status,
                output: Some(output),
                error: None,
            }
        }
        Err(e) => {
            lines.push(format!("ERROR: EXCEPTION: {}", e));
            RowOutcome {
                position,
                command,
                status: CommandStatus::Failed,
                output: None,
                error: Some(e.to_string()),
            }
        }
    };

    lines.push(status_line(outcome.status));
    append(log, &lines);
    outcome
}

/// The one-line marker that closes every command block in the log.
pub fn status_line(status: CommandStatus) -> String {
    format!(
        "{} {}",
        status.glyph(),
        status.to_string().to_uppercase()
    )
}

/// The log is a collaborator: failing to write it never stops a batch.
fn append<L: LogSink + ?Sized>(log: &mut L, lines: &[String]) {
    if let Err(e) = log.append_block(lines) {
        log::warn!("Could not write to the run log: {}", e);
    }
}
