// src/cli/console.rs

//! The interactive console: renders the plan, reads one command per line and applies it.

use anyhow::{Context, Result, anyhow};
use colored::*;
use dialoguer::{Confirm, Input, console::Term, theme::ColorfulTheme};
use std::path::Path;

use crate::{
    cli::{
        SelectPreset,
        dispatcher::{self, Action, DispatchError},
        render,
    },
    core::{
        batch_executor::{self, BatchReport, StopReason},
        index_manager::{self, IndexError},
        paths,
        run_log::LogSink,
        selection,
    },
    models::{Plan, PlanIndex},
    state::{AppState, Focus},
    system::shell::CommandRunner,
};

/// Whether the console keeps reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Loads the index of `plan`. A corrupt index is moved aside only when the operator
/// agrees; without a terminal it is an error.
pub fn open_index(index_path: &Path, plan: &Plan, interactive: bool) -> Result<PlanIndex> {
    match index_manager::load_index(index_path, plan) {
        Ok(index) => Ok(index),
        Err(IndexError::IndexCorrupt { path, source }) => {
            let path = paths::display_path(&path);
            log::warn!("Index '{}' is corrupt: {}", path, source);
            let aborted = || anyhow!(t!("index.corrupt.aborted").replace("{path}", &path));
            if !interactive {
                return Err(aborted());
            }
            let backup = index_manager::backup_path_for(index_path);
            let prompt = t!("index.corrupt.confirm")
                .replace("{path}", &path)
                .replace("{backup}", &paths::display_path(&backup));
            if !Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .default(false)
                .interact()?
            {
                return Err(aborted());
            }
            let moved_to = index_manager::backup_corrupt_index(index_path)?;
            println!("{} {}", "Moved to".yellow(), paths::display_path(&moved_to));
            Ok(index_manager::load_index(index_path, plan)?)
        }
        Err(e) => Err(e).with_context(|| format!("Could not load '{}'", index_path.display())),
    }
}

/// Replaces the selection with one of the presets.
pub fn apply_preset(state: &mut AppState, preset: SelectPreset) {
    let (plan, index) = state.plan_and_index_mut();
    match preset {
        SelectPreset::All => selection::select_all(plan, index),
        SelectPreset::None => selection::select_none(index),
        SelectPreset::Pending => selection::select_pending(plan, index),
        SelectPreset::Failed => selection::select_failed(plan, index),
    }
}

/// Runs the selected rows, printing each row as it completes and a summary at the end.
pub fn run_batch<R, L>(state: &mut AppState, runner: &mut R, log: &mut L) -> BatchReport
where
    R: CommandRunner + ?Sized,
    L: LogSink + ?Sized,
{
    let report = batch_executor::execute_selected_with(state, runner, log, |outcome, state| {
        println!(
            "{}",
            render::row_text(state.plan(), state.index(), outcome.position)
        );
        if let Some(error) = &outcome.error {
            eprintln!("{}: {}", "Error".red().bold(), error);
        }
    });

    match &report.stop_reason {
        StopReason::NothingSelected => println!("{}", t!("run.nothing_selected").yellow()),
        StopReason::Completed => println!("{}", summary(&report).green()),
        StopReason::CommandFailed { position } | StopReason::IndexNotSaved { position, .. } => {
            println!("{}", summary(&report).red());
            let command = state
                .plan()
                .get(*position)
                .map(|row| row.text.as_str())
                .unwrap_or_default();
            println!(
                "{}",
                t!("run.stopped_at")
                    .replace("{row}", &(position + 1).to_string())
                    .replace("{command}", command)
                    .red()
            );
        }
    }
    report
}

fn summary(report: &BatchReport) -> String {
    t!("run.summary")
        .replace("{executed}", &report.executed().to_string())
        .replace("{failed}", &report.failed().to_string())
}

/// Applies one console action to the state.
pub fn apply_action<R, L>(
    action: Action,
    state: &mut AppState,
    runner: &mut R,
    log: &mut L,
) -> Result<Flow>
where
    R: CommandRunner + ?Sized,
    L: LogSink + ?Sized,
{
    match action {
        Action::Up => match state.focus {
            Focus::Preview => state.move_up(),
            Focus::Log => state.scroll_log_up(),
        },
        Action::Down => match state.focus {
            Focus::Preview => state.move_down(),
            Focus::Log => state.scroll_log_down(log_len(log)),
        },
        Action::Top => match state.focus {
            Focus::Preview => state.move_top(),
            Focus::Log => state.scroll_log_top(),
        },
        Action::Bottom => match state.focus {
            Focus::Preview => state.move_bottom(),
            Focus::Log => state.scroll_log_bottom(log_len(log)),
        },
        Action::Goto(position) => {
            if position < state.plan().len() {
                state.move_to(position);
            } else {
                print_bad_row(position);
            }
        }
        Action::Toggle(None) => {
            let highlight = state.highlight;
            let (plan, index) = state.plan_and_index_mut();
            selection::toggle(plan, index, highlight);
            state.move_down();
        }
        Action::Toggle(Some(position)) => {
            if position < state.plan().len() {
                let (plan, index) = state.plan_and_index_mut();
                selection::toggle(plan, index, position);
            } else {
                print_bad_row(position);
            }
        }
        Action::SelectAll => apply_preset(state, SelectPreset::All),
        Action::SelectNone => apply_preset(state, SelectPreset::None),
        Action::SelectPending => apply_preset(state, SelectPreset::Pending),
        Action::SelectFailed => apply_preset(state, SelectPreset::Failed),
        Action::SelectBlock => {
            let highlight = state.highlight;
            let (plan, index) = state.plan_and_index_mut();
            selection::select_block(plan, index, highlight);
        }
        Action::Run => {
            run_batch(state, runner, log);
        }
        Action::SwitchFocus => state.toggle_focus(),
        Action::Help => println!("{}", t!("console.help")),
        Action::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn log_len<L: LogSink + ?Sized>(log: &L) -> usize {
    log.read_lines().map(|lines| lines.len()).unwrap_or_default()
}

fn print_bad_row(position: usize) {
    println!(
        "{}",
        t!("console.bad_row")
            .replace("{input}", &(position + 1).to_string())
            .yellow()
    );
}

/// Runs the console until the operator quits. The index is saved on the way out when it
/// changed, even if reading input failed.
pub fn run_console<R, L>(state: &mut AppState, runner: &mut R, log: &mut L, log_name: &str) -> Result<()>
where
    R: CommandRunner + ?Sized,
    L: LogSink + ?Sized,
{
    let loop_result = console_loop(state, runner, log, log_name);

    let saved = state
        .save_if_needed()
        .with_context(|| format!("Could not save '{}'", state.index_path().display()))?;
    if saved {
        println!(
            "{}",
            t!("console.saved").replace("{path}", &paths::display_path(state.index_path()))
        );
    }
    loop_result
}

fn console_loop<R, L>(state: &mut AppState, runner: &mut R, log: &mut L, log_name: &str) -> Result<()>
where
    R: CommandRunner + ?Sized,
    L: LogSink + ?Sized,
{
    let term = Term::stdout();
    loop {
        let (rows, _) = term.size();
        let available = usize::from(rows).saturating_sub(8).max(6);
        let plan_height = available * 2 / 3;
        let log_height = available - plan_height;

        let log_lines = log.read_lines().unwrap_or_else(|e| {
            log::warn!("Could not read the run log: {}", e);
            Vec::new()
        });
        if let Err(e) = term.clear_screen() {
            log::debug!("Could not clear the screen: {}", e);
        }
        println!(
            "{}",
            render::render_screen(state, &log_lines, log_name, plan_height, log_height)
        );

        let line: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("console.prompt"))
            .allow_empty(true)
            .interact_text()?;

        let action = match dispatcher::dispatch(&line) {
            Ok(action) => action,
            Err(DispatchError::UnknownCommand(input)) => {
                println!(
                    "{}",
                    t!("console.unknown_command").replace("{input}", &input).yellow()
                );
                continue;
            }
            Err(DispatchError::BadRow(input)) => {
                println!("{}", t!("console.bad_row").replace("{input}", &input).yellow());
                continue;
            }
            Err(e) => {
                println!("{}", e.to_string().yellow());
                continue;
            }
        };
        log::debug!("Console action: {:?}", action);

        if apply_action(action, state, runner, log)? == Flow::Quit {
            return Ok(());
        }
    }
}
