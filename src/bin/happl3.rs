// src/bin/happl3.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dialoguer::console::Term;
use happl3::{
    cli::{Cli, console},
    core::{
        paths, plan_loader,
        run_log::{self, FileLog, LogSink},
    },
    state::AppState,
    system::{shell::ShellSession, shells_config},
};

/// The main entry point of the `happl3` application.
/// It sets up logging, parses arguments and performs centralized error handling.
fn main() {
    env_logger::init();

    match run_cli(Cli::parse()) {
        Ok(true) => {}
        // A batch stopped on a failed command; the details are already on screen.
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Loads the plan and its companions, then hands over to `--run` or the console.
/// Returns `false` when a non-interactive batch stopped on a failure.
fn run_cli(cli: Cli) -> Result<bool> {
    log::debug!("CLI args parsed: {:?}", cli);

    let Some(raw_plan) = cli.plan.as_deref() else {
        Cli::print_usage()?;
        return Ok(true);
    };

    let plan_path = paths::expand_user_path(raw_plan)?;
    let plan = plan_loader::load_plan(&plan_path)?;

    let index_path = match &cli.index {
        Some(path) => path.clone(),
        None => paths::index_path_for(&plan_path),
    };
    let log_path = match cli.log.as_deref() {
        Some(raw) => paths::expand_user_path(raw)?,
        None => paths::log_path_for(&plan_path),
    };

    let interactive = !cli.run && Term::stdout().is_term();
    let index = console::open_index(&index_path, &plan, interactive)?;

    let mut log = FileLog::new(&log_path);
    log.append_line(&run_log::load_banner(plan.len(), &plan_path))
        .with_context(|| format!("Could not write to '{}'", log_path.display()))?;

    let kind = cli
        .shell
        .unwrap_or_else(|| plan_loader::detect_shell_kind(&plan_path));
    log::debug!("Plan '{}' runs under {}", plan_path.display(), kind);
    let mut session = ShellSession::new(kind, shells_config::resolve_shell_config(kind));

    let mut state = AppState::new(plan, index, index_path);
    if let Some(preset) = cli.select {
        console::apply_preset(&mut state, preset);
    }

    if cli.run {
        let report = console::run_batch(&mut state, &mut session, &mut log);
        state
            .save_if_needed()
            .with_context(|| format!("Could not save '{}'", state.index_path().display()))?;
        session.close();
        return Ok(!report.halted_on_failure());
    }

    let log_name = paths::display_path(&log_path);
    let result = console::run_console(&mut state, &mut session, &mut log, &log_name);
    session.close();
    result.map(|()| true)
}
