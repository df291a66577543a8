// src/core/plan_loader.rs

use crate::constants::POWERSHELL_PLAN_EXTENSION;
use crate::models::{Plan, ShellKind};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    /// The plan source could not be read. Nothing else is created when this happens.
    #[error("Plan file '{}' could not be read: {source}", path.display())]
    PlanNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads a plan file into its ordered rows.
///
/// Blank lines are dropped. Every other line is kept in order, comments included;
/// lines are never reordered or deduplicated.
pub fn load_plan(path: &Path) -> Result<Plan, PlanError> {
    let content = fs::read_to_string(path).map_err(|source| PlanError::PlanNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let plan = Plan::from_lines(path, content.lines());
    log::debug!("Loaded {} rows from '{}'", plan.len(), path.display());
    Ok(plan)
}

/// Picks the shell a plan runs under from its file extension.
pub fn detect_shell_kind(path: &Path) -> ShellKind {
    let is_powershell = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(POWERSHELL_PLAN_EXTENSION));
    if is_powershell {
        ShellKind::PowerShell
    } else {
        ShellKind::Posix
    }
}
