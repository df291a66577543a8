// src/core/paths.rs

use crate::constants::{INDEX_FILE_SUFFIX, LOG_FILE_SUFFIX};
use lazy_static::lazy_static;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref HAPPL3_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not expand path '{path}': {message}")]
    Expansion { path: String, message: String },
}

/// Returns the path to the happl3 configuration directory (`~/.config/happl3`).
/// Creates it if it doesn't exist.
///
/// The first call computes and caches the path; later calls return the cached value.
pub fn get_happl3_config_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = HAPPL3_CONFIG_DIR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join("happl3");

    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    *cached_path_guard = Some(config_path.clone());
    Ok(config_path)
}

/// Expands `~` and environment variables in a user-supplied path.
pub fn expand_user_path(raw: &str) -> Result<PathBuf, PathError> {
    shellexpand::full(raw)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .map_err(|e| PathError::Expansion {
            path: raw.to_string(),
            message: e.to_string(),
        })
}

/// The index file that belongs to a plan: `<plan>.index`.
pub fn index_path_for(plan_path: &Path) -> PathBuf {
    with_appended_extension(plan_path, INDEX_FILE_SUFFIX)
}

/// The default log file of a plan: `<plan>.log`.
pub fn log_path_for(plan_path: &Path) -> PathBuf {
    with_appended_extension(plan_path, LOG_FILE_SUFFIX)
}

/// A path suitable for display, without Windows verbatim prefixes.
pub fn display_path(path: &Path) -> String {
    dunce::simplified(path).display().to_string()
}

fn with_appended_extension(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(suffix);
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_sibling_paths_append_the_suffix() {
        let plan = Path::new("deploy/plan.sh");
        assert_eq!(index_path_for(plan), PathBuf::from("deploy/plan.sh.index"));
        assert_eq!(log_path_for(plan), PathBuf::from("deploy/plan.sh.log"));
    }

    #[test]
    fn test_expand_user_path_keeps_plain_paths() {
        assert_eq!(
            expand_user_path("plans/migrate.sh").unwrap(),
            PathBuf::from("plans/migrate.sh")
        );
    }

    #[test]
    fn test_expand_user_path_rejects_unknown_variables() {
        let result = expand_user_path("$HAPPL3_SURELY_UNDEFINED_VARIABLE/plan.sh");
        assert!(matches!(result, Err(PathError::Expansion { .. })));
    }
}
