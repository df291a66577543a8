// src/constants.rs

/// Prefix of the sentinel token that frames the end of a command's output.
/// A random suffix is appended for every invocation.
pub const OUTPUT_COMPLETE_MARKER: &str = "OUTPUT_COMPLETE_MARKER";

/// Appended to the sentinel to form the marker written to stderr.
pub const STDERR_MARKER_SUFFIX: &str = "_ERR";

/// Lines starting with this prefix are comments: displayed, never executed.
pub const COMMENT_PREFIX: &str = "#";

/// Extension appended to the plan path to locate its index file.
pub const INDEX_FILE_SUFFIX: &str = "index";

/// Extension appended to the plan path to locate the default log file.
pub const LOG_FILE_SUFFIX: &str = "log";

/// Extension appended to a corrupt index when it is moved aside.
pub const INDEX_BACKUP_SUFFIX: &str = "bak";

/// Plans with this extension run under PowerShell.
pub const POWERSHELL_PLAN_EXTENSION: &str = "ps1";

/// The name of the shell configuration file (in ~/.config/happl3/).
pub const SHELLS_CONFIG_FILENAME: &str = "shells.toml";

/// Format used for timestamps written to the run log.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
