use std::{collections::HashMap, env, fs, path::Path, path::PathBuf};

use crate::{
    constants::SHELLS_CONFIG_FILENAME,
    core::paths,
    models::{ShellConfig, ShellKind, ShellsConfig},
    system::shell::ShellError,
};

/// Loads `shells.toml` from the happl3 config directory, writing the defaults on first use.
pub fn load_shells_config() -> Result<ShellsConfig, ShellError> {
    let config_dir = paths::get_happl3_config_dir().map_err(|_| ShellError::ConfigDirNotFound)?;
    load_shells_config_from(&config_dir.join(SHELLS_CONFIG_FILENAME))
}

/// Loads a shells file from an explicit path, creating it with the defaults if missing.
pub fn load_shells_config_from(shells_path: &Path) -> Result<ShellsConfig, ShellError> {
    if !shells_path.exists() {
        let default_config = generate_default_shells_config();
        let toml_string = toml::to_string_pretty(&default_config)?;
        fs::write(shells_path, toml_string)?;
        Ok(default_config)
    } else {
        let content = fs::read_to_string(shells_path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Returns the launch settings for `kind`.
///
/// Configuration problems never block plan browsing: when `shells.toml` cannot be read or
/// does not define `kind`, the built-in defaults are used.
pub fn resolve_shell_config(kind: ShellKind) -> ShellConfig {
    let configured = match load_shells_config() {
        Ok(mut config) => config.shells.remove(kind.config_key()),
        Err(e) => {
            log::warn!("Using built-in shell settings: {}", e);
            None
        }
    };
    let mut shell = configured.unwrap_or_else(|| default_shell_config(kind));
    shell.path = expand_program_path(&shell.path);

    if shell.path.components().count() == 1 && !is_executable_in_path(&shell.path) {
        log::warn!(
            "Shell '{}' was not found in PATH; running commands will fail.",
            shell.path.display()
        );
    }
    shell
}

/// The built-in launch settings for `kind`.
pub fn default_shell_config(kind: ShellKind) -> ShellConfig {
    match kind {
        ShellKind::Posix => ShellConfig {
            path: PathBuf::from(if cfg!(target_os = "windows") {
                "bash.exe"
            } else {
                "bash"
            }),
            session_args: None,
        },
        ShellKind::PowerShell => ShellConfig {
            path: PathBuf::from(if cfg!(target_os = "windows") {
                "powershell.exe"
            } else {
                "pwsh"
            }),
            session_args: Some(
                ["-NoLogo", "-NoExit", "-Command", "-"]
                    .iter()
                    .map(|arg| arg.to_string())
                    .collect(),
            ),
        },
    }
}

fn generate_default_shells_config() -> ShellsConfig {
    let mut shells = HashMap::new();
    for kind in [ShellKind::Posix, ShellKind::PowerShell] {
        shells.insert(kind.config_key().to_string(), default_shell_config(kind));
    }
    ShellsConfig { shells }
}

/// Expands `~` and environment variables in a configured program path.
fn expand_program_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(e) => {
            log::warn!("Could not expand shell path '{}': {}", raw, e);
            path.to_path_buf()
        }
    }
}

fn is_executable_in_path(executable_name: &Path) -> bool {
    if let Some(path_var) = env::var_os("PATH") {
        for dir in env::split_paths(&path_var) {
            if dir.join(executable_name).is_file() {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_written_on_first_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SHELLS_CONFIG_FILENAME);

        let config = load_shells_config_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config, generate_default_shells_config());
        assert_eq!(load_shells_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_user_overrides_are_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SHELLS_CONFIG_FILENAME);
        fs::write(
            &path,
            "[shells.posix]\npath = \"/bin/zsh\"\nsession_args = [\"-f\"]\n",
        )
        .unwrap();

        let config = load_shells_config_from(&path).unwrap();

        let posix = config.shells.get("posix").unwrap();
        assert_eq!(posix.path, PathBuf::from("/bin/zsh"));
        assert_eq!(posix.session_args, Some(vec!["-f".to_string()]));
        assert!(!config.shells.contains_key("powershell"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SHELLS_CONFIG_FILENAME);
        fs::write(&path, "[shells.posix\n").unwrap();

        assert!(matches!(
            load_shells_config_from(&path),
            Err(ShellError::TomlParse(_))
        ));
    }

    #[test]
    fn test_powershell_defaults_read_commands_from_stdin() {
        let config = default_shell_config(ShellKind::PowerShell);
        let args = config.session_args.unwrap();
        assert_eq!(args.last().map(String::as_str), Some("-"));
        assert!(args.iter().any(|arg| arg == "-NoExit"));
    }
}
