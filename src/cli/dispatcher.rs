// src/cli/dispatcher.rs

//! Turns one line typed at the console into an [`Action`].

use thiserror::Error;

/// What the operator asked for. Row numbers are already converted to 0-based positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    Top,
    Bottom,
    Goto(usize),
    /// Toggles the given row, or the highlighted one and moves down.
    Toggle(Option<usize>),
    SelectAll,
    SelectNone,
    SelectPending,
    SelectFailed,
    SelectBlock,
    Run,
    SwitchFocus,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),
    #[error("'{0}' is not a valid row number")]
    BadRow(String),
    #[error("Could not parse '{0}': unbalanced quotes")]
    Unparsable(String),
}

/// Defines a console command, its aliases, and how its arguments become an action.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    parse: fn(&[String]) -> Result<Action, DispatchError>,
}

/// The single source of truth for all console commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "up",
        aliases: &["k"],
        parse: |_| Ok(Action::Up),
    },
    CommandDefinition {
        name: "down",
        aliases: &["j"],
        parse: |_| Ok(Action::Down),
    },
    CommandDefinition {
        name: "top",
        aliases: &["H"],
        parse: |_| Ok(Action::Top),
    },
    CommandDefinition {
        name: "end",
        aliases: &["E"],
        parse: |_| Ok(Action::Bottom),
    },
    CommandDefinition {
        name: "goto",
        aliases: &["g"],
        parse: |args| match args.first() {
            Some(raw) => parse_row(raw).map(Action::Goto),
            None => Err(DispatchError::BadRow(String::new())),
        },
    },
    CommandDefinition {
        name: "toggle",
        aliases: &["space", "s"],
        parse: |args| match args.first() {
            Some(raw) => parse_row(raw).map(|position| Action::Toggle(Some(position))),
            None => Ok(Action::Toggle(None)),
        },
    },
    CommandDefinition {
        name: "all",
        aliases: &["a"],
        parse: |_| Ok(Action::SelectAll),
    },
    CommandDefinition {
        name: "none",
        aliases: &["n"],
        parse: |_| Ok(Action::SelectNone),
    },
    CommandDefinition {
        name: "pending",
        aliases: &["p"],
        parse: |_| Ok(Action::SelectPending),
    },
    CommandDefinition {
        name: "failed",
        aliases: &["f"],
        parse: |_| Ok(Action::SelectFailed),
    },
    CommandDefinition {
        name: "block",
        aliases: &["b"],
        parse: |_| Ok(Action::SelectBlock),
    },
    CommandDefinition {
        name: "run",
        aliases: &["r"],
        parse: |_| Ok(Action::Run),
    },
    CommandDefinition {
        name: "tab",
        aliases: &["log"],
        parse: |_| Ok(Action::SwitchFocus),
    },
    CommandDefinition {
        name: "help",
        aliases: &["?"],
        parse: |_| Ok(Action::Help),
    },
    CommandDefinition {
        name: "quit",
        aliases: &["q", "exit"],
        parse: |_| Ok(Action::Quit),
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Parses a console line. An empty line runs the selection.
pub fn dispatch(line: &str) -> Result<Action, DispatchError> {
    let words = shlex::split(line).ok_or_else(|| DispatchError::Unparsable(line.to_string()))?;
    log::trace!("Console words: {:?}", words);

    let Some((name, args)) = words.split_first() else {
        return Ok(Action::Run);
    };
    match find_command(name) {
        Some(command) => (command.parse)(args),
        None => Err(DispatchError::UnknownCommand(name.clone())),
    }
}

/// Rows are shown 1-based; positions are 0-based.
fn parse_row(raw: &str) -> Result<usize, DispatchError> {
    match raw.parse::<usize>() {
        Ok(row) if row >= 1 => Ok(row - 1),
        _ => Err(DispatchError::BadRow(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_aliases_resolve_to_the_same_action() {
        for (line, expected) in [
            ("up", Action::Up),
            ("k", Action::Up),
            ("j", Action::Down),
            ("H", Action::Top),
            ("E", Action::Bottom),
            ("space", Action::Toggle(None)),
            ("p", Action::SelectPending),
            ("b", Action::SelectBlock),
            ("log", Action::SwitchFocus),
            ("?", Action::Help),
            ("q", Action::Quit),
        ] {
            assert_eq!(dispatch(line), Ok(expected), "line: {line}");
        }
    }

    #[test]
    fn test_empty_line_runs_the_selection() {
        assert_eq!(dispatch(""), Ok(Action::Run));
        assert_eq!(dispatch("   "), Ok(Action::Run));
    }

    #[test]
    fn test_row_arguments_are_one_based() {
        assert_eq!(dispatch("goto 3"), Ok(Action::Goto(2)));
        assert_eq!(dispatch("s 1"), Ok(Action::Toggle(Some(0))));
        assert_eq!(
            dispatch("goto 0"),
            Err(DispatchError::BadRow("0".to_string()))
        );
        assert_eq!(
            dispatch("toggle x"),
            Err(DispatchError::BadRow("x".to_string()))
        );
    }

    #[test]
    fn test_unknown_and_malformed_lines() {
        assert_eq!(
            dispatch("explode"),
            Err(DispatchError::UnknownCommand("explode".to_string()))
        );
        assert!(matches!(
            dispatch("goto \"1"),
            Err(DispatchError::Unparsable(_))
        ));
    }
}
