use clap::{CommandFactory, Parser, ValueEnum};
use std::path::PathBuf;

use crate::models::ShellKind;

pub mod console;
pub mod dispatcher;
pub mod render;

/// Builds the dynamic, color-aware full help string at runtime.
fn build_help_string() -> &'static str {
    // Mini-renderer for the semantic help template: `<title>` and friends become ANSI styles.
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let template = t!("cli.help.template");

    // Define styles. If colors are disabled, they are empty strings.
    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let group = if use_colors { "\x1b[1;32m" } else { "" }; // Bold Green
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = template
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<group>", group)
        .replace("</group>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    Box::leak(formatted_string.into_boxed_str())
}

/// A selection applied to the whole plan before the console or `--run` starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SelectPreset {
    All,
    None,
    Pending,
    Failed,
}

/// happl3: steps an operator through a plan of shell commands.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The file containing the plan of commands.
    pub plan: Option<String>,

    /// The file receiving the run transcript. Defaults to `<PLAN_FILE>.log`.
    pub log: Option<String>,

    /// Overrides the shell picked from the plan extension.
    #[arg(long, value_enum)]
    pub shell: Option<ShellKind>,

    /// Uses another index file. Defaults to `<PLAN_FILE>.index`.
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Replaces the selection before starting.
    #[arg(long, value_enum)]
    pub select: Option<SelectPreset>,

    /// Runs the selected commands once and exits instead of opening the console.
    #[arg(long)]
    pub run: bool,
}

impl Cli {
    /// Prints the full help text to stdout.
    pub fn print_usage() -> std::io::Result<()> {
        Self::command().print_help()
    }
}
