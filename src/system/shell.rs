// src/system/shell.rs

//! One long-lived shell process, driven one command at a time.
//!
//! Every command is written to the shell's stdin followed by statements that print two
//! markers: `<sentinel>_ERR` to stderr, then `<sentinel> <status>` to stdout. The session
//! reads stdout until the status line shows up, then drains stderr up to its marker. The
//! session never interprets a command's output, so a command that never hands control
//! back to the shell blocks `run` forever.

use crate::{
    constants::{OUTPUT_COMPLETE_MARKER, STDERR_MARKER_SUFFIX},
    models::{ShellConfig, ShellKind},
    system::shells_config,
};
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// How long `close` waits for the shell to honor `exit` before killing it.
const EXIT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// How long to wait for the stderr marker once the status line was read. The marker is
/// written first, so it only goes missing when the command redirected the shell's stderr.
const STDERR_GRACE_PERIOD: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Could not launch shell '{program}': {source}")]
    SessionStartFailed {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Shell session I/O failed: {0}")]
    SessionIo(#[from] io::Error),
    #[error("The shell exited before the command completed.")]
    SessionClosed,
    #[error("The shell session is not running.")]
    NotReady,
    #[error("Could not find happl3 config directory.")]
    ConfigDirNotFound,
    #[error("Failed to parse shells.toml: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize shells config to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Lifecycle of a [`ShellSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Starting,
    Ready,
}

/// What one command produced. A non-zero exit code or stderr text is data, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs plan commands one at a time. Implemented by [`ShellSession`]; the batch executor
/// only depends on this trait.
pub trait CommandRunner {
    /// Starts the underlying session if it is not running.
    fn ensure_ready(&mut self) -> Result<(), ShellError>;

    /// Runs one command and blocks until it completes.
    fn run(&mut self, command: &str) -> Result<CommandOutput, ShellError>;
}

#[derive(Debug)]
struct RunningShell {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr_lines: Receiver<String>,
}

/// An owned shell subprocess. The process is terminated when the session is closed or dropped.
#[derive(Debug)]
pub struct ShellSession {
    kind: ShellKind,
    config: ShellConfig,
    state: SessionState,
    process: Option<RunningShell>,
}

impl ShellSession {
    pub fn new(kind: ShellKind, config: ShellConfig) -> Self {
        Self {
            kind,
            config,
            state: SessionState::Closed,
            process: None,
        }
    }

    /// A session using the built-in launch settings for `kind`.
    pub fn with_defaults(kind: ShellKind) -> Self {
        Self::new(kind, shells_config::default_shell_config(kind))
    }

    pub fn kind(&self) -> ShellKind {
        self.kind
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Launches the shell with piped stdio and `TERM=dumb`.
    pub fn start(&mut self) -> Result<(), ShellError> {
        if self.state == SessionState::Ready {
            return Ok(());
        }
        self.state = SessionState::Starting;
        match self.spawn() {
            Ok(shell) => {
                log::debug!(
                    "{} session started (PID: {})",
                    self.kind,
                    shell.child.id()
                );
                self.process = Some(shell);
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    fn spawn(&self) -> Result<RunningShell, ShellError> {
        let program = self.config.path.display().to_string();
        let mut command = Command::new(&self.config.path);
        if let Some(args) = &self.config.session_args {
            command.args(args);
        }
        command
            .env("TERM", "dumb")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = command
            .spawn()
            .map_err(|source| ShellError::SessionStartFailed { program, source })?;
        // Kill the child if anything below fails.
        let mut child = scopeguard::guard(child, |mut child| {
            let _ = child.kill();
            let _ = child.wait();
        });

        let missing = || io::Error::other("shell pipes were not captured");
        let stdin = child.stdin.take().ok_or_else(missing)?;
        let stdout = child.stdout.take().ok_or_else(missing)?;
        let stderr = child.stderr.take().ok_or_else(missing)?;

        // stderr is drained on its own thread so a chatty command cannot fill the pipe
        // while we are blocked on stdout.
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("happl3-stderr".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(stderr);
                while let Ok(Some(line)) = read_line_lossy(&mut reader) {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;

        Ok(RunningShell {
            child: scopeguard::ScopeGuard::into_inner(child),
            stdin,
            stdout: BufReader::new(stdout),
            stderr_lines: rx,
        })
    }

    /// Runs `command` in the session and returns what it printed and its exit code.
    ///
    /// If the shell goes away mid-command (for instance because the command was `exit`),
    /// the session is closed and `ShellError::SessionClosed` is returned.
    pub fn run(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        let shell = match (self.state, self.process.as_mut()) {
            (SessionState::Ready, Some(shell)) => shell,
            _ => return Err(ShellError::NotReady),
        };
        let sentinel = format!("{}_{}", OUTPUT_COMPLETE_MARKER, Uuid::new_v4().simple());
        let framed = frame_command(self.kind, command, &sentinel);
        log::debug!("Running in {} session: {}", self.kind, command);

        let result = shell.exchange(&framed, &sentinel);
        if let Err(e) = &result {
            log::debug!("Session failed while running '{}': {}", command, e);
            self.close();
        }
        result
    }

    /// Asks the shell to exit, then terminates it. Safe to call any number of times,
    /// including on a session that never started.
    pub fn close(&mut self) {
        if let Some(shell) = self.process.take() {
            let RunningShell {
                mut child,
                mut stdin,
                ..
            } = shell;
            let exit = format!("{}\n", exit_statement(self.kind));
            if stdin.write_all(exit.as_bytes()).is_ok() {
                let _ = stdin.flush();
            }
            drop(stdin);
            wait_or_kill(&mut child);
        }
        self.state = SessionState::Closed;
    }
}

impl CommandRunner for ShellSession {
    fn ensure_ready(&mut self) -> Result<(), ShellError> {
        self.start()
    }

    fn run(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        ShellSession::run(self, command)
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl RunningShell {
    /// Discards stderr written after the previous command finished (background jobs).
    fn drain_stale_stderr(&mut self) {
        while let Ok(line) = self.stderr_lines.try_recv() {
            log::debug!("Discarding late stderr: {}", line);
        }
    }

    fn exchange(&mut self, framed: &str, sentinel: &str) -> Result<CommandOutput, ShellError> {
        self.drain_stale_stderr();
        self.stdin.write_all(framed.as_bytes())?;
        self.stdin.flush()?;

        let stderr_marker = stderr_marker(sentinel);
        // Set when the command sent the shell's stderr to stdout (`exec 2>&1`).
        let mut stderr_marker_seen = false;
        let mut stdout_lines = Vec::new();
        let exit_code = loop {
            let line = read_line_lossy(&mut self.stdout)?.ok_or(ShellError::SessionClosed)?;
            log::trace!("stdout: {}", line);
            if let Some(start) = line.find(&stderr_marker) {
                stderr_marker_seen = true;
                let before = line.get(..start).unwrap_or_default();
                if !before.is_empty() {
                    stdout_lines.push(before.to_string());
                }
                continue;
            }
            match parse_status_line(&line, sentinel) {
                Some((before, exit_code)) => {
                    if !before.is_empty() {
                        stdout_lines.push(before.to_string());
                    }
                    break exit_code;
                }
                None => stdout_lines.push(line),
            }
        };

        let stderr_lines = if stderr_marker_seen {
            Vec::new()
        } else {
            self.collect_stderr(&stderr_marker)
        };

        Ok(CommandOutput {
            stdout: stdout_lines.join("\n"),
            stderr: stderr_lines.join("\n"),
            exit_code,
        })
    }

    /// Reads stderr lines up to the marker. A disconnected channel or a marker that never
    /// arrives ends the output.
    fn collect_stderr(&mut self, stderr_marker: &str) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            match self.stderr_lines.recv_timeout(STDERR_GRACE_PERIOD) {
                Ok(line) => {
                    log::trace!("stderr: {}", line);
                    if let Some(start) = line.find(stderr_marker) {
                        let before = line.get(..start).unwrap_or_default();
                        if !before.is_empty() {
                            lines.push(before.to_string());
                        }
                        break;
                    }
                    lines.push(line);
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::debug!("No stderr marker received; stderr was redirected.");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        lines
    }
}

/// Builds the text written to the shell for one command: the command itself, then the
/// statements that report its status and print the markers.
pub fn frame_command(kind: ShellKind, command: &str, sentinel: &str) -> String {
    let stderr_marker = stderr_marker(sentinel);
    match kind {
        ShellKind::Posix => format!(
            "{command}\n__happl3_status=$?\nprintf '%s\\n' '{stderr_marker}' >&2\nprintf '%s %s\\n' '{sentinel}' \"$__happl3_status\"\n"
        ),
        ShellKind::PowerShell => format!(
            "{command}; $__happl3_status = if ($?) {{ 0 }} elseif ($LASTEXITCODE) {{ $LASTEXITCODE }} else {{ 1 }}; [Console]::Error.WriteLine('{stderr_marker}'); Write-Output \"{sentinel} $__happl3_status\"\n"
        ),
    }
}

/// The statement that ends a session of `kind`.
pub fn exit_statement(kind: ShellKind) -> &'static str {
    match kind {
        ShellKind::Posix | ShellKind::PowerShell => "exit",
    }
}

fn stderr_marker(sentinel: &str) -> String {
    format!("{sentinel}{STDERR_MARKER_SUFFIX}")
}

/// Recognizes `<sentinel> <status>` and returns the text printed before it on the same
/// line (output without a trailing newline) together with the status.
fn parse_status_line<'a>(line: &'a str, sentinel: &str) -> Option<(&'a str, i32)> {
    let start = line.find(sentinel)?;
    let before = line.get(..start).unwrap_or_default();
    let rest = line.get(start + sentinel.len()..)?;
    let code = rest.strip_prefix(' ')?.trim().parse().ok()?;
    Some((before, code))
}

/// Reads one line without its terminator. Returns `None` at end of stream. Invalid UTF-8
/// is replaced rather than treated as an error.
fn read_line_lossy(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut buffer = Vec::new();
    if reader.read_until(b'\n', &mut buffer)? == 0 {
        return Ok(None);
    }
    while matches!(buffer.last(), Some(b'\n' | b'\r')) {
        buffer.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
}

/// Gives the child a short grace period to exit on its own, then kills it.
fn wait_or_kill(child: &mut Child) {
    let deadline = Instant::now() + EXIT_GRACE_PERIOD;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("Shell exited with {}", status);
                return;
            }
            Ok(None) if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(20));
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("Failed to query shell process {}: {}", child.id(), e);
                break;
            }
        }
    }
    log::debug!("Killing shell process (PID: {})", child.id());
    if let Err(e) = child.kill() {
        log::warn!("Failed to kill shell process {}: {}", child.id(), e);
    }
    child.wait().ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_frame_posix_command() {
        let framed = frame_command(ShellKind::Posix, "echo hi", "MARK");
        assert_eq!(
            framed,
            "echo hi\n__happl3_status=$?\nprintf '%s\\n' 'MARK_ERR' >&2\nprintf '%s %s\\n' 'MARK' \"$__happl3_status\"\n"
        );
    }

    #[test]
    fn test_frame_powershell_command_is_one_line() {
        let framed = frame_command(ShellKind::PowerShell, "Get-Date", "MARK");
        assert!(framed.starts_with("Get-Date; "));
        assert!(framed.contains("[Console]::Error.WriteLine('MARK_ERR')"));
        assert!(framed.contains("Write-Output \"MARK $__happl3_status\""));
        assert_eq!(framed.matches('\n').count(), 1);
    }

    #[test]
    fn test_parse_status_line() {
        assert_eq!(parse_status_line("MARK 0", "MARK"), Some(("", 0)));
        assert_eq!(parse_status_line("MARK 127", "MARK"), Some(("", 127)));
        assert_eq!(
            parse_status_line("no newlineMARK 3", "MARK"),
            Some(("no newline", 3))
        );
        // The stderr marker and malformed lines are not status lines.
        assert_eq!(parse_status_line("MARK_ERR", "MARK"), None);
        assert_eq!(parse_status_line("MARK", "MARK"), None);
        assert_eq!(parse_status_line("MARK oops", "MARK"), None);
        assert_eq!(parse_status_line("plain output", "MARK"), None);
    }

    #[test]
    fn test_read_line_lossy() {
        let mut reader = io::Cursor::new(b"one\r\ntwo\n\xffthree".to_vec());
        assert_eq!(read_line_lossy(&mut reader).unwrap().as_deref(), Some("one"));
        assert_eq!(read_line_lossy(&mut reader).unwrap().as_deref(), Some("two"));
        assert_eq!(
            read_line_lossy(&mut reader).unwrap().as_deref(),
            Some("\u{fffd}three")
        );
        assert_eq!(read_line_lossy(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_run_before_start_is_not_ready() {
        let mut session = ShellSession::with_defaults(ShellKind::Posix);
        assert!(matches!(session.run("echo hi"), Err(ShellError::NotReady)));
    }

    #[test]
    fn test_missing_interpreter_fails_to_start() {
        let mut session = ShellSession::new(
            ShellKind::Posix,
            ShellConfig {
                path: PathBuf::from("happl3-no-such-shell-for-tests"),
                session_args: None,
            },
        );

        let result = session.start();

        assert!(matches!(result, Err(ShellError::SessionStartFailed { .. })));
        assert_eq!(session.state(), SessionState::Closed);
        // Closing a session that never started is harmless.
        session.close();
        session.close();
    }

    #[cfg(unix)]
    #[test]
    fn test_bash_session_keeps_state_between_commands() {
        let mut session = ShellSession::with_defaults(ShellKind::Posix);
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        session.run("GREETING=hello").unwrap();
        session.run("cd /").unwrap();
        let output = session.run("echo \"$GREETING from $(pwd)\"").unwrap();

        assert_eq!(output.stdout, "hello from /");
        assert!(output.success());
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[cfg(unix)]
    #[test]
    fn test_bash_session_reports_exit_code_and_stderr() {
        let mut session = ShellSession::with_defaults(ShellKind::Posix);
        session.start().unwrap();

        let output = session.run("echo out; echo err >&2; false").unwrap();
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
        assert_eq!(output.exit_code, 1);

        let output = session.run("printf 'no newline'").unwrap();
        assert_eq!(output.stdout, "no newline");
        assert_eq!(output.stderr, "");
        assert!(output.success());

        let output = session.run("echo TERM=$TERM").unwrap();
        assert_eq!(output.stdout, "TERM=dumb");
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_closes_the_session_and_it_can_restart() {
        let mut session = ShellSession::with_defaults(ShellKind::Posix);
        session.start().unwrap();

        let result = session.run("exit 1");
        assert!(matches!(result, Err(ShellError::SessionClosed)));
        assert_eq!(session.state(), SessionState::Closed);

        session.ensure_ready().unwrap();
        assert_eq!(session.run("echo back").unwrap().stdout, "back");
    }

    #[cfg(unix)]
    #[test]
    fn test_stderr_sent_to_stdout_keeps_framing() {
        let mut session = ShellSession::with_defaults(ShellKind::Posix);
        session.start().unwrap();

        let output = session.run("exec 2>&1").unwrap();
        assert_eq!(output, CommandOutput::default());

        let output = session.run("echo after").unwrap();
        assert_eq!(output.stdout, "after");
        assert!(output.success());

        let output = session.run("echo oops >&2; false").unwrap();
        assert_eq!(output.stdout, "oops");
        assert_eq!(output.exit_code, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_discarded_stderr_does_not_block() {
        let mut session = ShellSession::with_defaults(ShellKind::Posix);
        session.start().unwrap();

        session.run("exec 2>/dev/null").unwrap();
        let output = session.run("echo still here").unwrap();

        assert_eq!(output.stdout, "still here");
        assert_eq!(output.stderr, "");
    }

    #[cfg(unix)]
    #[test]
    fn test_late_stderr_is_not_attached_to_the_next_command() {
        let mut session = ShellSession::with_defaults(ShellKind::Posix);
        session.start().unwrap();

        session.run("(sleep 0.2; echo late >&2) &").unwrap();
        thread::sleep(Duration::from_millis(600));
        let output = session.run("echo next").unwrap();

        assert_eq!(output.stdout, "next");
        assert_eq!(output.stderr, "");
    }
}
