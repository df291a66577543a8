// src/core/run_log.rs

//! The append-only transcript of a plan's runs.

use crate::constants::LOG_TIMESTAMP_FORMAT;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Where run events are written. Lines are only ever appended.
pub trait LogSink {
    /// Appends several lines in one write.
    fn append_block(&mut self, lines: &[String]) -> std::io::Result<()>;

    /// Every line written so far, oldest first.
    fn read_lines(&self) -> std::io::Result<Vec<String>>;

    fn append_line(&mut self, line: &str) -> std::io::Result<()> {
        self.append_block(&[line.to_string()])
    }
}

/// A log stored in a text file, created on the first write.
#[derive(Debug, Clone)]
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLog {
    fn append_block(&mut self, lines: &[String]) -> std::io::Result<()> {
        let mut buffer = String::new();
        for line in lines {
            buffer.push_str(line);
            buffer.push('\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buffer.as_bytes())?;
        file.flush()
    }

    fn read_lines(&self) -> std::io::Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// A log kept in memory, for embedding the engine without a file.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    lines: Vec<String>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl LogSink for MemoryLog {
    fn append_block(&mut self, lines: &[String]) -> std::io::Result<()> {
        self.lines.extend(lines.iter().cloned());
        Ok(())
    }

    fn read_lines(&self) -> std::io::Result<Vec<String>> {
        Ok(self.lines.clone())
    }
}

/// The current local time, formatted for the log.
pub fn timestamp() -> String {
    Local::now().format(LOG_TIMESTAMP_FORMAT).to_string()
}

/// The banner written when a plan is loaded.
pub fn load_banner(command_count: usize, plan_path: &Path) -> String {
    format!(
        "[{}] Loaded {} commands from {}",
        timestamp(),
        command_count,
        plan_path.display()
    )
}
