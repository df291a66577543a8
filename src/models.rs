// src/models.rs

use crate::constants::COMMENT_PREFIX;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

// --- PLAN MODELS ---

/// A single line of the plan. Its position in the plan is its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRow {
    pub text: String,
}

impl CommandRow {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Comment rows are displayed but never selected or executed.
    pub fn is_comment(&self) -> bool {
        self.text.starts_with(COMMENT_PREFIX)
    }
}

/// The ordered, read-only sequence of rows loaded from a plan file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub source: PathBuf,
    rows: Vec<CommandRow>,
}

impl Plan {
    /// Builds a plan from raw lines. Blank lines are dropped; everything else is kept in order.
    pub fn from_lines<I, S>(source: impl Into<PathBuf>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = lines
            .into_iter()
            .filter_map(|line| {
                let trimmed = line.as_ref().trim();
                (!trimmed.is_empty()).then(|| CommandRow::new(trimmed))
            })
            .collect();
        Self {
            source: source.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&CommandRow> {
        self.rows.get(position)
    }

    pub fn rows(&self) -> &[CommandRow] {
        &self.rows
    }

    /// Returns `true` for comment rows and for positions outside the plan.
    pub fn is_comment(&self, position: usize) -> bool {
        self.rows.get(position).is_none_or(CommandRow::is_comment)
    }

    /// The position of the last row, or `0` for an empty plan.
    pub fn last_position(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}

// --- INDEX MODELS ---

/// Outcome of the most recent execution attempt of a row.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl CommandStatus {
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Pending => "⌛",
            Self::Success => "✔",
            Self::Failed => "✖",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Persisted metadata for one row. Missing fields in older files fall back to their defaults.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub status: CommandStatus,
    #[serde(default)]
    pub update_timestamp: Option<NaiveDateTime>,
}

impl IndexEntry {
    pub fn new(hash: String) -> Self {
        Self {
            hash,
            ..Default::default()
        }
    }
}

/// The per-row index of a plan.
///
/// Storage keeps every entry ever written, including positions past the end of the
/// current plan. Lookups only see positions inside the plan (`0..len()`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanIndex {
    entries: BTreeMap<usize, IndexEntry>,
    row_count: usize,
}

impl PlanIndex {
    pub(crate) fn from_stored(entries: BTreeMap<usize, IndexEntry>) -> Self {
        Self {
            entries,
            row_count: 0,
        }
    }

    pub(crate) fn set_row_count(&mut self, row_count: usize) {
        self.row_count = row_count;
    }

    pub(crate) fn stored_entry_mut(&mut self, position: usize) -> &mut IndexEntry {
        self.entries.entry(position).or_default()
    }

    pub(crate) fn contains_stored(&self, position: usize) -> bool {
        self.entries.contains_key(&position)
    }

    /// Every stored entry, including positions no longer present in the plan.
    pub fn stored_entries(&self) -> &BTreeMap<usize, IndexEntry> {
        &self.entries
    }

    /// Number of rows in the reconciled view.
    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn get(&self, position: usize) -> Option<&IndexEntry> {
        if position < self.row_count {
            self.entries.get(&position)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut IndexEntry> {
        if position < self.row_count {
            self.entries.get_mut(&position)
        } else {
            None
        }
    }

    /// Iterates the reconciled view in position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &IndexEntry)> {
        self.entries
            .range(..self.row_count)
            .map(|(position, entry)| (*position, entry))
    }

    pub fn is_selected(&self, position: usize) -> bool {
        self.get(position).is_some_and(|entry| entry.selected)
    }

    pub fn status(&self, position: usize) -> CommandStatus {
        self.get(position)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    /// Ascending positions currently marked as selected.
    pub fn selected_positions(&self) -> Vec<usize> {
        self.iter()
            .filter(|(_, entry)| entry.selected)
            .map(|(position, _)| position)
            .collect()
    }
}

// --- SHELL MODELS ---

/// The family of shell a plan runs under. It fixes the launch arguments and the
/// statements used to frame each command.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    Posix,
    #[value(name = "powershell", alias = "pwsh")]
    PowerShell,
}

impl ShellKind {
    /// The key of this shell in `shells.toml`.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Posix => "posix",
            Self::PowerShell => "powershell",
        }
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// How to launch one shell for a persistent session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub path: PathBuf,
    pub session_args: Option<Vec<String>>,
}

/// The deserialized contents of `shells.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellsConfig {
    #[serde(default)]
    pub shells: HashMap<String, ShellConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_drops_blank_lines_and_keeps_order() {
        let plan = Plan::from_lines("plan.sh", ["echo A", "", "   ", "# note", "echo A\r"]);

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.get(0).map(|r| r.text.as_str()), Some("echo A"));
        assert!(plan.is_comment(1));
        // Duplicates are kept: position is identity.
        assert_eq!(plan.get(2).map(|r| r.text.as_str()), Some("echo A"));
        assert!(plan.is_comment(99));
        assert_eq!(plan.last_position(), 2);
    }

    #[test]
    fn test_index_view_hides_positions_past_the_plan() {
        let mut stored = BTreeMap::new();
        stored.insert(0, IndexEntry::new("a".into()));
        stored.insert(5, IndexEntry::new("orphan".into()));
        let mut index = PlanIndex::from_stored(stored);
        index.set_row_count(1);

        assert!(index.get(0).is_some());
        assert!(index.get(5).is_none());
        assert_eq!(index.iter().count(), 1);
        assert_eq!(index.stored_entries().len(), 2);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&CommandStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }
}
