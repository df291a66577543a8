use crate::constants::INDEX_BACKUP_SUFFIX;
use crate::core::fingerprint::hash_command;
use crate::models::{CommandStatus, IndexEntry, Plan, PlanIndex};

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::fs;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Represents errors that can occur while reading or writing a plan index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A filesystem I/O error occurred.
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    /// The index file exists but could not be parsed. It is never discarded silently,
    /// since that would erase the run history of the plan.
    #[error("Index file '{}' is corrupt: {source}", path.display())]
    IndexCorrupt {
        /// The path of the unreadable index.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },
    /// An error occurred while serializing the index.
    #[error("Failed to serialize the index: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The temporary file holding the new index could not replace the old one.
    #[error("Failed to replace the index file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

type IndexResult<T> = Result<T, IndexError>;

/// Reads the stored index without reconciling it.
///
/// A missing file yields an empty index. A file that exists but cannot be parsed yields
/// `IndexError::IndexCorrupt`; the caller decides whether to abort or start over.
pub fn read_index(path: &Path) -> IndexResult<PlanIndex> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("No index at '{}'. Starting fresh.", path.display());
            return Ok(PlanIndex::default());
        }
        Err(e) => return Err(e.into()),
    };
    let entries: BTreeMap<usize, IndexEntry> =
        serde_json::from_str(&content).map_err(|source| IndexError::IndexCorrupt {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(PlanIndex::from_stored(entries))
}

/// Reads the index at `path` and reconciles it against `plan`.
pub fn load_index(path: &Path, plan: &Plan) -> IndexResult<PlanIndex> {
    let mut index = read_index(path)?;
    let changed = reconcile(&mut index, plan);
    if !changed.is_empty() {
        log::warn!(
            "{} row(s) changed since the index was written: {:?}",
            changed.len(),
            changed
        );
    }
    Ok(index)
}

/// Brings the index in line with the current plan.
///
/// Rows without an entry get a default one. Rows with an entry keep their `selected`,
/// `status` and `update_timestamp` and only get their hash recomputed. Entries for
/// positions past the end of the plan stay in storage but leave the view.
///
/// Returns the positions whose stored hash did not match the current text.
pub fn reconcile(index: &mut PlanIndex, plan: &Plan) -> Vec<usize> {
    let mut changed = Vec::new();
    for (position, row) in plan.rows().iter().enumerate() {
        let hash = hash_command(&row.text);
        if !index.contains_stored(position) {
            *index.stored_entry_mut(position) = IndexEntry::new(hash);
            continue;
        }
        let entry = index.stored_entry_mut(position);
        if !entry.hash.is_empty() && entry.hash != hash {
            changed.push(position);
        }
        entry.hash = hash;
    }
    index.set_row_count(plan.len());
    changed
}

/// Writes the full index (orphaned entries included) to disk.
///
/// The new content goes to a temporary file next to the index and is then renamed over
/// it, so a reader never observes a half-written file.
pub fn save_index(path: &Path, index: &PlanIndex) -> IndexResult<()> {
    let json = serde_json::to_string_pretty(index.stored_entries())?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(json.as_bytes())?;
    temp.flush()?;
    temp.persist(path)?;
    log::debug!("Index saved to '{}'", path.display());
    Ok(())
}

/// Where [`backup_corrupt_index`] moves a corrupt index: `<index>.bak`.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".");
    backup.push(INDEX_BACKUP_SUFFIX);
    PathBuf::from(backup)
}

/// Moves a corrupt index aside and returns the backup path.
pub fn backup_corrupt_index(path: &Path) -> IndexResult<PathBuf> {
    let backup = backup_path_for(path);
    fs::rename(path, &backup)?;
    log::warn!(
        "Corrupt index '{}' moved to '{}'",
        path.display(),
        backup.display()
    );
    Ok(backup)
}

/// Finds the first non-comment, pending row at or after `start`.
///
/// When there is none, returns the last position of the plan: nothing is left to do
/// and the highlight rests at the end.
pub fn find_next_pending(plan: &Plan, index: &PlanIndex, start: usize) -> usize {
    (start..plan.len())
        .find(|&position| {
            !plan.is_comment(position) && index.status(position) == CommandStatus::Pending
        })
        .unwrap_or_else(|| plan.last_position())
}
