//! Edit journal.
//!
//! Every applied edit is appended to a JSON index in the state directory, with
//! blake3 hashes of the file before and after. The journal lives outside the
//! source tree and never takes part in an edit's success: callers log journal
//! failures and move on.
//!
//! One journal is shared by every session of a server, so appends are
//! serialized in-process and the index is replaced atomically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{EditError, Result};
use crate::surgical;

const INDEX_FILE: &str = "edits.json";

/// Generates a short unique record id (7 characters, like git)
pub fn generate_record_id() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let hash = blake3::hash(&nanos.to_le_bytes());
    hash.to_hex().as_str()[..7].to_string()
}

/// blake3 hash of in-memory file content.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub session: String,
    pub operation: String,
    pub file: PathBuf,
    /// Construction line the edit was requested for
    pub line: usize,
    pub line_delta: isize,
    pub hash_before: String,
    pub hash_after: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct JournalIndex {
    records: Vec<EditRecord>,
}

#[derive(Debug)]
pub struct EditJournal {
    dir: PathBuf,
    /// Held across load, append and save
    append: Mutex<()>,
}

impl EditJournal {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            append: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn load(&self) -> Result<JournalIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(JournalIndex::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| EditError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            EditError::io(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    fn save(&self, index: &JournalIndex) -> Result<()> {
        let path = self.index_path();
        fs::create_dir_all(&self.dir).map_err(|e| EditError::io(&self.dir, e))?;
        let content = serde_json::to_string_pretty(index).map_err(|e| {
            EditError::io(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        surgical::write_atomic(&path, &content)
    }

    pub fn record(&self, record: EditRecord) -> Result<()> {
        let _guard = self.append.lock().unwrap_or_else(PoisonError::into_inner);
        let mut index = self.load()?;
        index.records.push(record);
        self.save(&index)
    }

    /// Newest records first.
    pub fn history(&self, limit: usize) -> Result<Vec<EditRecord>> {
        let mut records = self.load()?.records;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }
}
