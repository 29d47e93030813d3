//! Prompt-response cache for the HTTP source
//!
//! Agent prompts repeat a lot between runs of the same scenario, and a
//! local model is slow. The cache keys on the exact (system, user) pair,
//! so it can only ever return a response the model actually gave for
//! that prompt. Persisted as a JSON file next to the run output.

use crate::core::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Separator that cannot appear in prompt text (unit separator)
const KEY_SEP: char = '\u{1f}';

#[derive(Debug)]
pub struct PromptCache {
    path: PathBuf,
    // BTreeMap keeps the persisted file stable across runs
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl PromptCache {
    /// Open the cache at `path`, starting empty if the file is absent
    pub fn open(path: &Path) -> Result<Self> {
        let entries = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    fn key(system: &str, user: &str) -> String {
        format!("{system}{KEY_SEP}{user}")
    }

    pub fn get(&self, system: &str, user: &str) -> Option<&str> {
        self.entries.get(&Self::key(system, user)).map(|s| s.as_str())
    }

    pub fn insert(&mut self, system: &str, user: &str, response: String) {
        self.entries.insert(Self::key(system, user), response);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache back to disk if anything changed
    pub fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)?;
        self.dirty = false;
        Ok(())
    }
}
