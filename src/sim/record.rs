//! Append-only log of per-tick, per-agent outcomes
//!
//! The record is the run's product: the analysis pipeline consumes the
//! CSV written at finalization. Entry order is tick order, then the
//! fixed agent order within a tick, which is what makes two identical
//! runs byte-comparable.

use crate::core::error::Result;
use crate::core::types::{AgentId, Tick};
use crate::llm::DecisionStatus;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One recorded outcome
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEntry {
    pub tick: Tick,
    pub agent_id: AgentId,
    pub agent: String,
    /// Display form of the applied action
    pub action: String,
    pub status: DecisionStatus,
}

/// Counts of decision outcomes across a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub ok: u64,
    pub malformed: u64,
    pub timeout: u64,
    pub service_error: u64,
}

impl StatusSummary {
    /// Outcomes where the fallback action was substituted
    pub fn fallbacks(&self) -> u64 {
        self.malformed + self.timeout + self.service_error
    }
}

impl std::fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ok: {}, malformed: {}, timeout: {}, service_error: {}",
            self.ok, self.malformed, self.timeout, self.service_error
        )
    }
}

/// The ordered outcome log for one run
#[derive(Debug)]
pub struct RunRecord {
    pub run_id: Uuid,
    entries: Vec<RecordEntry>,
    finalized: bool,
}

impl RunRecord {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            entries: Vec::new(),
            finalized: false,
        }
    }

    /// Append one outcome. Appends after finalization are a logic error.
    pub fn append(&mut self, entry: RecordEntry) {
        debug_assert!(!self.finalized, "append to finalized run record");
        if !self.finalized {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for entry in &self.entries {
            match entry.status {
                DecisionStatus::Ok => summary.ok += 1,
                DecisionStatus::Malformed => summary.malformed += 1,
                DecisionStatus::Timeout => summary.timeout += 1,
                DecisionStatus::ServiceError => summary.service_error += 1,
            }
        }
        summary
    }

    /// Serialize to CSV. Deterministic: no timestamps, no run id, field
    /// order fixed. Free-text fields are RFC 4180 quoted, so agent and
    /// target names may contain delimiters without breaking a row.
    pub fn to_csv_string(&self) -> String {
        let mut out = String::from("tick,agent_id,agent,action,status\n");
        for e in &self.entries {
            out.push_str(&format!(
                "{},{},{},{},{}\n",
                e.tick,
                e.agent_id.0,
                csv_field(&e.agent),
                csv_field(&e.action),
                e.status.as_str()
            ));
        }
        out
    }

    /// Write the CSV into `dir` as `run <n>.csv`, where `n` counts the
    /// files already present (the original output naming scheme).
    pub fn write_csv(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let existing = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .count();
        let path = dir.join(format!("run {existing}.csv"));
        fs::write(&path, self.to_csv_string())?;
        tracing::info!(path = %path.display(), entries = self.len(), "run record written");
        Ok(path)
    }
}

impl Default for RunRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Quote a field per RFC 4180 when it holds a delimiter, quote, or
/// line break; plain fields pass through unchanged.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
