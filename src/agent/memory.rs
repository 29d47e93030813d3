//! Per-agent memory of recent decisions and encounters
//!
//! The memory is a bounded window summarized into the next prompt, so the
//! model sees what it chose recently and how that turned out. Older
//! entries fall off the front; there is no long-term store.

use crate::core::types::Tick;
use std::collections::VecDeque;

/// Number of entries kept; older ones are evicted
const MEMORY_CAP: usize = 8;

/// One remembered event
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntry {
    pub tick: Tick,
    pub summary: String,
}

/// Bounded window of an agent's recent experience
#[derive(Debug, Clone, Default)]
pub struct AgentMemory {
    entries: VecDeque<MemoryEntry>,
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&mut self, tick: Tick, summary: impl Into<String>) {
        self.entries.push_back(MemoryEntry {
            tick,
            summary: summary.into(),
        });
        if self.entries.len() > MEMORY_CAP {
            self.entries.pop_front();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    /// One line per remembered event, oldest first
    pub fn recent_summary(&self) -> String {
        let mut s = String::new();
        for entry in &self.entries {
            s.push_str(&format!("- tick {}: {}\n", entry.tick, entry.summary));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remember_and_summary() {
        let mut memory = AgentMemory::new();
        memory.remember(1, "moved toward the hall");
        memory.remember(2, "waited");

        let summary = memory.recent_summary();
        assert!(summary.contains("tick 1: moved toward the hall"));
        assert!(summary.contains("tick 2: waited"));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut memory = AgentMemory::new();
        for tick in 0..20 {
            memory.remember(tick, format!("event {tick}"));
        }
        assert_eq!(memory.len(), MEMORY_CAP);
        assert!(!memory.recent_summary().contains("event 0"));
        assert!(memory.recent_summary().contains("event 19"));
    }
}
