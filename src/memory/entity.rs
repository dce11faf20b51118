//! Bounded, recency-ordered memory of surfaced candidate identifiers
//!
//! Holds the identifiers a conversation has surfaced so far, most recent
//! last. Re-surfacing an identifier moves it to the back instead of
//! duplicating it. Entries are forgotten once they fall outside the turn
//! window, and the oldest entries are evicted when the hard capacity is hit.
//!
//! The memory also keeps the *anchor*: the reference set of the last turn
//! that committed to it. Ordinal phrases ("the first one") index the
//! anchor, never the whole window, so references stay tied to the latest
//! result list the user saw.

use crate::config::MemoryConfig;
use crate::retrieval::CandidateId;
use serde::Serialize;
use std::collections::VecDeque;

/// Default number of committed turns an identifier is remembered for.
pub const DEFAULT_WINDOW_TURNS: usize = 10;

/// Default hard limit on remembered identifiers.
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoryEntry {
    id: CandidateId,
    /// Committed turn that last surfaced this identifier
    turn: u64,
}

/// Per-session entity memory.
///
/// Plain owned data: the session wraps it in a mutex and nothing else
/// shares it.
#[derive(Debug, Clone)]
pub struct EntityMemory {
    /// Recency order: front = oldest, back = newest
    entries: VecDeque<MemoryEntry>,
    anchor: Vec<CandidateId>,
    window_turns: usize,
    capacity: usize,
    turn: u64,
}

/// Serializable view of an [`EntityMemory`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    pub identifiers: Vec<CandidateId>,
    pub anchor: Vec<CandidateId>,
    pub committed_turns: u64,
}

impl EntityMemory {
    /// Create a memory with the given turn window and capacity.
    ///
    /// Zero values are raised to one.
    pub fn new(window_turns: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            anchor: Vec::new(),
            window_turns: window_turns.max(1),
            capacity,
            turn: 0,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.window_turns, config.capacity)
    }

    /// Commit the reference set of one turn.
    ///
    /// Identifiers are appended in order (so the last one becomes the most
    /// recent), existing ones are moved to the back, and the anchor is
    /// replaced. Returns the identifiers that were forgotten.
    pub fn record(&mut self, references: &[CandidateId]) -> Vec<CandidateId> {
        let mut anchor: Vec<CandidateId> = Vec::with_capacity(references.len());
        for id in references {
            if !anchor.contains(id) {
                anchor.push(id.clone());
            }
        }
        if anchor.is_empty() {
            return Vec::new();
        }

        self.turn += 1;
        for id in &anchor {
            self.entries.retain(|e| &e.id != id);
            self.entries.push_back(MemoryEntry {
                id: id.clone(),
                turn: self.turn,
            });
        }

        let mut evicted = Vec::new();

        // Outside the turn window
        let oldest_kept = self.turn.saturating_sub(self.window_turns as u64 - 1);
        while let Some(front) = self.entries.front() {
            if front.turn >= oldest_kept {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                evicted.push(entry.id);
            }
        }

        // Over capacity
        while self.entries.len() > self.capacity {
            if let Some(entry) = self.entries.pop_front() {
                evicted.push(entry.id);
            }
        }

        anchor.retain(|id| self.contains(id));
        self.anchor = anchor;

        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "Entity memory evicted identifiers");
        }
        evicted
    }

    /// Identifiers of the last committed turn, in the order they were surfaced
    pub fn anchor(&self) -> &[CandidateId] {
        &self.anchor
    }

    /// Resolve a 1-based position against the anchor
    pub fn ordinal(&self, position: usize) -> Option<&CandidateId> {
        position.checked_sub(1).and_then(|i| self.anchor.get(i))
    }

    /// All remembered identifiers, oldest first
    pub fn identifiers(&self) -> impl Iterator<Item = &CandidateId> {
        self.entries.iter().map(|e| &e.id)
    }

    /// Most recently surfaced identifier
    pub fn most_recent(&self) -> Option<&CandidateId> {
        self.entries.back().map(|e| &e.id)
    }

    pub fn contains(&self, id: &CandidateId) -> bool {
        self.entries.iter().any(|e| &e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window_turns(&self) -> usize {
        self.window_turns
    }

    /// Number of turns committed since creation or the last reset
    pub fn committed_turns(&self) -> u64 {
        self.turn
    }

    /// Forget everything (conversation reset)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.anchor.clear();
        self.turn = 0;
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            identifiers: self.identifiers().cloned().collect(),
            anchor: self.anchor.clone(),
            committed_turns: self.turn,
        }
    }
}

impl Default for EntityMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_TURNS, DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<CandidateId> {
        raw.iter().map(|s| CandidateId::from(*s)).collect()
    }

    fn contents(memory: &EntityMemory) -> Vec<String> {
        memory.identifiers().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_record_appends_in_order() {
        let mut memory = EntityMemory::default();
        memory.record(&ids(&["101", "205", "309"]));

        assert_eq!(contents(&memory), vec!["101", "205", "309"]);
        assert_eq!(memory.anchor(), ids(&["101", "205", "309"]).as_slice());
        assert_eq!(memory.most_recent().unwrap().as_str(), "309");
        assert_eq!(memory.committed_turns(), 1);
    }

    #[test]
    fn test_resurfacing_moves_to_most_recent() {
        let mut memory = EntityMemory::default();
        memory.record(&ids(&["a", "b", "c"]));
        memory.record(&ids(&["a"]));

        assert_eq!(contents(&memory), vec!["b", "c", "a"]);
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.anchor(), ids(&["a"]).as_slice());
    }

    #[test]
    fn test_duplicates_in_one_commit_collapse() {
        let mut memory = EntityMemory::default();
        memory.record(&ids(&["a", "b", "a"]));

        assert_eq!(contents(&memory), vec!["a", "b"]);
        assert_eq!(memory.anchor(), ids(&["a", "b"]).as_slice());
    }

    #[test]
    fn test_empty_commit_is_noop() {
        let mut memory = EntityMemory::default();
        memory.record(&ids(&["a", "b"]));
        let evicted = memory.record(&[]);

        assert!(evicted.is_empty());
        assert_eq!(memory.committed_turns(), 1);
        assert_eq!(memory.anchor(), ids(&["a", "b"]).as_slice());
    }

    #[test]
    fn test_turn_window_forgets_old_identifiers() {
        let mut memory = EntityMemory::new(2, 100);
        memory.record(&ids(&["a"]));
        memory.record(&ids(&["b"]));
        let evicted = memory.record(&ids(&["c"]));

        assert_eq!(evicted, ids(&["a"]));
        assert_eq!(contents(&memory), vec!["b", "c"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut memory = EntityMemory::new(10, 3);
        memory.record(&ids(&["a", "b"]));
        let evicted = memory.record(&ids(&["c", "d"]));

        assert_eq!(evicted, ids(&["a"]));
        assert_eq!(contents(&memory), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_anchor_only_holds_remembered_identifiers() {
        let mut memory = EntityMemory::new(10, 2);
        memory.record(&ids(&["a", "b", "c"]));

        assert_eq!(contents(&memory), vec!["b", "c"]);
        assert_eq!(memory.anchor(), ids(&["b", "c"]).as_slice());
    }

    #[test]
    fn test_never_exceeds_bounds_or_duplicates() {
        let mut memory = EntityMemory::new(3, 5);
        for turn in 0..40u64 {
            let refs: Vec<CandidateId> = (0..(turn % 4 + 1))
                .map(|i| CandidateId::from((turn * 7 + i * 3) % 11))
                .collect();
            memory.record(&refs);

            assert!(memory.len() <= memory.capacity());
            let mut seen = contents(&memory);
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), memory.len());
        }
    }

    #[test]
    fn test_ordinal_resolution() {
        let mut memory = EntityMemory::default();
        assert!(memory.ordinal(1).is_none());

        memory.record(&ids(&["A", "B"]));
        assert_eq!(memory.ordinal(1).unwrap().as_str(), "A");
        assert_eq!(memory.ordinal(2).unwrap().as_str(), "B");
        assert!(memory.ordinal(3).is_none());
        assert!(memory.ordinal(0).is_none());
    }

    #[test]
    fn test_clear() {
        let mut memory = EntityMemory::default();
        memory.record(&ids(&["a", "b"]));
        memory.clear();

        assert!(memory.is_empty());
        assert!(memory.anchor().is_empty());
        assert_eq!(memory.committed_turns(), 0);
    }
}
