use std::collections::VecDeque;

use crate::surface::{SurfaceBuffer, SurfaceSnapshot};

/// Default number of undo steps kept.
pub const DEFAULT_MAX_ENTRIES: usize = 20;

/// One undo/redo step: the full surface content plus a label for the UI.
pub struct HistoryEntry {
    pub description: String,
    pub snapshot: SurfaceSnapshot,
}

impl HistoryEntry {
    fn memory_size(&self) -> usize {
        self.snapshot.memory_bytes() + self.description.len()
    }
}

// ============================================================================
// HISTORY MANAGER - Manages undo/redo stacks with count and memory limits
// ============================================================================

/// Snapshot-based undo/redo.
///
/// `snapshot` must be called *before* the first pixel of a gesture is
/// written.  Undo and redo on an empty stack are silent no-ops.
pub struct HistoryManager {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    max_entries: usize,
    /// Optional memory cap in bytes, off unless configured.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl HistoryManager {
    pub fn new(max_entries: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_entries: max_entries.max(1),
            max_memory_bytes: None,
            total_memory: 0,
        }
    }

    /// Also evict oldest steps once both stacks exceed `max_memory_bytes`.
    /// The most recent step is always kept.
    pub fn with_memory_limit(mut self, max_memory_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }

    /// Record the current surface content as a new undo step and drop any
    /// redo steps.
    pub fn snapshot(&mut self, description: &str, surface: &SurfaceBuffer) {
        for entry in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(entry.memory_size());
        }

        let entry = HistoryEntry {
            description: description.to_string(),
            snapshot: surface.snapshot(),
        };
        self.total_memory += entry.memory_size();
        self.undo_stack.push_back(entry);

        self.prune();
    }

    pub fn undo(&mut self, surface: &mut SurfaceBuffer) -> Option<String> {
        let entry = self.undo_stack.pop_back()?;
        let description = entry.description.clone();
        let current = HistoryEntry {
            description: entry.description.clone(),
            snapshot: surface.snapshot(),
        };
        self.total_memory = self.total_memory.saturating_sub(entry.memory_size());
        self.total_memory += current.memory_size();
        surface.restore(&entry.snapshot);
        self.redo_stack.push_back(current);
        Some(description)
    }

    pub fn redo(&mut self, surface: &mut SurfaceBuffer) -> Option<String> {
        let entry = self.redo_stack.pop_back()?;
        let description = entry.description.clone();
        let current = HistoryEntry {
            description: entry.description.clone(),
            snapshot: surface.snapshot(),
        };
        self.total_memory = self.total_memory.saturating_sub(entry.memory_size());
        self.total_memory += current.memory_size();
        surface.restore(&entry.snapshot);
        self.undo_stack.push_back(current);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get all undo descriptions (most recent first)
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|e| e.description.clone()).collect()
    }

    /// The oldest snapshot still reachable by undo.
    pub fn oldest(&self) -> Option<&SurfaceSnapshot> {
        self.undo_stack.front().map(|e| &e.snapshot)
    }

    /// Current memory usage of both stacks (O(1) via cached total)
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_entries {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}
