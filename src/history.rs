//! Generic bounded linear undo/redo log.
//!
//! A [`History`] owns opaque delta entries and a cursor; it knows nothing
//! about what the entries mean. Entry `0` is a base sentinel standing for
//! the initial state. Owners do not store per-step snapshots: to undo they
//! restore a saved base snapshot and replay every entry still in front of
//! the cursor. That trades O(history length × mutation size) undo cost for
//! O(1) extra memory per operation, which is the right trade while
//! interactive history depth (tens of operations) stays small next to
//! spike counts (often 10^4 to 10^6).

use alloc::vec;
use alloc::vec::Vec;

/// Linear undo/redo log over opaque delta entries.
///
/// Pushing while the cursor sits before the latest entry discards the
/// entries beyond it (the redo branch). An optional capacity bounds the
/// number of retained entries; see [`History::add`].
#[derive(Clone, Debug)]
pub struct History<T> {
    /// `items[0]` is the base sentinel; later entries are deltas.
    items: Vec<T>,
    /// Index of the entry currently in effect, in `[0, items.len())`.
    index: usize,
    /// Maximum number of entries beyond the base, `None` for unbounded.
    capacity: Option<usize>,
}

impl<T> History<T> {
    /// Create an unbounded log whose only entry is the base sentinel.
    pub fn new(base: T) -> Self {
        Self {
            items: vec![base],
            index: 0,
            capacity: None,
        }
    }

    /// Create a log retaining at most `capacity` entries beyond the base.
    pub fn bounded(base: T, capacity: usize) -> Self {
        Self {
            items: vec![base],
            index: 0,
            capacity: Some(capacity),
        }
    }

    /// Number of entries beyond the base sentinel.
    pub fn len(&self) -> usize {
        self.items.len() - 1
    }

    /// The capacity this log was built with, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// True if no entries are recorded beyond the base sentinel.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The entry currently in effect (the base sentinel when everything
    /// has been undone).
    pub fn current(&self) -> &T {
        &self.items[self.index]
    }

    /// The entry the next [`History::forward`] would re-apply, if any.
    ///
    /// Right after a successful [`History::back`] this is the entry that
    /// was just undone.
    pub fn redo_target(&self) -> Option<&T> {
        self.items.get(self.index + 1)
    }

    /// Append `entry` after the cursor, discarding any redo entries, and
    /// advance the cursor onto it.
    ///
    /// When a capacity is set and the push exceeds it, the oldest
    /// non-base entry is evicted and returned. The owner must fold the
    /// evicted delta into its base snapshot so that replaying the
    /// remaining entries still reproduces every retained state.
    pub fn add(&mut self, entry: T) -> Option<T> {
        self.items.truncate(self.index + 1);
        self.items.push(entry);
        self.index += 1;
        match self.capacity {
            Some(capacity) if self.len() > capacity => {
                self.index -= 1;
                Some(self.items.remove(1))
            }
            _ => None,
        }
    }

    /// Step back one entry.
    ///
    /// Returns the entry now current (possibly the base sentinel), or
    /// `None` when the cursor is already at the earliest position, in
    /// which case nothing changes.
    pub fn back(&mut self) -> Option<&T> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(&self.items[self.index])
    }

    /// Step forward one entry.
    ///
    /// Returns the entry to re-apply, or `None` when the cursor is
    /// already at the latest position, in which case nothing changes.
    pub fn forward(&mut self) -> Option<&T> {
        if self.index + 1 >= self.items.len() {
            return None;
        }
        self.index += 1;
        Some(&self.items[self.index])
    }

    /// Entries from the base sentinel up to the cursor, in chronological
    /// order. Used for full-history replay.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items[..=self.index].iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_back_forward() {
        let mut history: History<i32> = History::new(0);
        assert!(history.is_empty());
        assert!(history.back().is_none());
        assert!(history.forward().is_none());

        history.add(1);
        history.add(2);
        assert_eq!(history.len(), 2);
        assert_eq!(*history.current(), 2);

        assert_eq!(history.back(), Some(&1));
        assert_eq!(history.back(), Some(&0));
        assert!(history.back().is_none());

        assert_eq!(history.forward(), Some(&1));
        assert_eq!(history.forward(), Some(&2));
        assert!(history.forward().is_none());
    }

    #[test]
    fn test_add_truncates_redo_branch() {
        let mut history: History<i32> = History::new(0);
        history.add(1);
        history.add(2);
        history.add(3);
        history.back();
        history.back();
        // Cursor sits on entry 1; pushing drops entries 2 and 3.
        history.add(9);
        assert_eq!(history.len(), 2);
        assert_eq!(*history.current(), 9);
        assert!(history.forward().is_none());
        assert_eq!(history.back(), Some(&1));
    }

    #[test]
    fn test_redo_target_after_back() {
        let mut history: History<i32> = History::new(0);
        history.add(1);
        history.add(2);
        history.back();
        assert_eq!(history.redo_target(), Some(&2));
        history.back();
        assert_eq!(history.redo_target(), Some(&1));
    }

    #[test]
    fn test_iter_yields_base_to_cursor() {
        let mut history: History<i32> = History::new(0);
        history.add(1);
        history.add(2);
        history.add(3);
        history.back();
        let collected: Vec<i32> = history.iter().copied().collect();
        assert_eq!(collected, vec![0, 1, 2]);
    }

    #[test]
    fn test_bounded_evicts_oldest() {
        let mut history: History<i32> = History::bounded(0, 2);
        assert!(history.add(1).is_none());
        assert!(history.add(2).is_none());
        assert_eq!(history.add(3), Some(1));
        assert_eq!(history.len(), 2);
        assert_eq!(*history.current(), 3);
        // Undo depth shrank to the retained entries.
        assert_eq!(history.back(), Some(&2));
        assert_eq!(history.back(), Some(&0));
        assert!(history.back().is_none());
    }
}
