//! Undo/redo over whole-source snapshots.
//!
//! Every settled write is one step: the text before and after the cycle.
//! Undo and redo hand back the text to restore; the controller writes it
//! out like any other edit.

/// One undoable step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub text_before: String,
    pub text_after: String,
    pub description: String,
}

/// Bounded undo/redo stacks.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth.min(64)),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// Record a step. Unchanged text is not recorded. Clears redo.
    pub fn record(&mut self, text_before: &str, text_after: &str, description: &str) {
        if text_before == text_after {
            return;
        }
        self.undo_stack.push(Snapshot {
            text_before: text_before.to_string(),
            text_after: text_after.to_string(),
            description: description.to_string(),
        });
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Pop the last step; returns the text to restore.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        let step = self.undo_stack.pop()?;
        self.redo_stack.push(step);
        self.redo_stack.last()
    }

    /// Re-apply the last undone step; returns the text to restore.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        let step = self.redo_stack.pop()?;
        self.undo_stack.push(step);
        self.undo_stack.last()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|s| s.description.as_str())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_redo_cycle() {
        let mut h = History::new(10);
        h.record("a", "b", "first");
        h.record("b", "c", "second");
        assert_eq!(h.undo_description(), Some("second"));

        assert_eq!(h.undo().map(|s| s.text_before.as_str()), Some("b"));
        assert_eq!(h.undo().map(|s| s.text_before.as_str()), Some("a"));
        assert!(h.undo().is_none());
        assert_eq!(h.redo().map(|s| s.text_after.as_str()), Some("b"));
        assert!(h.can_undo() && h.can_redo());
    }

    #[test]
    fn new_record_clears_redo() {
        let mut h = History::new(10);
        h.record("a", "b", "x");
        h.undo();
        h.record("a", "z", "y");
        assert!(!h.can_redo());
    }

    #[test]
    fn unchanged_and_depth() {
        let mut h = History::new(2);
        h.record("a", "a", "noop");
        assert!(!h.can_undo());
        h.record("a", "b", "1");
        h.record("b", "c", "2");
        h.record("c", "d", "3");
        assert_eq!(h.undo().map(|s| s.description.as_str()), Some("3"));
        assert_eq!(h.undo().map(|s| s.description.as_str()), Some("2"));
        assert!(h.undo().is_none());
    }
}
