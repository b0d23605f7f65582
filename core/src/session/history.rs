//! Submitted-prompt history with shell-style navigation

#[derive(Debug, Clone, Default)]
pub struct InputHistory {
    entries: Vec<String>,
    /// Entry currently shown, `None` when not navigating
    cursor: Option<usize>,
    /// Unsubmitted input saved when navigation began
    stash: String,
}

impl InputHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_navigating(&self) -> bool {
        self.cursor.is_some()
    }

    /// Record a submitted prompt unless it repeats the newest entry. Ends navigation.
    pub fn push(&mut self, entry: String) {
        if self.entries.last() != Some(&entry) {
            self.entries.push(entry);
        }
        self.reset();
    }

    pub fn reset(&mut self) {
        self.cursor = None;
        self.stash.clear();
    }

    /// One entry older. `current` is stashed when navigation starts.
    /// Returns the text to show, or `None` when nothing changes.
    pub fn previous(&mut self, current: &str) -> Option<String> {
        let newest = self.entries.len().checked_sub(1)?;
        let target = match self.cursor {
            None => {
                self.stash = current.to_string();
                newest
            }
            Some(0) => return None,
            Some(index) => index - 1,
        };
        self.cursor = Some(target);
        self.entries.get(target).cloned()
    }

    /// One entry newer; past the newest restores the stash and ends navigation.
    pub fn next(&mut self) -> Option<String> {
        let index = self.cursor?;
        if index + 1 < self.entries.len() {
            self.cursor = Some(index + 1);
            return self.entries.get(index + 1).cloned();
        }
        self.cursor = None;
        Some(std::mem::take(&mut self.stash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(entries: &[&str]) -> InputHistory {
        let mut history = InputHistory::new();
        for entry in entries {
            history.push(entry.to_string());
        }
        history
    }

    #[test]
    fn test_consecutive_duplicates_are_collapsed() {
        let history = history(&["ls", "ls", "pwd", "ls", "ls"]);
        assert_eq!(history.entries(), &["ls", "pwd", "ls"]);
    }

    #[test]
    fn test_previous_clamps_at_oldest() {
        let mut history = history(&["one", "two"]);
        assert_eq!(history.previous("draft").as_deref(), Some("two"));
        assert_eq!(history.previous("two").as_deref(), Some("one"));
        assert_eq!(history.previous("one"), None);
        assert!(history.is_navigating());
    }

    #[test]
    fn test_round_trip_restores_draft() {
        let mut history = history(&["a", "b", "c"]);
        for _ in 0..3 {
            history.previous("half typed");
        }
        assert_eq!(history.next().as_deref(), Some("b"));
        assert_eq!(history.next().as_deref(), Some("c"));
        assert_eq!(history.next().as_deref(), Some("half typed"));
        assert!(!history.is_navigating());
        assert_eq!(history.next(), None);
    }

    #[test]
    fn test_empty_history_is_a_no_op() {
        let mut history = InputHistory::new();
        assert_eq!(history.previous("x"), None);
        assert_eq!(history.next(), None);
        assert!(!history.is_navigating());
    }
}
