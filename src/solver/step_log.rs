//! Ordered derivation trail of one solve call.
//!
//! Entries are plain strings: math entries are wrapped in `$$ ... $$` block delimiters,
//! text entries are stored as given. A log is owned by exactly one solve call and is
//! never shared between calls.

const BLOCK_DELIMITER: &str = "$$";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepLog {
    steps: Vec<String>,
}

/// Position in a log that a failed attempt can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

fn is_delimited(entry: &str) -> bool {
    let trimmed = entry.trim();
    (trimmed.len() >= 2 && trimmed.starts_with('$') && trimmed.ends_with('$'))
        || (trimmed.starts_with("\\[") && trimmed.ends_with("\\]"))
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, entry: &str, is_math: bool) {
        let entry = if is_math && !is_delimited(entry) {
            format!("{}{}{}", BLOCK_DELIMITER, entry, BLOCK_DELIMITER)
        } else {
            entry.to_string()
        };
        self.steps.push(entry);
    }

    pub fn math(&mut self, entry: &str) {
        self.log(entry, true);
    }

    pub fn text(&mut self, entry: &str) {
        self.log(entry, false);
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn reset(&mut self) {
        self.steps.clear();
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.steps.len())
    }

    /// Drops every entry logged after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.steps.truncate(checkpoint.0);
    }

    pub fn extend(&mut self, other: StepLog) {
        self.steps.extend(other.steps);
    }

    pub fn into_steps(self) -> Vec<String> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_entries_are_wrapped_once() {
        let mut log = StepLog::new();
        log.math("\\int x \\, dx");
        log.math("$$x^2$$");
        log.math("$x$");
        log.text("plain narration");
        assert_eq!(
            log.steps(),
            &["$$\\int x \\, dx$$", "$$x^2$$", "$x$", "plain narration"]
        );
    }

    #[test]
    fn test_checkpoint_and_rollback() {
        let mut log = StepLog::new();
        log.text("kept");
        let mark = log.checkpoint();
        log.text("dropped");
        log.math("dropped too");
        log.rollback(mark);
        assert_eq!(log.steps(), &["kept"]);
        log.reset();
        assert!(log.is_empty());
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut first = StepLog::new();
        first.text("a");
        let mut second = StepLog::new();
        second.text("b");
        first.extend(second);
        assert_eq!(first.into_steps(), vec!["a".to_string(), "b".to_string()]);
    }
}
